use std::io;

use tracing::instrument;

use crate::{
    domain::{InsertError, Inserted, PersonId, Relation, Tree},
    storage::{
        backend::Backend,
        envelope::{decode, encode},
    },
};

/// The current tree snapshot, written through to a [`Backend`].
///
/// Every successful edit is persisted before the new snapshot replaces the
/// old one, so a failed write leaves the store unchanged.
#[derive(Debug)]
pub struct Store<B> {
    backend: B,
    key: String,
    tree: Tree,
}

/// Failure to persist a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be read or written.
    #[error("failed to access storage: {0}")]
    Io(#[from] io::Error),

    /// The tree could not be serialised.
    #[error("failed to serialise tree: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure to apply an edit through a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The edit was rejected by the tree.
    #[error(transparent)]
    Insert(#[from] InsertError),

    /// The edit was valid but could not be saved.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl<B: Backend> Store<B> {
    /// Opens the tree stored under `key`.
    ///
    /// Missing, unreadable or unparseable data yields an empty tree. Legacy
    /// documents are migrated in memory and written in the current format on
    /// the next edit.
    #[instrument(skip(backend))]
    pub fn open(backend: B, key: &str) -> Self {
        let tree = match backend.read(key) {
            Ok(Some(json)) => decode(&json).unwrap_or_else(|e| {
                tracing::warn!("stored tree could not be parsed, starting empty: {e}");
                Tree::new()
            }),
            Ok(None) => {
                tracing::debug!("nothing stored yet, starting empty");
                Tree::new()
            }
            Err(e) => {
                tracing::warn!("stored tree could not be read, starting empty: {e}");
                Tree::new()
            }
        };

        tracing::debug!(people = tree.len(), "opened store");
        Self {
            backend,
            key: key.to_string(),
            tree,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The key the tree is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Adds a top-level person and saves.
    ///
    /// # Errors
    ///
    /// Returns an error if the new snapshot cannot be saved.
    pub fn add_root(&mut self, name: impl Into<String>) -> Result<PersonId, StorageError> {
        let Inserted { tree, id } = self.tree.add_root(name);
        self.commit(tree)?;
        tracing::info!(%id, "added person");
        Ok(id)
    }

    /// Adds a relative of `target` and saves.
    ///
    /// # Errors
    ///
    /// This method can fail if:
    ///
    /// - the tree rejects the edit, see [`Tree::insert_related`]
    /// - the new snapshot cannot be saved
    pub fn insert_related(
        &mut self,
        target: &PersonId,
        relation: Relation,
        name: impl Into<String>,
    ) -> Result<PersonId, EditError> {
        let Inserted { tree, id } = self.tree.insert_related(target, relation, name)?;
        self.commit(tree)?;
        tracing::info!(%id, %target, %relation, "added relative");
        Ok(id)
    }

    /// Deletes a person and saves.
    ///
    /// Returns `false`, without writing anything, if the person does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the new snapshot cannot be saved.
    pub fn delete_person(&mut self, id: &PersonId) -> Result<bool, StorageError> {
        if !self.tree.contains(id) {
            tracing::debug!(%id, "person not found, nothing to delete");
            return Ok(false);
        }
        let tree = self.tree.delete_person(id);
        self.commit(tree)?;
        tracing::info!(%id, "deleted person");
        Ok(true)
    }

    /// Discards the whole tree and removes it from the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored blob cannot be removed.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.backend.remove(&self.key)?;
        self.tree = Tree::new();
        tracing::info!("reset tree");
        Ok(())
    }

    fn commit(&mut self, tree: Tree) -> Result<(), StorageError> {
        let json = encode(&tree)?;
        self.backend.write(&self.key, &json)?;
        self.tree = tree;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBackend, MemoryBackend};

    const KEY: &str = "family-tree";

    /// A backend whose writes always fail.
    struct ReadOnly;

    impl Backend for ReadOnly {
        fn read(&self, _key: &str) -> io::Result<Option<String>> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read only"))
        }

        fn remove(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read only"))
        }
    }

    #[test]
    fn edits_survive_reopening() {
        let tmp = tempfile::tempdir().unwrap();

        let mut store = Store::open(FileBackend::new(tmp.path().to_path_buf()), KEY);
        let alex = store.add_root("Alex").unwrap();
        let jamie = store
            .insert_related(&alex, Relation::Spouse, "Jamie")
            .unwrap();
        let expected = store.tree().clone();

        let reopened = Store::open(FileBackend::new(tmp.path().to_path_buf()), KEY);

        assert_eq!(reopened.tree(), &expected);
        assert_eq!(
            reopened.tree().spouse_of(&alex).map(|p| p.id.clone()),
            Some(jamie)
        );
    }

    #[test]
    fn edits_are_written_under_the_store_key() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::open(FileBackend::new(tmp.path().to_path_buf()), "smiths");

        store.add_root("Alex").unwrap();

        assert_eq!(store.key(), "smiths");
        let path = store.backend().path(store.key());
        assert_eq!(path, tmp.path().join("smiths.json"));
        assert!(path.exists());
    }

    #[test]
    fn unparseable_data_opens_empty() {
        let store = Store::open(MemoryBackend::with_blob(KEY, "{ broken"), KEY);
        assert!(store.tree().is_empty());
    }

    #[test]
    fn legacy_data_is_migrated_and_rewritten_on_edit() {
        let legacy = r#"{"id":"container","name":"","children":[{"id":"a","name":"A","children":[]}]}"#;
        let mut store = Store::open(MemoryBackend::with_blob(KEY, legacy), KEY);

        assert_eq!(store.tree().root_ids(), &[PersonId::from("a")]);
        assert_eq!(store.backend().blob(KEY).as_deref(), Some(legacy));

        store.add_root("B").unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&store.backend().blob(KEY).unwrap()).unwrap();
        assert_eq!(saved["version"], "2");
    }

    #[test]
    fn rejected_edit_writes_nothing() {
        let mut store = Store::open(MemoryBackend::new(), KEY);
        let alex = store.add_root("Alex").unwrap();
        store.insert_related(&alex, Relation::Parent, "P1").unwrap();
        store.insert_related(&alex, Relation::Parent, "P2").unwrap();
        let saved = store.backend().blob(KEY);

        let error = store
            .insert_related(&alex, Relation::Parent, "P3")
            .unwrap_err();

        assert!(matches!(error, EditError::Insert(InsertError::TwoParents(_))));
        assert_eq!(store.backend().blob(KEY), saved);
        assert_eq!(store.tree().len(), 3);
    }

    #[test]
    fn failed_write_keeps_the_previous_snapshot() {
        let mut store = Store::open(ReadOnly, KEY);

        let error = store.add_root("Alex").unwrap_err();

        assert!(matches!(error, StorageError::Io(_)));
        assert!(store.tree().is_empty());
    }

    #[test]
    fn deleting_unknown_person_is_a_no_op() {
        let mut store = Store::open(MemoryBackend::new(), KEY);

        assert!(!store.delete_person(&PersonId::from("ghost")).unwrap());
        assert_eq!(store.backend().blob(KEY), None);
    }

    #[test]
    fn delete_then_reset() {
        let mut store = Store::open(MemoryBackend::new(), KEY);
        let alex = store.add_root("Alex").unwrap();
        let bo = store.add_root("Bo").unwrap();

        assert!(store.delete_person(&alex).unwrap());
        assert_eq!(store.tree().root_ids(), &[bo]);

        store.reset().unwrap();

        assert!(store.tree().is_empty());
        assert_eq!(store.backend().blob(KEY), None);
    }
}
