//! Key-value blob storage.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs, io,
    path::PathBuf,
};

/// Somewhere a serialised tree can be kept under a string key.
pub trait Backend {
    /// Reads the blob stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    /// Removes the blob stored under `key`. Removing a missing key is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be removed.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Stores each key as `<key>.json` in a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// A backend rooted at `root`. The directory is created on first write.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The file a key is stored in.
    #[must_use]
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path(key), value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Keeps blobs in memory. Useful for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: RefCell<HashMap<String, String>>,
}

impl MemoryBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that already holds `value` under `key`.
    #[must_use]
    pub fn with_blob(key: impl Into<String>, value: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.blobs.borrow_mut().insert(key.into(), value.into());
        backend
    }

    /// A copy of the blob stored under `key`.
    #[must_use]
    pub fn blob(&self, key: &str) -> Option<String> {
        self.blobs.borrow().get(key).cloned()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.blob(key))
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.blobs.borrow_mut().remove(key);
        Ok(())
    }
}
