//! The persisted document format.
//!
//! Trees are written inside a versioned envelope:
//!
//! ```json
//! { "version": "2", "payload": { "nodes": { ... }, "rootIds": [ ... ] } }
//! ```
//!
//! Reading also accepts version `"1"` (the nested legacy document), and both
//! shapes without an envelope, as written by older releases.

use serde::{Deserialize, Serialize};

use crate::domain::{migrate_tree, LegacyTree, Tree};

/// The serialized versions of the document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "version", content = "payload")]
enum Versions {
    #[serde(rename = "1")]
    V1(LegacyTree),
    #[serde(rename = "2")]
    V2(Tree),
}

/// Everything that has ever been written to storage.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Stored {
    Envelope(Versions),
    Bare(Tree),
    Legacy(LegacyTree),
}

/// Parses a stored document, migrating legacy content.
///
/// # Errors
///
/// Returns an error if the document is not valid JSON or matches none of the
/// known shapes.
pub fn decode(json: &str) -> Result<Tree, serde_json::Error> {
    let tree = match serde_json::from_str(json)? {
        Stored::Envelope(Versions::V2(tree)) | Stored::Bare(tree) => tree,
        Stored::Envelope(Versions::V1(legacy)) | Stored::Legacy(legacy) => {
            tracing::info!("found legacy document, migrating");
            migrate_tree(&legacy)
        }
    };
    Ok(tree)
}

/// Serialises a tree in the current envelope.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn encode(tree: &Tree) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Versions::V2(tree.clone()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{PersonId, Relation};

    fn sample() -> Tree {
        let inserted = Tree::new().add_root("Alex");
        inserted
            .tree
            .insert_related(&inserted.id, Relation::Spouse, "Jamie")
            .unwrap()
            .tree
    }

    #[test]
    fn writes_the_current_envelope() {
        let tree = sample();

        let value: serde_json::Value = serde_json::from_str(&encode(&tree).unwrap()).unwrap();

        assert_eq!(value["version"], "2");
        assert_eq!(value["payload"]["nodes"].as_object().unwrap().len(), 2);
        assert_eq!(value["payload"]["rootIds"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn reads_back_what_it_writes() {
        let tree = sample();
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
    }

    #[test]
    fn reads_a_bare_current_document() {
        let json = json!({
            "nodes": {
                "a": { "id": "a", "name": "A", "children": [], "spouseId": null }
            },
            "rootIds": ["a"]
        });

        let tree = decode(&json.to_string()).unwrap();

        assert_eq!(tree.root_ids(), &[PersonId::from("a")]);
        assert!(tree.person(&PersonId::from("a")).unwrap().sibling_ids.is_empty());
    }

    #[test]
    fn migrates_legacy_documents_with_and_without_envelope() {
        let legacy = json!({
            "id": "container",
            "name": "",
            "children": [{
                "id": "root",
                "name": "Root",
                "spouse": { "id": "spouse", "name": "Spouse" },
                "children": [{ "id": "child", "name": "Child", "children": [] }]
            }]
        });
        let wrapped = json!({ "version": "1", "payload": legacy.clone() });

        let bare = decode(&legacy.to_string()).unwrap();
        let enveloped = decode(&wrapped.to_string()).unwrap();

        assert_eq!(bare, enveloped);
        assert_eq!(bare.len(), 3);
        assert_eq!(bare.root_ids(), &[PersonId::from("root")]);
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(decode(r#"{ "version": "9", "payload": {} }"#).is_err());
        assert!(decode("not json").is_err());
    }
}
