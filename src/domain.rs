//! Domain models for family trees.
//!
//! This module contains the core domain types: people, the tree and its
//! mutation engine, the deprecated nested representation, and configuration.

/// People and their identifiers.
pub mod person;
pub use person::{Person, PersonId};

/// The tree and its relationship-preserving mutations.
pub mod tree;
pub use tree::{InsertError, Inserted, Relation, Tree, UnknownRelation};

/// The deprecated nested representation and its migration.
pub mod legacy;
pub use legacy::{migrate_tree, LegacyPerson, LegacyTree};

mod config;
pub use config::Config;
