//! Family tree editing engine
//!
//! People and their relationships live in a single in-memory [`Tree`]. Every
//! edit produces a new consistent snapshot, which can be persisted through a
//! [`Store`] and laid out as a node/edge diagram with [`compute_layout`].

pub mod domain;
pub use domain::{
    migrate_tree, Config, InsertError, Inserted, LegacyTree, Person, PersonId, Relation, Tree,
};

/// Diagram layout for family trees.
pub mod layout;
pub use layout::{
    compute_layout, Edge, Layout, LayoutError, LayoutMetrics, NodeKind, Point, VisualNode,
};

/// Persistence of tree snapshots.
pub mod storage;
pub use storage::{Backend, EditError, FileBackend, MemoryBackend, StorageError, Store};
