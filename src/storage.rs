//! Persistence of tree snapshots.
//!
//! A [`Store`] owns the current [`Tree`](crate::Tree) and writes every edit
//! through a [`Backend`] as a versioned JSON document.

mod backend;
mod envelope;
mod store;

pub use backend::{Backend, FileBackend, MemoryBackend};
pub use envelope::{decode, encode};
pub use store::{EditError, StorageError, Store};
