//! The deprecated nested representation and its migration.
//!
//! Early versions stored the whole family as one recursive document: every
//! person embedded their children, and a partner was embedded as a `spouse`
//! object. The top level was an invisible, unnamed container whose children
//! were the visible top-level people.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{Person, PersonId, Tree};

/// A person in the nested representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPerson {
    /// Identifier. People without one are skipped during migration.
    #[serde(default)]
    pub id: Option<PersonId>,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Embedded children.
    #[serde(default)]
    pub children: Vec<LegacyPerson>,

    /// Embedded partner.
    #[serde(default)]
    pub spouse: Option<Box<LegacyPerson>>,
}

/// The invisible top-level container of the nested representation.
///
/// Unlike [`LegacyPerson`], both `id` and `children` are required, which is
/// what distinguishes a legacy document from the current format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTree {
    /// Identifier of the container itself. Never migrated.
    pub id: PersonId,

    /// Name of the container, normally empty.
    #[serde(default)]
    pub name: String,

    /// The visible top-level people.
    pub children: Vec<LegacyPerson>,

    /// Unused on the container; kept for round-tripping.
    #[serde(default)]
    pub spouse: Option<Box<LegacyPerson>>,
}

/// Converts a nested legacy document into a normalised [`Tree`].
///
/// Each top-level entry becomes a root. People and their embedded partners
/// become separate nodes, and a couple's children are merged so that both
/// partners list the same set. The input is not modified.
#[must_use]
#[instrument(skip(legacy), fields(top_level = legacy.children.len()))]
pub fn migrate_tree(legacy: &LegacyTree) -> Tree {
    let mut migration = Migration::default();
    let mut roots = Vec::new();

    for entry in &legacy.children {
        if let Some(id) = &entry.id {
            if !roots.contains(id) {
                roots.push(id.clone());
            }
        }
        migration.walk(entry);
    }

    tracing::info!(people = migration.nodes.len(), "migrated legacy tree");
    Tree::from_parts(
        migration.order.into_iter().filter_map(|id| migration.nodes.remove(&id)),
        roots,
    )
}

#[derive(Default)]
struct Migration {
    nodes: HashMap<PersonId, Person>,
    order: Vec<PersonId>,
}

impl Migration {
    fn walk(&mut self, node: &LegacyPerson) {
        let Some(id) = node.id.clone() else {
            tracing::debug!(name = %node.name, "skipping legacy person without id");
            return;
        };
        self.register(&id, &node.name);

        let mut children: Vec<PersonId> = node.children.iter().filter_map(|c| c.id.clone()).collect();

        let spouse = node
            .spouse
            .as_deref()
            .and_then(|spouse| spouse.id.clone().map(|spouse_id| (spouse_id, spouse)));

        if let Some((spouse_id, spouse)) = &spouse {
            self.register(spouse_id, &spouse.name);
            for child in spouse.children.iter().filter_map(|c| c.id.as_ref()) {
                if !children.contains(child) {
                    children.push(child.clone());
                }
            }
            self.link_spouses(&id, spouse_id);
        }

        self.add_children(&id, &children);
        if let Some((spouse_id, _)) = &spouse {
            self.add_children(spouse_id, &children);
        }

        for child in &node.children {
            self.walk(child);
        }
        if let Some((_, spouse)) = spouse {
            for child in &spouse.children {
                self.walk(child);
            }
        }
    }

    /// Creates the node on first sight; later sightings keep the first name.
    fn register(&mut self, id: &PersonId, name: &str) {
        if !self.nodes.contains_key(id) {
            self.nodes.insert(id.clone(), Person::new(id.clone(), name));
            self.order.push(id.clone());
        }
    }

    fn link_spouses(&mut self, a: &PersonId, b: &PersonId) {
        if let Some(person) = self.nodes.get_mut(a) {
            person.spouse_id = Some(b.clone());
        }
        if let Some(person) = self.nodes.get_mut(b) {
            person.spouse_id = Some(a.clone());
        }
    }

    fn add_children(&mut self, parent: &PersonId, children: &[PersonId]) {
        if let Some(person) = self.nodes.get_mut(parent) {
            for child in children {
                person.push_child(child.clone());
            }
        }
    }
}
