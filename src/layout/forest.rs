//! Denormalisation of a [`Tree`] into nested family nodes.
//!
//! The layout works on a forest where every node carries its resolved spouse
//! and the union of both partners' children. A person is expanded at most
//! once; later occurrences become `repeat` leaves that point back at the
//! first placement.
//!
//! A top-level person whose spouse has recorded parents is held back until
//! the other entries are expanded, so the couple is drawn under the spouse's
//! parents instead of beside them.

use std::collections::HashSet;

use crate::{
    domain::{Person, PersonId, Tree},
    layout::LayoutError,
};

/// A person (or couple) with their expanded descendants.
#[derive(Debug)]
pub(super) struct FamilyNode<'t> {
    pub person: &'t Person,
    pub spouse: Option<&'t Person>,
    pub children: Vec<FamilyNode<'t>>,
    /// Set when this person was already expanded elsewhere in the forest.
    pub repeat: bool,
    /// Grid columns the whole subtree asks for.
    pub required: u32,
}

impl FamilyNode<'_> {
    /// Columns taken by the node itself: one per person plus the marriage
    /// anchor. Repeats take none.
    pub const fn span(&self) -> u32 {
        match (self.repeat, self.spouse) {
            (true, _) => 0,
            (false, Some(_)) => 3,
            (false, None) => 1,
        }
    }
}

/// The top-level entries, i.e. the children of the invisible super-root.
#[derive(Debug, Default)]
pub(super) struct Forest<'t> {
    pub roots: Vec<FamilyNode<'t>>,
}

impl Forest<'_> {
    /// Columns required by the whole forest.
    pub fn required(&self) -> u32 {
        self.roots.iter().map(|root| root.required).sum()
    }
}

/// Expands the root sequence into a forest.
///
/// Roots married into another branch are expanded after the rest of the
/// root sequence, and only if that branch did not already draw them. People
/// that cannot be reached from the root sequence are appended as extra
/// top-level entries in identifier order, so every person appears exactly
/// once.
///
/// # Errors
///
/// Returns [`LayoutError::UnknownPerson`] if a root, child or spouse
/// reference names a person that does not exist.
pub(super) fn denormalize(tree: &Tree) -> Result<Forest<'_>, LayoutError> {
    let mut builder = Builder {
        tree,
        expanded: HashSet::new(),
        path: Vec::new(),
    };
    let mut forest = Forest::default();
    let mut deferred = Vec::new();

    for root in tree.root_ids() {
        if builder.expanded.contains(root) {
            continue;
        }
        if married_into_branch(tree, root) {
            tracing::debug!(%root, "spouse has parents, drawing the couple under them");
            deferred.push(root);
            continue;
        }
        if let Some(node) = builder.expand(root)? {
            forest.roots.push(node);
        }
    }

    for root in deferred {
        if builder.expanded.contains(root) {
            continue;
        }
        if let Some(node) = builder.expand(root)? {
            forest.roots.push(node);
        }
    }

    let mut stray: Vec<&PersonId> = tree
        .people()
        .map(|person| &person.id)
        .filter(|id| !builder.expanded.contains(*id))
        .collect();
    stray.sort();

    for id in stray {
        if builder.expanded.contains(id) {
            continue;
        }
        tracing::debug!(%id, "person not reachable from roots, laying out separately");
        if let Some(node) = builder.expand(id)? {
            forest.roots.push(node);
        }
    }

    Ok(forest)
}

/// Whether the partner of `id` has a recorded parent.
fn married_into_branch(tree: &Tree, id: &PersonId) -> bool {
    tree.spouse_of(id)
        .is_some_and(|spouse| !tree.parents_of(&spouse.id).is_empty())
}

struct Builder<'t> {
    tree: &'t Tree,
    expanded: HashSet<&'t PersonId>,
    /// People on the way down from the current top-level entry.
    path: Vec<&'t PersonId>,
}

impl<'t> Builder<'t> {
    fn lookup(&self, id: &PersonId) -> Result<&'t Person, LayoutError> {
        self.tree
            .person(id)
            .ok_or_else(|| LayoutError::UnknownPerson(id.clone()))
    }

    fn expand(&mut self, id: &PersonId) -> Result<Option<FamilyNode<'t>>, LayoutError> {
        let person = self.lookup(id)?;

        if self.path.contains(&&person.id) {
            tracing::debug!(%id, "cycle in parent links, cutting it here");
            return Ok(None);
        }

        if self.expanded.contains(&person.id) {
            return Ok(Some(FamilyNode {
                person,
                spouse: None,
                children: Vec::new(),
                repeat: true,
                required: 0,
            }));
        }

        self.expanded.insert(&person.id);
        let path_len = self.path.len();
        self.path.push(&person.id);

        let spouse = match &person.spouse_id {
            Some(spouse_id) => {
                let spouse = self.lookup(spouse_id)?;
                if self.expanded.contains(&spouse.id) {
                    None
                } else {
                    self.expanded.insert(&spouse.id);
                    self.path.push(&spouse.id);
                    Some(spouse)
                }
            }
            None => None,
        };

        let mut child_ids: Vec<&'t PersonId> = person.children.iter().collect();
        if let Some(spouse) = spouse {
            for child in &spouse.children {
                if !child_ids.contains(&child) {
                    child_ids.push(child);
                }
            }
        }

        let mut children = Vec::with_capacity(child_ids.len());
        for child in child_ids {
            if let Some(node) = self.expand(child)? {
                children.push(node);
            }
        }

        self.path.truncate(path_len);

        let mut node = FamilyNode {
            person,
            spouse,
            children,
            repeat: false,
            required: 0,
        };
        let children_required: u32 = node.children.iter().map(|child| child.required).sum();
        node.required = node.span().max(children_required);

        Ok(Some(node))
    }
}
