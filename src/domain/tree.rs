//! In-memory family tree and its mutation engine.
//!
//! The [`Tree`] knows nothing about storage or rendering. Every mutation takes
//! `&self` and returns a new snapshot, so callers can keep the previous value
//! around (for example to discard a rejected edit).
//!
//! People are stored behind [`Arc`] pointers. Producing a new snapshot clones
//! the map of pointers, and a person is only copied when it is modified.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::domain::{Person, PersonId};

/// The kind of relative inserted next to an existing person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// A new child of the target (and of the target's partner).
    Child,
    /// A new parent of the target.
    Parent,
    /// A new sibling of the target.
    Sibling,
    /// A new partner of the target.
    Spouse,
}

impl Relation {
    /// All relation kinds, in menu order.
    pub const ALL: [Self; 4] = [Self::Child, Self::Parent, Self::Sibling, Self::Spouse];

    /// The lowercase name of the relation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Parent => "parent",
            Self::Sibling => "sibling",
            Self::Spouse => "spouse",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown relation name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown relation '{0}': expected one of child, parent, sibling, spouse")]
pub struct UnknownRelation(String);

impl FromStr for Relation {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|relation| relation.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRelation(s.to_string()))
    }
}

/// Errors that reject an insertion.
///
/// The display text is the notice shown to the user. The caller's tree is
/// never modified when an error is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    /// The target already has two recorded parents.
    #[error("This person already has two parents.")]
    TwoParents(PersonId),

    /// The target does not exist in the tree.
    #[error("person {0} not found")]
    UnknownPerson(PersonId),
}

/// The result of a successful insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    /// The new snapshot.
    pub tree: Tree,
    /// Identifier of the person that was created.
    pub id: PersonId,
}

/// A family tree: people keyed by identifier plus the ordered root sequence.
///
/// A listed root never has a recorded parent. A person without a parent is
/// either listed as a root or attached to the tree through their spouse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "TreeData", into = "TreeData")]
pub struct Tree {
    /// People, keyed by identifier.
    nodes: HashMap<PersonId, Arc<Person>>,

    /// People with no recorded parent, in display order.
    roots: Vec<PersonId>,

    /// Parents of each person, in the order the links were made.
    ///
    /// Derived from `nodes`; kept in step by every mutation.
    parents: HashMap<PersonId, Vec<PersonId>>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.roots == other.roots && self.nodes == other.nodes
    }
}

impl Eq for Tree {}

impl Tree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a set of people and a root sequence.
    ///
    /// References are not validated.
    pub fn from_parts(people: impl IntoIterator<Item = Person>, roots: Vec<PersonId>) -> Self {
        let nodes = people
            .into_iter()
            .map(|person| (person.id.clone(), Arc::new(person)))
            .collect();
        let mut tree = Self {
            nodes,
            roots,
            parents: HashMap::new(),
        };
        tree.rebuild_parent_index();
        tree
    }

    /// The number of people in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no people.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a person with this identifier exists.
    #[must_use]
    pub fn contains(&self, id: &PersonId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up a person.
    #[must_use]
    pub fn person(&self, id: &PersonId) -> Option<&Person> {
        self.nodes.get(id).map(AsRef::as_ref)
    }

    /// Iterates over all people in no particular order.
    pub fn people(&self) -> impl Iterator<Item = &Person> + '_ {
        self.nodes.values().map(AsRef::as_ref)
    }

    /// The root sequence.
    #[must_use]
    pub fn root_ids(&self) -> &[PersonId] {
        &self.roots
    }

    /// The recorded parents of a person.
    #[must_use]
    pub fn parents_of(&self, id: &PersonId) -> &[PersonId] {
        self.parents.get(id).map_or(&[], Vec::as_slice)
    }

    /// The first recorded parent of a person.
    #[must_use]
    pub fn parent_of(&self, id: &PersonId) -> Option<&PersonId> {
        self.parents_of(id).first()
    }

    /// The partner of a person, if both exist.
    #[must_use]
    pub fn spouse_of(&self, id: &PersonId) -> Option<&Person> {
        self.person(id)?
            .spouse_id
            .as_ref()
            .and_then(|spouse| self.person(spouse))
    }

    /// Adds a new person at the top level.
    #[instrument(skip(self, name))]
    pub fn add_root(&self, name: impl Into<String>) -> Inserted {
        let mut tree = self.clone();
        let id = tree.fresh_id();
        tree.insert_person(Person::new(id.clone(), name));
        tree.roots.push(id.clone());
        tracing::debug!(%id, "added top-level person");
        Inserted { tree, id }
    }

    /// Creates a new person related to `target`.
    ///
    /// # Errors
    ///
    /// - [`InsertError::UnknownPerson`] if `target` does not exist
    /// - [`InsertError::TwoParents`] when adding a parent to someone who
    ///   already has two
    #[instrument(skip(self, name))]
    pub fn insert_related(
        &self,
        target: &PersonId,
        relation: Relation,
        name: impl Into<String>,
    ) -> Result<Inserted, InsertError> {
        if !self.contains(target) {
            return Err(InsertError::UnknownPerson(target.clone()));
        }
        if relation == Relation::Parent {
            self.check_parent_capacity(target)?;
        }

        let mut tree = self.clone();
        let id = tree.fresh_id();
        tree.insert_person(Person::new(id.clone(), name));

        match relation {
            Relation::Child => {
                tree.link_child(target, &id);
                tree.sync_partner_children(target);
            }
            Relation::Spouse => tree.replace_partner(target, &id),
            Relation::Sibling => tree.attach_sibling(target, &id),
            Relation::Parent => tree.attach_parent(target, &id),
        }

        tracing::debug!(%id, "inserted relative");
        Ok(Inserted { tree, id })
    }

    /// Removes a person and repairs every reference to them.
    ///
    /// Children pass to the surviving spouse when there is one. Otherwise any
    /// child left without a parent becomes a root. Deleting an unknown person
    /// returns an identical tree.
    #[must_use]
    #[instrument(skip(self))]
    pub fn delete_person(&self, id: &PersonId) -> Self {
        let Some(deleted) = self.nodes.get(id).cloned() else {
            tracing::debug!("person not found, nothing to delete");
            return self.clone();
        };

        let mut tree = self.clone();
        tree.nodes.remove(id);
        tree.remove_root(id);

        for parent in tree.parents.remove(id).unwrap_or_default() {
            if let Some(parent) = tree.person_mut(&parent) {
                parent.children.retain(|child| child != id);
            }
        }
        tree.forget_parent(id);

        let survivor = deleted
            .spouse_id
            .as_ref()
            .filter(|spouse| tree.contains(spouse))
            .cloned();

        if let Some(survivor) = survivor {
            if let Some(spouse) = tree.person_mut(&survivor) {
                spouse.spouse_id = None;
            }
            for child in &deleted.children {
                if tree.contains(child) {
                    tree.link_child(&survivor, child);
                    tree.remove_root(child);
                }
            }
            if tree.parents_of(&survivor).is_empty() {
                tree.ensure_root(&survivor);
            }
        } else {
            for child in &deleted.children {
                if tree.contains(child) && tree.parents_of(child).is_empty() {
                    tree.ensure_root(child);
                }
            }
        }

        tree.scrub_references(id);
        tracing::debug!(name = %deleted.name, "deleted person");
        tree
    }
}

impl Tree {
    fn fresh_id(&self) -> PersonId {
        loop {
            let id = PersonId::random();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert_person(&mut self, person: Person) {
        self.nodes.insert(person.id.clone(), Arc::new(person));
    }

    fn person_mut(&mut self, id: &PersonId) -> Option<&mut Person> {
        self.nodes.get_mut(id).map(Arc::make_mut)
    }

    fn check_parent_capacity(&self, target: &PersonId) -> Result<(), InsertError> {
        match self.parents_of(target) {
            [] => Ok(()),
            [parent] if self.person(parent).is_none_or(|p| p.spouse_id.is_none()) => Ok(()),
            _ => Err(InsertError::TwoParents(target.clone())),
        }
    }

    /// Records `child` under `parent`, keeping the parent index in step.
    fn link_child(&mut self, parent: &PersonId, child: &PersonId) {
        let Some(person) = self.person_mut(parent) else {
            return;
        };
        person.push_child(child.clone());
        let parents = self.parents.entry(child.clone()).or_default();
        if !parents.contains(parent) {
            parents.push(parent.clone());
        }
    }

    fn forget_parent(&mut self, parent: &PersonId) {
        self.parents.retain(|_, parents| {
            parents.retain(|p| p != parent);
            !parents.is_empty()
        });
    }

    fn marry(&mut self, a: &PersonId, b: &PersonId) {
        if let Some(person) = self.person_mut(a) {
            person.spouse_id = Some(b.clone());
        }
        if let Some(person) = self.person_mut(b) {
            person.spouse_id = Some(a.clone());
        }
        self.sync_partner_children(a);
    }

    /// Marries `target` to `id`. A previous partner is left single, keeping
    /// their children, and listed as a root if they have no parent.
    fn replace_partner(&mut self, target: &PersonId, id: &PersonId) {
        let previous = self.person(target).and_then(|p| p.spouse_id.clone());
        if let Some(previous) = previous {
            if let Some(person) = self.person_mut(&previous) {
                person.spouse_id = None;
            }
            if self.contains(&previous) && self.parents_of(&previous).is_empty() {
                self.ensure_root(&previous);
            }
            tracing::debug!(%previous, "previous partner left single");
        }
        self.marry(target, id);
    }

    /// Makes both partners list the union of their children.
    ///
    /// The order is `id`'s children followed by any the partner had in
    /// addition.
    fn sync_partner_children(&mut self, id: &PersonId) {
        let Some(spouse) = self.person(id).and_then(|p| p.spouse_id.clone()) else {
            return;
        };
        let Some(theirs) = self.person(&spouse).map(|p| p.children.clone()) else {
            return;
        };
        for child in &theirs {
            self.link_child(id, child);
        }
        let union = self
            .person(id)
            .map(|p| p.children.clone())
            .unwrap_or_default();
        for child in &union {
            self.link_child(&spouse, child);
        }
        if let Some(partner) = self.person_mut(&spouse) {
            partner.children = union;
        }
    }

    fn attach_sibling(&mut self, target: &PersonId, id: &PersonId) {
        if let Some(parent) = self.parent_of(target).cloned() {
            self.link_child(&parent, id);
            self.sync_partner_children(&parent);
            return;
        }

        let group = self.sibling_group(target);
        for member in &group {
            if let Some(person) = self.person_mut(member) {
                person.push_sibling(id.clone());
            }
            if let Some(person) = self.person_mut(id) {
                person.push_sibling(member.clone());
            }
        }
        self.ensure_root(id);
    }

    fn attach_parent(&mut self, target: &PersonId, id: &PersonId) {
        if let Some(parent) = self.parent_of(target).cloned() {
            // The existing single parent gains the new person as partner.
            self.marry(&parent, id);
            return;
        }

        let group = self.sibling_group(target);
        let insert_at = self.roots.iter().position(|r| r == target).map(|pos| {
            self.roots[..pos]
                .iter()
                .filter(|r| !group.contains(r))
                .count()
        });

        for member in &group {
            self.link_child(id, member);
            self.remove_root(member);
        }
        self.clear_sibling_links(&group);

        match insert_at {
            Some(index) => self.roots.insert(index, id.clone()),
            None => self.roots.push(id.clone()),
        }

        for member in &group {
            self.move_partner_to_end(member);
        }
    }

    /// The target followed by its recorded root-level siblings.
    fn sibling_group(&self, target: &PersonId) -> Vec<PersonId> {
        let mut group = vec![target.clone()];
        if let Some(person) = self.person(target) {
            for sibling in &person.sibling_ids {
                if self.contains(sibling) && !group.contains(sibling) {
                    group.push(sibling.clone());
                }
            }
        }
        group
    }

    fn clear_sibling_links(&mut self, group: &[PersonId]) {
        let affected: Vec<PersonId> = self
            .nodes
            .values()
            .filter(|p| group.contains(&p.id) || p.sibling_ids.iter().any(|s| group.contains(s)))
            .map(|p| p.id.clone())
            .collect();

        for id in affected {
            if let Some(person) = self.person_mut(&id) {
                if group.contains(&id) {
                    person.sibling_ids.clear();
                } else {
                    person.sibling_ids.retain(|s| !group.contains(s));
                }
            }
        }
    }

    /// Moves the partner of `id` to the end of their own parents' children.
    fn move_partner_to_end(&mut self, id: &PersonId) {
        let Some(partner) = self.person(id).and_then(|p| p.spouse_id.clone()) else {
            return;
        };
        for parent in self.parents_of(&partner).to_vec() {
            if let Some(person) = self.person_mut(&parent) {
                if let Some(index) = person.children.iter().position(|c| c == &partner) {
                    let moved = person.children.remove(index);
                    person.children.push(moved);
                }
            }
        }
    }

    fn ensure_root(&mut self, id: &PersonId) {
        if !self.roots.contains(id) {
            self.roots.push(id.clone());
        }
    }

    fn remove_root(&mut self, id: &PersonId) {
        self.roots.retain(|root| root != id);
    }

    /// Strips every child, spouse and sibling reference to `id`.
    fn scrub_references(&mut self, id: &PersonId) {
        let affected: Vec<PersonId> = self
            .nodes
            .values()
            .filter(|p| {
                p.has_child(id) || p.spouse_id.as_ref() == Some(id) || p.sibling_ids.contains(id)
            })
            .map(|p| p.id.clone())
            .collect();

        for other in affected {
            if let Some(person) = self.person_mut(&other) {
                person.children.retain(|c| c != id);
                person.sibling_ids.retain(|s| s != id);
                if person.spouse_id.as_ref() == Some(id) {
                    person.spouse_id = None;
                }
            }
        }
    }

    fn rebuild_parent_index(&mut self) {
        let mut ids: Vec<&PersonId> = self.nodes.keys().collect();
        ids.sort();

        let mut parents: HashMap<PersonId, Vec<PersonId>> = HashMap::new();
        for id in ids {
            for child in &self.nodes[id].children {
                let entry = parents.entry(child.clone()).or_default();
                if !entry.contains(id) {
                    entry.push(id.clone());
                }
            }
        }
        self.parents = parents;
    }
}

/// The persisted shape of a tree: `{ nodes: { [id]: Person }, rootIds: [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeData {
    nodes: BTreeMap<PersonId, Person>,
    root_ids: Vec<PersonId>,
}

impl From<TreeData> for Tree {
    fn from(data: TreeData) -> Self {
        let people = data.nodes.into_iter().map(|(key, mut person)| {
            if person.id != key {
                tracing::warn!(%key, id = %person.id, "node key and person id disagree, using key");
                person.id = key;
            }
            person
        });
        Self::from_parts(people, data.root_ids)
    }
}

impl From<Tree> for TreeData {
    fn from(tree: Tree) -> Self {
        let nodes = tree
            .nodes
            .into_iter()
            .map(|(id, person)| (id, Arc::unwrap_or_clone(person)))
            .collect();
        Self {
            nodes,
            root_ids: tree.roots,
        }
    }
}
