use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters kept from a generated UUID.
const ID_LENGTH: usize = 10;

/// An opaque, URL-safe identifier for a person.
///
/// Identifiers loaded from storage are taken as-is. Fresh identifiers are
/// short lowercase hex strings cut from a v4 UUID; the [`Tree`] retries
/// generation until the candidate is unused.
///
/// [`Tree`]: crate::Tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    /// Wraps an existing identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random candidate identifier.
    ///
    /// Uniqueness is not checked here.
    #[must_use]
    pub(crate) fn random() -> Self {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(ID_LENGTH);
        Self(simple)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PersonId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for PersonId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PersonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One individual in the family tree.
///
/// Relationships are held by identifier only. A person never owns another
/// person; the [`Tree`](crate::Tree) resolves identifiers through its node
/// map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,

    /// Display name.
    pub name: String,

    /// Children in display order. Partners keep the same set of children.
    #[serde(default)]
    pub children: Vec<PersonId>,

    /// The partner, if any. Always mirrored on the partner's side.
    #[serde(default)]
    pub spouse_id: Option<PersonId>,

    /// Root-level siblings.
    ///
    /// Only used while the person has no recorded parent; cleared as soon as
    /// a shared parent is inserted.
    #[serde(default)]
    pub sibling_ids: Vec<PersonId>,
}

impl Person {
    /// Creates a person with no relationships.
    #[must_use]
    pub fn new(id: PersonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            children: Vec::new(),
            spouse_id: None,
            sibling_ids: Vec::new(),
        }
    }

    /// Whether `id` is listed among this person's children.
    #[must_use]
    pub fn has_child(&self, id: &PersonId) -> bool {
        self.children.contains(id)
    }

    /// Appends a child unless it is already listed.
    ///
    /// Returns `true` if the child was added.
    pub(crate) fn push_child(&mut self, id: PersonId) -> bool {
        if self.children.contains(&id) {
            false
        } else {
            self.children.push(id);
            true
        }
    }

    /// Appends a root-level sibling unless it is already listed.
    pub(crate) fn push_sibling(&mut self, id: PersonId) {
        if id != self.id && !self.sibling_ids.contains(&id) {
            self.sibling_ids.push(id);
        }
    }
}
