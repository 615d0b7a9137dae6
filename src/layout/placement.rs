//! Column assignment on a per-generation grid.
//!
//! Subtrees are placed depth-first, children before their parents, so a
//! parent can be centred over the columns its children actually landed on.
//! Each generation keeps an occupancy set; a slot that collides is pushed
//! right until it fits.

use std::collections::{BTreeSet, HashMap};

use crate::{
    domain::{Person, PersonId},
    layout::forest::FamilyNode,
};

/// Column occupancy per generation.
#[derive(Debug, Default)]
struct Grid {
    rows: HashMap<u32, BTreeSet<i32>>,
}

impl Grid {
    /// Claims `span` consecutive free columns at `depth`, starting at
    /// `preferred` or the first fitting column to its right.
    fn claim(&mut self, depth: u32, preferred: i32, span: u32) -> i32 {
        let row = self.rows.entry(depth).or_default();
        let span = i32::try_from(span).unwrap_or(i32::MAX);
        let mut start = preferred;
        while let Some(&taken) = row.range(start..start.saturating_add(span)).next_back() {
            start = taken + 1;
        }
        row.extend(start..start + span);
        start
    }
}

/// Where a placed person or couple sits on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Cell {
    pub column: i32,
    pub depth: u32,
}

/// A placed entry, in placement order.
#[derive(Debug)]
pub(super) enum Slot<'t> {
    Single {
        person: &'t Person,
        cell: Cell,
    },
    /// `person` at `cell`, the marriage anchor one column right and the
    /// spouse one further.
    Couple {
        person: &'t Person,
        spouse: &'t Person,
        cell: Cell,
    },
}

/// A parent-to-child connection on the grid.
#[derive(Debug)]
pub(super) struct Descent<'t> {
    /// The parent's connector: the anchor for couples, the person otherwise.
    pub from: Cell,
    /// Whether `from` is a marriage anchor.
    pub from_anchor: bool,
    pub child: &'t PersonId,
}

/// The result of placing a forest on the grid.
#[derive(Debug, Default)]
pub(super) struct Placement<'t> {
    grid: Grid,
    cells: HashMap<&'t PersonId, Cell>,
    pub slots: Vec<Slot<'t>>,
    pub descents: Vec<Descent<'t>>,
}

impl<'t> Placement<'t> {
    /// The cell a person was placed in.
    pub fn cell(&self, id: &PersonId) -> Option<Cell> {
        self.cells.get(id).copied()
    }

    /// Places the top-level entries side by side.
    pub fn place_all(&mut self, roots: &[FamilyNode<'t>]) {
        let mut left = 0;
        for root in roots {
            self.place(root, 0, left);
            left += columns(root.required);
        }
    }

    /// Places a subtree whose allotted columns start at `left`.
    ///
    /// Returns the column of the node's own person, which for a repeat is
    /// wherever it was placed first.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn place(&mut self, node: &FamilyNode<'t>, depth: u32, left: i32) -> Option<i32> {
        if node.repeat {
            return self.cell(&node.person.id).map(|cell| cell.column);
        }

        let children_required: u32 = node.children.iter().map(|child| child.required).sum();
        let mut cursor = left + columns((node.required - children_required) / 2);
        let mut placed = Vec::with_capacity(node.children.len());
        for child in &node.children {
            if let Some(column) = self.place(child, depth + 1, cursor) {
                placed.push((column, &child.person.id));
            }
            cursor += columns(child.required);
        }

        let span = node.span();
        let preferred = if placed.is_empty() {
            left + columns((node.required - span) / 2)
        } else {
            let sum: f64 = placed.iter().map(|(column, _)| f64::from(*column)).sum();
            let centre = (sum / placed.len() as f64).round() as i32;
            if node.spouse.is_some() { centre - 1 } else { centre }
        };

        let column = self.grid.claim(depth, preferred, span);
        let cell = Cell { column, depth };
        self.cells.insert(&node.person.id, cell);

        let from = if let Some(spouse) = node.spouse {
            self.cells.insert(
                &spouse.id,
                Cell {
                    column: column + 2,
                    depth,
                },
            );
            self.slots.push(Slot::Couple {
                person: node.person,
                spouse,
                cell,
            });
            Cell {
                column: column + 1,
                depth,
            }
        } else {
            self.slots.push(Slot::Single {
                person: node.person,
                cell,
            });
            cell
        };

        for (_, child) in placed {
            self.descents.push(Descent {
                from,
                from_anchor: node.spouse.is_some(),
                child,
            });
        }

        Some(column)
    }
}

fn columns(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::Tree, layout::forest::denormalize};

    fn person(id: &str, children: &[&str], spouse: Option<&str>) -> Person {
        let mut person = Person::new(PersonId::from(id), id);
        person.children = children.iter().copied().map(PersonId::from).collect();
        person.spouse_id = spouse.map(PersonId::from);
        person
    }

    fn place(tree: &Tree) -> Placement<'_> {
        let forest = denormalize(tree).unwrap();
        let mut placement = Placement::default();
        placement.place_all(&forest.roots);
        placement
    }

    fn column(placement: &Placement<'_>, id: &str) -> i32 {
        placement.cell(&PersonId::from(id)).unwrap().column
    }

    #[test]
    fn claim_skips_taken_columns() {
        let mut grid = Grid::default();
        assert_eq!(grid.claim(0, 0, 3), 0);
        assert_eq!(grid.claim(0, 1, 1), 3);
        assert_eq!(grid.claim(0, -2, 2), -2);
        assert_eq!(grid.claim(0, -1, 2), 4);
        assert_eq!(grid.claim(1, 0, 1), 0);
    }

    #[test]
    fn couple_anchor_sits_over_single_child() {
        let tree = Tree::from_parts(
            [
                person("a", &["c"], Some("b")),
                person("b", &["c"], Some("a")),
                person("c", &[], None),
            ],
            vec![PersonId::from("a")],
        );

        let placement = place(&tree);

        assert_eq!(column(&placement, "c"), 1);
        assert_eq!(column(&placement, "a"), 0);
        assert_eq!(column(&placement, "b"), 2);
        assert_eq!(placement.descents.len(), 1);
        assert_eq!(placement.descents[0].from.column, 1);
        assert!(placement.descents[0].from_anchor);
    }

    #[test]
    fn parent_is_centred_over_children() {
        let tree = Tree::from_parts(
            [
                person("p", &["x", "y", "z"], None),
                person("x", &[], None),
                person("y", &[], None),
                person("z", &[], None),
            ],
            vec![PersonId::from("p")],
        );

        let placement = place(&tree);

        assert_eq!(column(&placement, "x"), 0);
        assert_eq!(column(&placement, "z"), 2);
        assert_eq!(column(&placement, "p"), 1);
    }

    #[test]
    fn couple_over_married_child_may_go_negative() {
        let tree = Tree::from_parts(
            [
                person("a", &["c"], Some("b")),
                person("b", &["c"], Some("a")),
                person("c", &[], Some("d")),
                person("d", &[], Some("c")),
            ],
            vec![PersonId::from("a")],
        );

        let placement = place(&tree);

        assert_eq!(column(&placement, "c"), 0);
        assert_eq!(column(&placement, "a"), -1);
    }

    #[test]
    fn siblings_of_the_forest_do_not_collide() {
        let tree = Tree::from_parts(
            [
                person("p", &["x"], None),
                person("q", &["y"], None),
                person("x", &[], Some("w")),
                person("w", &[], Some("x")),
                person("y", &[], None),
            ],
            vec![PersonId::from("p"), PersonId::from("q")],
        );

        let placement = place(&tree);

        let mut depth_one: Vec<_> = ["x", "w", "y"].iter().map(|id| column(&placement, id)).collect();
        depth_one.sort_unstable();
        depth_one.dedup();
        assert_eq!(depth_one.len(), 3);
        assert!(column(&placement, "q") > column(&placement, "p"));
    }

    #[test]
    fn repeated_child_keeps_its_first_cell() {
        let tree = Tree::from_parts(
            [
                person("p", &["c"], None),
                person("q", &["c"], None),
                person("c", &[], None),
            ],
            vec![PersonId::from("p"), PersonId::from("q")],
        );

        let placement = place(&tree);

        assert_eq!(placement.slots.len(), 3);
        assert_eq!(placement.descents.len(), 2);
        assert!(placement.descents.iter().all(|d| d.child.as_str() == "c"));
    }
}
