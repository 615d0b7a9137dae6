//! Pixel layout of a family tree diagram.
//!
//! [`compute_layout`] turns a [`Tree`] into positioned boxes and connector
//! geometry. The result is pure data: a renderer only has to draw what it is
//! given. Partners sit side by side with a small marriage anchor between
//! them, each generation occupies its own row, and a parent is centred over
//! the children below it.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{PersonId, Tree};

mod forest;
mod placement;

use placement::{Cell, Placement, Slot};

/// Pixel metrics for the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    /// Width of a person box.
    pub node_width: f64,
    /// Height of a person box.
    pub node_height: f64,
    /// Gap between neighbouring grid columns.
    pub horizontal_gap: f64,
    /// Gap between generations.
    pub vertical_gap: f64,
    /// Side length of the marriage anchor.
    pub anchor_size: f64,
    /// Space kept free to the right of and below the drawing.
    pub margin: f64,
    /// Smallest canvas width.
    pub min_width: f64,
    /// Smallest canvas height.
    pub min_height: f64,
    /// Canvas width used when no layout could be computed.
    pub fallback_width: f64,
    /// Canvas height used when no layout could be computed.
    pub fallback_height: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            node_width: 140.0,
            node_height: 48.0,
            horizontal_gap: 40.0,
            vertical_gap: 80.0,
            anchor_size: 12.0,
            margin: 40.0,
            min_width: 400.0,
            min_height: 240.0,
            fallback_width: 600.0,
            fallback_height: 400.0,
        }
    }
}

impl LayoutMetrics {
    fn column_x(&self, column: i32) -> f64 {
        f64::from(column) * (self.node_width + self.horizontal_gap)
    }

    fn row_y(&self, depth: u32) -> f64 {
        f64::from(depth) * (self.node_height + self.vertical_gap)
    }
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position, growing to the right.
    pub x: f64,
    /// Vertical position, growing downwards.
    pub y: f64,
}

impl Point {
    const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a [`VisualNode`] stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A person box.
    Person {
        /// The person shown.
        id: PersonId,
        /// Display name.
        name: String,
    },
    /// The small anchor between two partners.
    Marriage {
        /// The two partners, left one first.
        partners: [PersonId; 2],
    },
}

/// A positioned box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    /// What the box stands for.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Box width.
    pub width: f64,
    /// Box height.
    pub height: f64,
}

impl VisualNode {
    /// A key that is unique within one layout.
    ///
    /// People are keyed by their id, anchors by both partner ids.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.kind {
            NodeKind::Person { id, .. } => id.to_string(),
            NodeKind::Marriage { partners: [a, b] } => format!("marriage:{a}:{b}"),
        }
    }

    /// The person shown, if this is a person box.
    #[must_use]
    pub const fn person_id(&self) -> Option<&PersonId> {
        match &self.kind {
            NodeKind::Person { id, .. } => Some(id),
            NodeKind::Marriage { .. } => None,
        }
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Connector geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    /// From the side of a partner's box to the centre of the marriage anchor.
    Spouse {
        /// Start on the partner's box.
        from: Point,
        /// Centre of the anchor.
        to: Point,
    },
    /// An elbowed line from a parent connector down to a child's top edge.
    ///
    /// The line drops to the midpoint between the generations, runs across
    /// to the child's centre and drops again.
    ParentChild {
        /// The polyline, top to bottom.
        points: [Point; 4],
    },
    /// A straight line between the centres of two root-level siblings.
    Sibling {
        /// Centre of the first sibling.
        from: Point,
        /// Centre of the second sibling.
        to: Point,
    },
}

impl Edge {
    fn shift_x(&mut self, dx: f64) {
        match self {
            Self::Spouse { from, to } | Self::Sibling { from, to } => {
                from.x += dx;
                to.x += dx;
            }
            Self::ParentChild { points } => {
                for point in points {
                    point.x += dx;
                }
            }
        }
    }
}

/// The error raised when a tree cannot be laid out.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    /// A root, child or spouse reference names a person that does not exist.
    #[error("person {0} is referenced but does not exist")]
    UnknownPerson(PersonId),
}

/// A laid out diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Person boxes and marriage anchors.
    pub nodes: Vec<VisualNode>,
    /// Connectors.
    pub edges: Vec<Edge>,
    /// Canvas width.
    pub width: f64,
    /// Canvas height.
    pub height: f64,
}

impl Layout {
    /// An empty canvas of the given size.
    #[must_use]
    pub const fn empty(width: f64, height: f64) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            width,
            height,
        }
    }

    /// Lays out `tree`, falling back to an empty canvas of the fallback size
    /// if the tree is malformed.
    #[must_use]
    pub fn compute_or_empty(tree: &Tree, metrics: &LayoutMetrics) -> Self {
        compute_layout(tree, metrics).unwrap_or_else(|error| {
            tracing::warn!(%error, "layout failed, rendering an empty canvas");
            Self::empty(metrics.fallback_width, metrics.fallback_height)
        })
    }

    /// Looks up the box of a person.
    #[must_use]
    pub fn person_node(&self, id: &PersonId) -> Option<&VisualNode> {
        self.nodes.iter().find(|node| node.person_id() == Some(id))
    }

    /// Shifts everything right if anything starts left of zero, then sizes
    /// the canvas to fit.
    fn normalize(&mut self, metrics: &LayoutMetrics) {
        let min_x = self
            .nodes
            .iter()
            .map(|node| node.x)
            .fold(f64::INFINITY, f64::min);
        if min_x < 0.0 {
            let dx = -min_x + metrics.horizontal_gap;
            tracing::debug!(dx, "shifting layout right");
            for node in &mut self.nodes {
                node.x += dx;
            }
            for edge in &mut self.edges {
                edge.shift_x(dx);
            }
        }

        let max_x = self
            .nodes
            .iter()
            .map(|node| node.x + node.width)
            .fold(0.0, f64::max);
        let max_y = self
            .nodes
            .iter()
            .map(|node| node.y + node.height)
            .fold(0.0, f64::max);
        self.width = metrics.min_width.max((max_x + metrics.margin).ceil());
        self.height = metrics.min_height.max((max_y + metrics.margin).ceil());
    }
}

/// Computes the diagram layout of `tree`.
///
/// Every person gets exactly one box and every couple one marriage anchor.
/// People that cannot be reached from the roots are laid out as extra
/// top-level entries. Coordinates are never negative; the whole drawing is
/// shifted right if centring pushed anything past the left edge.
///
/// # Errors
///
/// Returns [`LayoutError::UnknownPerson`] if the tree references a person
/// that is not in it.
#[instrument(skip_all, fields(people = tree.len()))]
pub fn compute_layout(tree: &Tree, metrics: &LayoutMetrics) -> Result<Layout, LayoutError> {
    let forest = forest::denormalize(tree)?;
    tracing::debug!(columns = forest.required(), "denormalised tree");

    let mut placement = Placement::default();
    placement.place_all(&forest.roots);

    let mut layout = Painter {
        metrics,
        placement: &placement,
    }
    .paint(tree);
    layout.normalize(metrics);

    tracing::debug!(
        nodes = layout.nodes.len(),
        edges = layout.edges.len(),
        width = layout.width,
        height = layout.height,
        "computed layout"
    );
    Ok(layout)
}

/// Converts grid cells into pixel geometry.
struct Painter<'a, 't> {
    metrics: &'a LayoutMetrics,
    placement: &'a Placement<'t>,
}

impl Painter<'_, '_> {
    fn paint(&self, tree: &Tree) -> Layout {
        let mut layout = Layout::empty(0.0, 0.0);

        for slot in &self.placement.slots {
            match slot {
                Slot::Single { person, cell } => {
                    layout.nodes.push(self.person_box(&person.id, &person.name, *cell));
                }
                Slot::Couple {
                    person,
                    spouse,
                    cell,
                } => {
                    let left = self.person_box(&person.id, &person.name, *cell);
                    let anchor = self.anchor_box(person.id.clone(), spouse.id.clone(), *cell);
                    let right = self.person_box(
                        &spouse.id,
                        &spouse.name,
                        Cell {
                            column: cell.column + 2,
                            ..*cell
                        },
                    );

                    let anchor_centre = anchor.center();
                    layout.edges.push(Edge::Spouse {
                        from: Point::new(left.x + left.width, left.center().y),
                        to: anchor_centre,
                    });
                    layout.edges.push(Edge::Spouse {
                        from: Point::new(right.x, right.center().y),
                        to: anchor_centre,
                    });

                    layout.nodes.push(left);
                    layout.nodes.push(anchor);
                    layout.nodes.push(right);
                }
            }
        }

        for descent in &self.placement.descents {
            if let Some(child) = self.placement.cell(descent.child) {
                layout.edges.push(self.descent_edge(descent.from, descent.from_anchor, child));
            }
        }

        for slot in &self.placement.slots {
            let people = match slot {
                Slot::Single { person, .. } => [Some(*person), None],
                Slot::Couple { person, spouse, .. } => [Some(*person), Some(*spouse)],
            };
            for person in people.into_iter().flatten() {
                for sibling in &person.sibling_ids {
                    if person.id >= *sibling || !tree.contains(sibling) {
                        continue;
                    }
                    if let (Some(a), Some(b)) =
                        (self.placement.cell(&person.id), self.placement.cell(sibling))
                    {
                        layout.edges.push(Edge::Sibling {
                            from: self.cell_centre(a),
                            to: self.cell_centre(b),
                        });
                    }
                }
            }
        }

        layout
    }

    fn person_box(&self, id: &PersonId, name: &str, cell: Cell) -> VisualNode {
        VisualNode {
            kind: NodeKind::Person {
                id: id.clone(),
                name: name.to_string(),
            },
            x: self.metrics.column_x(cell.column),
            y: self.metrics.row_y(cell.depth),
            width: self.metrics.node_width,
            height: self.metrics.node_height,
        }
    }

    /// The anchor is centred in the grid cell right of `cell`.
    fn anchor_box(&self, left: PersonId, right: PersonId, cell: Cell) -> VisualNode {
        let m = self.metrics;
        VisualNode {
            kind: NodeKind::Marriage {
                partners: [left, right],
            },
            x: m.column_x(cell.column + 1) + (m.node_width - m.anchor_size) / 2.0,
            y: m.row_y(cell.depth) + (m.node_height - m.anchor_size) / 2.0,
            width: m.anchor_size,
            height: m.anchor_size,
        }
    }

    fn cell_centre(&self, cell: Cell) -> Point {
        let m = self.metrics;
        Point::new(
            m.column_x(cell.column) + m.node_width / 2.0,
            m.row_y(cell.depth) + m.node_height / 2.0,
        )
    }

    fn descent_edge(&self, from: Cell, from_anchor: bool, child: Cell) -> Edge {
        let m = self.metrics;
        let centre = self.cell_centre(from);
        let start_y = if from_anchor {
            centre.y + m.anchor_size / 2.0
        } else {
            m.row_y(from.depth) + m.node_height
        };
        let mid_y = m.row_y(from.depth) + m.node_height + m.vertical_gap / 2.0;
        let child_x = self.cell_centre(child).x;
        let child_top = m.row_y(child.depth);

        Edge::ParentChild {
            points: [
                Point::new(centre.x, start_y),
                Point::new(centre.x, mid_y),
                Point::new(child_x, mid_y),
                Point::new(child_x, child_top),
            ],
        }
    }
}
