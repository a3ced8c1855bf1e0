//! Tree layout engine
//!
//! Turns a (partially collapsed) member tree into absolute positions and an
//! edge list. Subtree-width algorithm:
//!
//! ```text
//!             R            leaves and collapsed members take one unit;
//!          ┌──┴──┐         an expanded member sits at the midpoint of its
//!          A     B         first and last visible child.
//!              ┌─┴─┐
//!             B1   B2
//!  cursor: |  A  | B1 | B2 |
//! ```
//!
//! The output is a pure function of (tree, expansion state): it is fully
//! recomputed on every change and never depends on hash iteration order.

use serde::{Deserialize, Serialize};

use crate::expansion::ExpansionState;
use crate::model::{Member, MemberId, MemberTree, NodeIndex};

/// Layout configuration constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LayoutConfig {
    /// Horizontal span of one leaf (or collapsed member)
    pub unit_width: f32,
    /// Vertical distance between depth levels
    pub level_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            unit_width: 180.0,
            level_spacing: 120.0,
        }
    }
}

/// How a visible member relates to its hidden or fetched children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// No referrals, upstream or materialized
    Leaf,
    /// Children are visible below
    Expanded,
    /// Children exist but are hidden
    Collapsed,
    /// Referrals exist upstream but were not fetched
    Truncated,
}

impl NodeState {
    fn of(member: &Member, open: bool) -> Self {
        if member.has_children() {
            if open {
                NodeState::Expanded
            } else {
                NodeState::Collapsed
            }
        } else if member.is_truncated() {
            NodeState::Truncated
        } else {
            NodeState::Leaf
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: MemberId,
    pub x: f32,
    pub y: f32,
    pub depth: u32,
    pub state: NodeState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub source_id: MemberId,
    pub target_id: MemberId,
}

/// Canvas extent of one layout pass (origin at top-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutBounds {
    pub width: f32,
    pub height: f32,
}

/// Everything the presentation layer needs to draw the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Visible members in pre-order
    pub nodes: Vec<PositionedNode>,
    /// Visible parent→child pairs, grouped by parent in pre-order
    pub edges: Vec<LayoutEdge>,
    pub bounds: LayoutBounds,
}

impl LayoutResult {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn position(&self, id: &MemberId) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn is_visible(&self, id: &MemberId) -> bool {
        self.position(id).is_some()
    }
}

enum Step {
    Enter(NodeIndex),
    /// All children placed; center the parent over them
    Exit(NodeIndex),
}

/// Layout engine that computes member positions
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Compute positions and edges for the visible part of `tree`.
    pub fn layout(&self, tree: &MemberTree, state: &ExpansionState) -> LayoutResult {
        let unit = self.config.unit_width;
        let half_unit = unit / 2.0;

        let mut nodes: Vec<PositionedNode> = Vec::new();
        let mut edges: Vec<LayoutEdge> = Vec::new();
        // Arena index -> position in `nodes`; only read for visited members
        let mut slots: Vec<usize> = vec![0; tree.len()];
        let mut cursor = 0.0_f32;
        let mut max_y = 0.0_f32;

        let mut stack = vec![Step::Enter(tree.root_index())];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(idx) => {
                    let member = tree.get(idx);
                    let open = state.is_expanded(&member.id, tree.is_root(idx));
                    let node_state = NodeState::of(member, open);
                    let y = member.depth() as f32 * self.config.level_spacing;
                    max_y = max_y.max(y);

                    slots[idx.as_usize()] = nodes.len();
                    nodes.push(PositionedNode {
                        id: member.id.clone(),
                        x: 0.0,
                        y,
                        depth: member.depth(),
                        state: node_state,
                    });

                    if node_state == NodeState::Expanded {
                        stack.push(Step::Exit(idx));
                        for &child in member.children().iter().rev() {
                            stack.push(Step::Enter(child));
                        }
                        edges.extend(member.children().iter().map(|&child| LayoutEdge {
                            source_id: member.id.clone(),
                            target_id: tree.get(child).id.clone(),
                        }));
                    } else {
                        let slot = slots[idx.as_usize()];
                        nodes[slot].x = cursor + half_unit;
                        cursor += unit;
                    }
                }
                Step::Exit(idx) => {
                    let children = tree.get(idx).children();
                    if let (Some(first), Some(last)) = (children.first(), children.last()) {
                        let first_x = nodes[slots[first.as_usize()]].x;
                        let last_x = nodes[slots[last.as_usize()]].x;
                        let slot = slots[idx.as_usize()];
                        nodes[slot].x = (first_x + last_x) / 2.0;
                    }
                }
            }
        }

        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            width = cursor,
            "layout pass complete"
        );

        LayoutResult {
            nodes,
            edges,
            bounds: LayoutBounds {
                width: cursor,
                height: max_y,
            },
        }
    }
}

/// Convenience wrapper around `LayoutEngine::layout`
pub fn layout(tree: &MemberTree, state: &ExpansionState, config: LayoutConfig) -> LayoutResult {
    LayoutEngine::new(config).layout(tree, state)
}
