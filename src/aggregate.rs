//! Subtree statistics
//!
//! Aggregation always considers the whole materialized tree, independent of
//! what is currently expanded. Because the arena is stored in pre-order, a
//! reverse sweep visits every child before its parent, which gives the
//! post-order fold without recursion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{MemberId, MemberTree, NodeIndex};

/// Derived statistics over one subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Self plus all descendants
    pub subtree_size: usize,
    pub total_invested: Decimal,
    pub total_returns: Decimal,
    /// Members in the subtree with at least one investment
    pub active_count: usize,
    /// Longest chain of descendants, 0 for a leaf
    pub max_depth: u32,
}

impl Aggregate {
    /// Base case: one member with no descendants
    fn leaf(tree: &MemberTree, idx: NodeIndex) -> Self {
        let metrics = &tree.get(idx).metrics;
        Self {
            subtree_size: 1,
            total_invested: metrics.invested_or_zero(),
            total_returns: metrics.earned_or_zero(),
            active_count: usize::from(metrics.is_active()),
            max_depth: 0,
        }
    }

    // Sums cannot overflow: `MemberTree::from_raw` rejects snapshots whose
    // absolute amounts do not total within `Decimal` range.
    fn absorb_child(&mut self, child: &Aggregate) {
        self.subtree_size += child.subtree_size;
        self.total_invested += child.total_invested;
        self.total_returns += child.total_returns;
        self.active_count += child.active_count;
        self.max_depth = self.max_depth.max(child.max_depth + 1);
    }

    /// Descendants only (excludes the member itself)
    pub fn descendant_count(&self) -> usize {
        self.subtree_size - 1
    }
}

/// Post-order fold over arena indices `range`, returned in the same order.
fn fold_range(tree: &MemberTree, range: std::ops::Range<usize>) -> Vec<Aggregate> {
    let base = range.start;
    let mut results: Vec<Aggregate> = range
        .clone()
        .map(|i| Aggregate::leaf(tree, NodeIndex(i)))
        .collect();

    for i in range.rev() {
        if let Some(parent) = tree.get(NodeIndex(i)).parent() {
            if parent.0 < base {
                continue;
            }
            let child = results[i - base];
            results[parent.0 - base].absorb_child(&child);
        }
    }
    results
}

/// Statistics for the subtree rooted at `idx`, in one pass over that subtree.
pub fn aggregate(tree: &MemberTree, idx: NodeIndex) -> Aggregate {
    let range = tree.subtree_range(idx);
    fold_range(tree, range)[0]
}

/// Every member's `Aggregate`, computed once per snapshot.
///
/// Read-only for consumers; reload the tree to get new numbers.
#[derive(Debug, Clone)]
pub struct AggregateTable {
    ids: Vec<MemberId>,
    positions: HashMap<MemberId, usize>,
    aggregates: Vec<Aggregate>,
}

impl AggregateTable {
    pub fn compute(tree: &MemberTree) -> Self {
        let aggregates = fold_range(tree, 0..tree.len());
        let ids: Vec<MemberId> = tree.preorder().map(|(_, m)| m.id.clone()).collect();
        let positions = ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        let table = Self {
            ids,
            positions,
            aggregates,
        };
        let root = table.root();
        tracing::debug!(
            subtree_size = root.subtree_size,
            active = root.active_count,
            max_depth = root.max_depth,
            "aggregates computed"
        );
        table
    }

    pub fn root(&self) -> &Aggregate {
        &self.aggregates[0]
    }

    pub fn at(&self, idx: NodeIndex) -> Option<&Aggregate> {
        self.aggregates.get(idx.0)
    }

    pub fn get(&self, id: &MemberId) -> Option<&Aggregate> {
        self.positions.get(id).and_then(|&i| self.aggregates.get(i))
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MemberId, &Aggregate)> + '_ {
        self.ids.iter().zip(self.aggregates.iter())
    }
}

/// Per-level totals beneath a member (level 1 = direct referrals)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub level: u32,
    pub members: usize,
    pub invested: Decimal,
    pub active: usize,
}

/// Break the subtree under `idx` down by relative depth.
pub fn level_breakdown(tree: &MemberTree, idx: NodeIndex) -> Vec<LevelSummary> {
    let base_depth = tree.get(idx).depth();
    let mut levels: Vec<LevelSummary> = Vec::new();

    for i in tree.subtree_range(idx).skip(1) {
        let member = tree.get(NodeIndex(i));
        let level = member.depth() - base_depth;
        while levels.len() < level as usize {
            levels.push(LevelSummary {
                level: levels.len() as u32 + 1,
                members: 0,
                invested: Decimal::ZERO,
                active: 0,
            });
        }
        let slot = &mut levels[level as usize - 1];
        slot.members += 1;
        slot.invested += member.metrics.invested_or_zero();
        slot.active += usize::from(member.metrics.is_active());
    }
    levels
}
