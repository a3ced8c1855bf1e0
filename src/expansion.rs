//! Expand/collapse state for the network view
//!
//! A plain set of open member ids. The root is always treated as open,
//! whether or not it is in the set. The state is an explicit value owned by
//! whoever drives the interaction; cloning it is the snapshot/restore story.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::{MemberId, MemberTree};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: HashSet<MemberId>,
}

impl ExpansionState {
    /// Empty set (only the root, implicitly, is open)
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state for a freshly loaded tree: `{root}`
    pub fn for_tree(tree: &MemberTree) -> Self {
        let mut state = Self::new();
        state.expanded.insert(tree.root().id.clone());
        state
    }

    /// Flip one member. Returns whether it is now expanded.
    pub fn toggle(&mut self, id: &MemberId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    pub fn expand(&mut self, id: &MemberId) {
        self.expanded.insert(id.clone());
    }

    pub fn collapse(&mut self, id: &MemberId) {
        self.expanded.remove(id);
    }

    /// Open every id in `path`
    pub fn expand_path<'a>(&mut self, path: impl IntoIterator<Item = &'a MemberId>) {
        for id in path {
            self.expand(id);
        }
    }

    /// Open every materialized member ("show everything")
    pub fn expand_all(&mut self, tree: &MemberTree) {
        self.expanded
            .extend(tree.preorder().map(|(_, m)| m.id.clone()));
    }

    /// Reset to `{root}`
    pub fn collapse_all(&mut self, root: &MemberId) {
        self.expanded.clear();
        self.expanded.insert(root.clone());
    }

    /// Open every member shallower than `depth` (depth 1 shows direct referrals).
    pub fn expand_to_depth(&mut self, tree: &MemberTree, depth: u32) {
        self.expanded.extend(
            tree.preorder()
                .filter(|(_, m)| m.depth() < depth)
                .map(|(_, m)| m.id.clone()),
        );
    }

    pub fn is_expanded(&self, id: &MemberId, is_root: bool) -> bool {
        is_root || self.expanded.contains(id)
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.expanded.contains(id)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Open ids in sorted order
    pub fn ids(&self) -> Vec<&MemberId> {
        let mut ids: Vec<&MemberId> = self.expanded.iter().collect();
        ids.sort();
        ids
    }
}
