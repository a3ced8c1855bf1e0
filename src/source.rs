//! Hierarchy retrieval boundary
//!
//! The engine never performs I/O itself. A `HierarchySource` delivers a
//! depth-bounded raw snapshot (and answers point lookups for members outside
//! the materialized tree); retries and cancellation belong to implementors.

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::model::{parse_snapshot, MemberId, RawMember};
use crate::search::SearchQuery;

#[async_trait]
pub trait HierarchySource: Send + Sync {
    /// Nested snapshot rooted at `root`, at most `max_depth` levels deep.
    /// `Ok(None)` when the source has no such member.
    async fn fetch_hierarchy(
        &self,
        root: &MemberId,
        max_depth: u32,
    ) -> Result<Option<RawMember>, NetworkError>;

    /// At most one member matching `query`, without its children.
    async fn lookup(&self, query: &SearchQuery) -> Result<Option<RawMember>, NetworkError>;
}

/// In-memory source over one complete raw document.
///
/// Used for offline snapshots and tests. Fetches re-root the document and
/// prune it the way a depth-bounded backend would, keeping the pruned
/// referral count in `directChildCount`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    document: Option<RawMember>,
}

impl SnapshotSource {
    pub fn new(document: RawMember) -> Self {
        Self {
            document: Some(document),
        }
    }

    /// Parse a JSON document; `null` yields a source with no members.
    pub fn from_json(json: &str) -> Result<Self, NetworkError> {
        let document = parse_snapshot(json)?;
        Ok(Self { document })
    }

    /// Id of the document's root member, if any
    pub fn root_id(&self) -> Option<MemberId> {
        self.document.as_ref().and_then(RawMember::member_id)
    }

    /// First raw member (pre-order) satisfying `pred`
    fn find_raw<F>(&self, mut pred: F) -> Option<&RawMember>
    where
        F: FnMut(&RawMember) -> bool,
    {
        let mut stack: Vec<&RawMember> = self.document.iter().collect();
        while let Some(node) = stack.pop() {
            if pred(node) {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

/// Copy `root` keeping `max_depth` levels of descendants.
fn prune(root: &RawMember, max_depth: u32) -> RawMember {
    // Flatten in pre-order: (parent slot, childless copy)
    let mut flat: Vec<(Option<usize>, RawMember)> = Vec::new();
    let mut stack: Vec<(&RawMember, Option<usize>, u32)> = vec![(root, None, 0)];

    while let Some((node, parent, depth)) = stack.pop() {
        let mut copy = node.clone_shallow();
        if depth >= max_depth && !node.children.is_empty() {
            let reported = copy.direct_child_count.unwrap_or(0);
            copy.direct_child_count = Some(reported.max(node.children.len() as u32));
        } else {
            for child in node.children.iter().rev() {
                stack.push((child, Some(flat.len()), depth + 1));
            }
        }
        flat.push((parent, copy));
    }

    // Children always follow their parent, so a reverse pass rebuilds nesting
    let mut built: Vec<Option<RawMember>> = Vec::with_capacity(flat.len());
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(flat.len());
    for (parent, copy) in flat {
        parents.push(parent);
        built.push(Some(copy));
    }
    for i in (1..built.len()).rev() {
        let (Some(parent), Some(mut node)) = (parents[i], built[i].take()) else {
            continue;
        };
        node.children.reverse();
        if let Some(p) = built[parent].as_mut() {
            p.children.push(node);
        }
    }
    let mut root = built
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_default();
    root.children.reverse();
    root
}

impl RawMember {
    /// Field-wise copy without children
    fn clone_shallow(&self) -> RawMember {
        RawMember {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            referral_code: self.referral_code.clone(),
            invested_amount: self.invested_amount.clone(),
            earned_amount: self.earned_amount.clone(),
            direct_child_count: self.direct_child_count,
            investment_count: self.investment_count,
            children: Vec::new(),
        }
    }
}

#[async_trait]
impl HierarchySource for SnapshotSource {
    async fn fetch_hierarchy(
        &self,
        root: &MemberId,
        max_depth: u32,
    ) -> Result<Option<RawMember>, NetworkError> {
        let found = self.find_raw(|m| m.member_id().as_ref() == Some(root));
        tracing::debug!(root = %root, max_depth, found = found.is_some(), "snapshot fetch");
        Ok(found.map(|node| prune(node, max_depth)))
    }

    async fn lookup(&self, query: &SearchQuery) -> Result<Option<RawMember>, NetworkError> {
        let found = self.find_raw(|m| {
            query.matches_fields(
                m.display_name.as_deref().unwrap_or_default(),
                m.referral_code.as_deref().unwrap_or_default(),
            )
        });
        Ok(found.map(|node| prune(node, 0)))
    }
}
