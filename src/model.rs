//! MemberTree - normalized referral network snapshot
//!
//! The raw payload delivered by the hierarchy source is validated and
//! flattened into an arena once per load. Members are stored in pre-order:
//! the root is index 0 and every child has a larger index than its parent,
//! so a subtree is always a contiguous run of the arena. Nothing in this
//! crate walks the tree with native recursion.
//!
//! ```text
//! RawMember (nested JSON)
//!        │  MemberTree::from_raw   (ids checked, amounts parsed once)
//!        ▼
//! [ R | A | B | B1 | B2 ]   members, pre-order
//!   0   1   2   3    4
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{MalformedTree, NetworkError};

/// Decimal places every amount is normalized to.
pub const AMOUNT_SCALE: u32 = 2;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque member identifier, stable across loads
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Position of a member inside a `MemberTree` arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

// =============================================================================
// RAW PAYLOAD - as delivered by the hierarchy source
// =============================================================================

/// Ids arrive as strings or bare numbers depending on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn normalized(&self) -> Option<MemberId> {
        let id = match self {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        };
        if id.is_empty() {
            None
        } else {
            Some(MemberId(id))
        }
    }
}

/// Amounts arrive loosely typed: JSON numbers or formatted strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl From<Decimal> for RawAmount {
    fn from(d: Decimal) -> Self {
        RawAmount::Text(d.to_string())
    }
}

/// One member as delivered by the hierarchy source, with nested children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
    #[serde(default)]
    pub id: Option<RawId>,

    #[serde(default, alias = "display_name", alias = "name")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, alias = "referral_code")]
    pub referral_code: Option<String>,

    #[serde(default, alias = "invested_amount")]
    pub invested_amount: Option<RawAmount>,

    #[serde(default, alias = "earned_amount")]
    pub earned_amount: Option<RawAmount>,

    /// Direct referrals the source knows about; may exceed `children.len()`
    /// when the snapshot was depth-limited.
    #[serde(default, alias = "direct_child_count")]
    pub direct_child_count: Option<u32>,

    #[serde(default, alias = "investment_count")]
    pub investment_count: Option<u32>,

    #[serde(default)]
    pub children: Vec<RawMember>,
}

impl RawMember {
    /// Create a bare member with only an id (handy for fixtures)
    pub fn new(id: impl Into<String>) -> Self {
        let mut member = Self::default();
        member.id = Some(RawId::Text(id.into()));
        member
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    pub fn with_invested(mut self, amount: impl Into<String>) -> Self {
        self.invested_amount = Some(RawAmount::Text(amount.into()));
        self
    }

    pub fn with_earned(mut self, amount: impl Into<String>) -> Self {
        self.earned_amount = Some(RawAmount::Text(amount.into()));
        self
    }

    pub fn with_child(mut self, child: RawMember) -> Self {
        self.children.push(child);
        self
    }

    /// Normalized id, if present
    pub fn member_id(&self) -> Option<MemberId> {
        self.id.as_ref().and_then(RawId::normalized)
    }
}

impl Drop for RawMember {
    // Nested payloads can be arbitrarily deep; unlink children onto a work
    // list so each member is dropped childless.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

/// Deserialize a nested snapshot document of any depth.
///
/// `serde_json` caps nesting at 128 (object and `children` array each count),
/// so the limit is lifted and the stack grown on demand instead.
pub(crate) fn parse_snapshot(json: &str) -> Result<Option<RawMember>, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let raw = Option::<RawMember>::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(raw)
}

/// Parse a loosely typed amount into a fixed-precision decimal.
///
/// Whitespace and `,` group separators are ignored; blank text is absent.
fn normalize_amount(
    id: &MemberId,
    field: &'static str,
    raw: Option<&RawAmount>,
) -> Result<Option<Decimal>, MalformedTree> {
    let text = match raw {
        None => return Ok(None),
        Some(RawAmount::Number(n)) => n.to_string(),
        Some(RawAmount::Text(s)) => s.trim().replace(',', ""),
    };
    if text.is_empty() {
        return Ok(None);
    }

    let parsed = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| MalformedTree::InvalidAmount {
            id: id.clone(),
            field,
            value: text.clone(),
        })?;

    let mut amount =
        parsed.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(AMOUNT_SCALE);
    Ok(Some(amount))
}

// =============================================================================
// MEMBER
// =============================================================================

/// Node-local numeric facts, normalized at load time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub invested: Option<Decimal>,
    pub earned: Option<Decimal>,
    pub investment_count: Option<u32>,
    pub direct_child_count: Option<u32>,
}

impl Metrics {
    fn from_raw(id: &MemberId, raw: &RawMember) -> Result<Self, MalformedTree> {
        Ok(Self {
            invested: normalize_amount(id, "investedAmount", raw.invested_amount.as_ref())?,
            earned: normalize_amount(id, "earnedAmount", raw.earned_amount.as_ref())?,
            investment_count: raw.investment_count,
            direct_child_count: raw.direct_child_count,
        })
    }

    /// Invested amount, absent counts as zero
    pub fn invested_or_zero(&self) -> Decimal {
        self.invested.unwrap_or(Decimal::ZERO)
    }

    /// Earned amount, absent counts as zero
    pub fn earned_or_zero(&self) -> Decimal {
        self.earned.unwrap_or(Decimal::ZERO)
    }

    /// A member is active with at least one investment. Sources that do not
    /// report a count fall back to a positive invested amount.
    pub fn is_active(&self) -> bool {
        match self.investment_count {
            Some(count) => count > 0,
            None => self.invested_or_zero() > Decimal::ZERO,
        }
    }
}

/// One network member positioned in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub email: String,
    pub referral_code: String,
    pub metrics: Metrics,
    children: Vec<NodeIndex>,
    parent: Option<NodeIndex>,
    depth: u32,
}

impl Member {
    /// Materialized children, in referral order
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Depth in tree (0 = root)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// The source reported more direct referrals than were materialized.
    pub fn is_truncated(&self) -> bool {
        self.metrics
            .direct_child_count
            .map(|reported| reported as usize > self.children.len())
            .unwrap_or(false)
    }

    /// True leaf: nothing materialized and nothing reported upstream
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && !self.is_truncated()
    }
}

/// Non-fatal notice that a member has unfetched referrals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthTruncated {
    pub id: MemberId,
    pub reported: u32,
    pub materialized: usize,
}

// =============================================================================
// MEMBER TREE
// =============================================================================

/// Running sum of absolute amounts over a snapshot.
///
/// Any subtree or level total is bounded by this sum, so once it fits in a
/// `Decimal` the aggregator can add without overflow checks.
#[derive(Default)]
struct AmountMagnitude {
    invested: Decimal,
    earned: Decimal,
}

impl AmountMagnitude {
    fn absorb(&mut self, id: &MemberId, metrics: &Metrics) -> Result<(), MalformedTree> {
        self.invested = Self::add(self.invested, metrics.invested, id, "investedAmount")?;
        self.earned = Self::add(self.earned, metrics.earned, id, "earnedAmount")?;
        Ok(())
    }

    fn add(
        total: Decimal,
        amount: Option<Decimal>,
        id: &MemberId,
        field: &'static str,
    ) -> Result<Decimal, MalformedTree> {
        let Some(amount) = amount else {
            return Ok(total);
        };
        total
            .checked_add(amount.abs())
            .ok_or_else(|| MalformedTree::AmountOverflow {
                id: id.clone(),
                field,
            })
    }
}

/// Immutable, validated snapshot of one member's referral network
#[derive(Debug, Clone)]
pub struct MemberTree {
    members: Vec<Member>,
    index: HashMap<MemberId, NodeIndex>,
}

impl MemberTree {
    /// Validate and normalize a raw payload.
    ///
    /// Fails on the first member without an id, on a repeated id, on an
    /// amount that is not a number, or when amounts are too large to be
    /// summed. No partial tree is ever returned.
    pub fn from_raw(raw: &RawMember) -> Result<Self, NetworkError> {
        let mut members: Vec<Member> = Vec::new();
        let mut magnitude = AmountMagnitude::default();
        let mut index: HashMap<MemberId, NodeIndex> = HashMap::new();
        let mut stack: Vec<(&RawMember, Option<NodeIndex>, usize)> = vec![(raw, None, 0)];

        while let Some((node, parent, position)) = stack.pop() {
            let id = node.member_id().ok_or_else(|| MalformedTree::MissingId {
                parent: parent.map(|p| members[p.0].id.clone()),
                position,
            })?;
            if index.contains_key(&id) {
                return Err(MalformedTree::DuplicateId { id }.into());
            }

            let this = NodeIndex(members.len());
            let depth = parent.map(|p| members[p.0].depth + 1).unwrap_or(0);
            let metrics = Metrics::from_raw(&id, node)?;
            magnitude.absorb(&id, &metrics)?;

            members.push(Member {
                id: id.clone(),
                display_name: node.display_name.clone().unwrap_or_default(),
                email: node.email.clone().unwrap_or_default(),
                referral_code: node.referral_code.clone().unwrap_or_default(),
                metrics,
                children: Vec::with_capacity(node.children.len()),
                parent,
                depth,
            });
            index.insert(id, this);
            if let Some(p) = parent {
                members[p.0].children.push(this);
            }

            // Reversed so the first child is popped (and indexed) first
            for (pos, child) in node.children.iter().enumerate().rev() {
                stack.push((child, Some(this), pos));
            }
        }

        let tree = Self { members, index };
        tracing::debug!(
            members = tree.len(),
            max_depth = tree.max_depth(),
            root = %tree.root().id,
            "member tree loaded"
        );
        Ok(tree)
    }

    /// Parse a JSON snapshot. A `null` document is an empty tree.
    pub fn from_json(json: &str) -> Result<Self, NetworkError> {
        match parse_snapshot(json)? {
            Some(raw) => Self::from_raw(&raw),
            None => Err(NetworkError::EmptyTree),
        }
    }

    pub fn root_index(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn root(&self) -> &Member {
        &self.members[0]
    }

    /// Panics on an index that did not come from this tree.
    pub fn get(&self, idx: NodeIndex) -> &Member {
        &self.members[idx.0]
    }

    pub fn index_of(&self, id: &MemberId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn member(&self, id: &MemberId) -> Option<&Member> {
        self.index_of(id).map(|idx| self.get(idx))
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_root(&self, idx: NodeIndex) -> bool {
        idx.0 == 0
    }

    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = &Member> + '_ {
        self.members[idx.0].children.iter().map(|c| &self.members[c.0])
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All members in pre-order (root first, children in referral order)
    pub fn preorder(&self) -> impl DoubleEndedIterator<Item = (NodeIndex, &Member)> + '_ {
        self.members
            .iter()
            .enumerate()
            .map(|(i, m)| (NodeIndex(i), m))
    }

    /// Arena indices covered by the subtree rooted at `idx`
    pub fn subtree_range(&self, idx: NodeIndex) -> std::ops::Range<usize> {
        let depth = self.members[idx.0].depth;
        let end = self.members[idx.0 + 1..]
            .iter()
            .position(|m| m.depth <= depth)
            .map(|offset| idx.0 + 1 + offset)
            .unwrap_or(self.members.len());
        idx.0..end
    }

    /// Deepest materialized depth (0 for a lone root)
    pub fn max_depth(&self) -> u32 {
        self.members.iter().map(|m| m.depth).max().unwrap_or(0)
    }

    /// Members whose reported referral count exceeds what was fetched
    pub fn truncation_warnings(&self) -> Vec<DepthTruncated> {
        self.members
            .iter()
            .filter(|m| m.is_truncated())
            .map(|m| DepthTruncated {
                id: m.id.clone(),
                reported: m.metrics.direct_child_count.unwrap_or(0),
                materialized: m.children.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// R ─┬─ A
    ///    └─ B ─┬─ B1
    ///          └─ B2
    fn sample() -> RawMember {
        RawMember::new("R")
            .with_child(RawMember::new("A"))
            .with_child(
                RawMember::new("B")
                    .with_child(RawMember::new("B1"))
                    .with_child(RawMember::new("B2")),
            )
    }

    #[test]
    fn test_arena_is_preorder() {
        let tree = MemberTree::from_raw(&sample()).unwrap();
        let ids: Vec<&str> = tree.preorder().map(|(_, m)| m.id.as_str()).collect();
        assert_eq!(ids, vec!["R", "A", "B", "B1", "B2"]);

        let b = tree.index_of(&MemberId::from("B")).unwrap();
        assert_eq!(tree.get(b).depth(), 1);
        let kids: Vec<&str> = tree.children(b).map(|m| m.id.as_str()).collect();
        assert_eq!(kids, vec!["B1", "B2"]);
        assert_eq!(tree.get(tree.get(b).children()[0]).parent(), Some(b));
    }

    #[test]
    fn test_subtree_range() {
        let tree = MemberTree::from_raw(&sample()).unwrap();
        let b = tree.index_of(&MemberId::from("B")).unwrap();
        assert_eq!(tree.subtree_range(b), 2..5);
        let a = tree.index_of(&MemberId::from("A")).unwrap();
        assert_eq!(tree.subtree_range(a), 1..2);
        assert_eq!(tree.subtree_range(tree.root_index()), 0..5);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let raw = RawMember::new("R")
            .with_child(RawMember::new("A"))
            .with_child(RawMember::new("B").with_child(RawMember::new("A")));
        let err = MemberTree::from_raw(&raw).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::MalformedTree(MalformedTree::DuplicateId { ref id }) if id.as_str() == "A"
        ));
    }

    #[test]
    fn test_missing_id_rejected() {
        let mut orphan = RawMember::default();
        orphan.display_name = Some("No Id".into());
        let raw = RawMember::new("R")
            .with_child(RawMember::new("A"))
            .with_child(orphan);
        let err = MemberTree::from_raw(&raw).unwrap_err();
        match err {
            NetworkError::MalformedTree(MalformedTree::MissingId { parent, position }) => {
                assert_eq!(parent, Some(MemberId::from("R")));
                assert_eq!(position, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let blank = RawMember::new("   ");
        assert!(MemberTree::from_raw(&blank).is_err());
    }

    #[test]
    fn test_amounts_normalized_once() {
        let json = r#"{
            "id": 7,
            "displayName": "Root",
            "investedAmount": "1,250.005",
            "earnedAmount": 12.5,
            "children": [
                { "id": "c1", "investedAmount": "" },
                { "id": "c2", "invested_amount": "  40 " }
            ]
        }"#;
        let tree = MemberTree::from_json(json).unwrap();
        let root = tree.root();
        assert_eq!(root.id.as_str(), "7");
        assert_eq!(root.metrics.invested, Some(Decimal::new(125001, 2)));
        assert_eq!(root.metrics.earned.map(|d| d.to_string()), Some("12.50".to_string()));

        let c1 = tree.member(&MemberId::from("c1")).unwrap();
        assert_eq!(c1.metrics.invested, None);
        let c2 = tree.member(&MemberId::from("c2")).unwrap();
        assert_eq!(c2.metrics.invested, Some(Decimal::new(4000, 2)));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let raw = RawMember::new("R").with_invested("lots");
        let err = MemberTree::from_raw(&raw).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_TREE_INVALID_AMOUNT");
    }

    #[test]
    fn test_null_snapshot_is_empty_tree() {
        let err = MemberTree::from_json("null").unwrap_err();
        assert!(matches!(err, NetworkError::EmptyTree));
    }

    #[test]
    fn test_truncation_distinguished_from_leaf() {
        let mut cut = RawMember::new("cut");
        cut.direct_child_count = Some(3);
        let mut leaf = RawMember::new("leaf");
        leaf.direct_child_count = Some(0);
        let raw = RawMember::new("R").with_child(cut).with_child(leaf);

        let tree = MemberTree::from_raw(&raw).unwrap();
        let cut = tree.member(&MemberId::from("cut")).unwrap();
        assert!(cut.is_truncated());
        assert!(!cut.is_leaf());
        assert!(tree.member(&MemberId::from("leaf")).unwrap().is_leaf());

        assert_eq!(
            tree.truncation_warnings(),
            vec![DepthTruncated {
                id: MemberId::from("cut"),
                reported: 3,
                materialized: 0,
            }]
        );
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut raw = RawMember::new("n-0");
        // Build bottom-up so construction of the fixture itself stays flat
        for i in (1..50_000).rev() {
            raw = RawMember::new(format!("n-{i}")).with_child(raw);
        }
        let tree = MemberTree::from_raw(&raw).unwrap();
        assert_eq!(tree.len(), 50_000);
        assert_eq!(tree.max_depth(), 49_999);
        drop(raw);
    }

    #[test]
    fn test_deep_json_chain_parses() {
        let depth = 2_000;
        let mut json = String::new();
        for i in 0..depth {
            json.push_str(&format!(r#"{{"id":"n-{i}","children":["#));
        }
        json.push_str(&"]}".repeat(depth));

        let tree = MemberTree::from_json(&json).unwrap();
        assert_eq!(tree.len(), depth);
        assert_eq!(tree.max_depth(), depth as u32 - 1);

        let trailing = format!("{json} x");
        assert!(matches!(
            MemberTree::from_json(&trailing),
            Err(NetworkError::Payload(_))
        ));
    }

    #[test]
    fn test_amount_total_overflow_rejected() {
        let max = "79228162514264337593543950335";
        let raw = RawMember::new("R")
            .with_invested(max)
            .with_child(RawMember::new("A").with_invested(max));
        let err = MemberTree::from_raw(&raw).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_TREE_AMOUNT_OVERFLOW");
        assert!(matches!(
            err,
            NetworkError::MalformedTree(MalformedTree::AmountOverflow { ref id, field })
                if id.as_str() == "A" && field == "investedAmount"
        ));

        // One huge amount alone still loads; negatives count by magnitude
        assert!(MemberTree::from_raw(&RawMember::new("R").with_invested(max)).is_ok());
        let mixed = RawMember::new("R")
            .with_earned(max)
            .with_child(RawMember::new("A").with_earned(format!("-{max}")));
        assert!(MemberTree::from_raw(&mixed).is_err());
    }

    #[test]
    fn test_activity_falls_back_to_invested_amount() {
        let metrics = Metrics {
            invested: Some(Decimal::new(100, 0)),
            ..Default::default()
        };
        assert!(metrics.is_active());

        let metrics = Metrics {
            invested: Some(Decimal::new(100, 0)),
            investment_count: Some(0),
            ..Default::default()
        };
        assert!(!metrics.is_active());
        assert!(!Metrics::default().is_active());
    }
}
