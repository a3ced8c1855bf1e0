//! Referral Tree - hierarchy layout & aggregation engine
//!
//! Turns a referral network snapshot (a rooted tree of members with
//! unbounded depth and branching) into:
//! - `MemberTree` - validated arena, amounts normalized once at load
//! - `AggregateTable` - per-subtree counts, sums and depth
//! - `ExpansionState` - which members currently show their referrals
//! - `LayoutResult` - positions and edges for the visible part of the tree
//! - `SearchOutcome` - name/code lookup with the path revealed
//!
//! Everything is synchronous and free of I/O except the `HierarchySource`
//! boundary, which delivers the raw snapshot.
//!
//! # Example
//!
//! ```
//! use referral_tree::{MemberId, NetworkView, RawMember, SearchQuery};
//!
//! let raw = RawMember::new("R")
//!     .with_child(RawMember::new("A"))
//!     .with_child(
//!         RawMember::new("B")
//!             .with_child(RawMember::new("B1"))
//!             .with_child(RawMember::new("B2").with_code("B2-CODE")),
//!     );
//!
//! let mut view = NetworkView::default();
//! view.load(Some(&raw)).unwrap();
//! assert_eq!(view.layout().unwrap().node_count(), 3);
//!
//! let outcome = view.search(&SearchQuery::code("b2-code")).unwrap();
//! assert!(outcome.is_found());
//! assert_eq!(view.layout().unwrap().node_count(), 5);
//! assert_eq!(view.highlight(), Some(&MemberId::from("B2")));
//! ```

pub mod aggregate;
pub mod config;
mod error;
pub mod expansion;
pub mod export;
pub mod layout;
pub mod model;
pub mod search;
pub mod source;
pub mod view;

// Re-exports
pub use aggregate::{aggregate, level_breakdown, Aggregate, AggregateTable, LevelSummary};
pub use config::{EngineConfig, SearchConfig};
pub use error::{MalformedTree, NetworkError};
pub use expansion::ExpansionState;
pub use export::{ExportedMember, NetworkExport};
pub use layout::{
    layout, LayoutBounds, LayoutConfig, LayoutEdge, LayoutEngine, LayoutResult, NodeState,
    PositionedNode,
};
pub use model::{
    DepthTruncated, Member, MemberId, MemberTree, Metrics, NodeIndex, RawAmount, RawId, RawMember,
};
pub use search::{find, locate, path_to, reveal, MatchMode, SearchMatch, SearchOutcome, SearchQuery};
pub use source::{HierarchySource, SnapshotSource};
pub use view::{LoadReport, NetworkView, RemoteOutcome};
