//! NetworkView - one member's interactive view of their network
//!
//! Owns the loaded snapshot, its aggregates, the expansion state and the
//! current highlight. There is no module-level state: a server, a test or a
//! UI each hold their own `NetworkView`.
//!
//! ```text
//! HierarchySource ──fetch──► MemberTree ──► AggregateTable (read-only)
//!                                 │
//!        toggle / search ──► ExpansionState ──► LayoutEngine ──► LayoutResult
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{level_breakdown, Aggregate, AggregateTable, LevelSummary};
use crate::config::EngineConfig;
use crate::error::NetworkError;
use crate::expansion::ExpansionState;
use crate::export::{export, NetworkExport};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::model::{DepthTruncated, MemberId, MemberTree, RawMember};
use crate::search::{reveal, SearchOutcome, SearchQuery};
use crate::source::HierarchySource;

/// Summary of a successful load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub root_id: MemberId,
    pub member_count: usize,
    pub max_depth: u32,
    pub truncated: Vec<DepthTruncated>,
}

/// Result of a search that may fall back to the hierarchy source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// Found in the loaded tree and revealed
    Local(crate::search::SearchMatch),
    /// Not materialized locally; the source knows the member
    Remote { member: RawMember },
    NotFound,
}

struct Snapshot {
    tree: Arc<MemberTree>,
    aggregates: AggregateTable,
}

pub struct NetworkView {
    config: EngineConfig,
    engine: LayoutEngine,
    snapshot: Option<Snapshot>,
    expansion: ExpansionState,
    highlight: Option<MemberId>,
}

impl NetworkView {
    pub fn new(config: EngineConfig) -> Self {
        let engine = LayoutEngine::new(config.layout);
        Self {
            config,
            engine,
            snapshot: None,
            expansion: ExpansionState::new(),
            highlight: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the snapshot with `raw`.
    ///
    /// On failure the previously loaded snapshot (if any) stays in place.
    pub fn load(&mut self, raw: Option<&RawMember>) -> Result<LoadReport, NetworkError> {
        let raw = raw.ok_or(NetworkError::EmptyTree)?;
        let tree = MemberTree::from_raw(raw).map_err(|e| {
            tracing::warn!(code = e.code(), error = %e, "rejected network snapshot");
            e
        })?;
        Ok(self.install(tree))
    }

    /// Fetch from `source` and load the result.
    pub async fn load_from(
        &mut self,
        source: &dyn HierarchySource,
        root: &MemberId,
    ) -> Result<LoadReport, NetworkError> {
        let raw = source
            .fetch_hierarchy(root, self.config.fetch_depth)
            .await?;
        self.load(raw.as_ref())
    }

    fn install(&mut self, tree: MemberTree) -> LoadReport {
        let aggregates = AggregateTable::compute(&tree);
        let report = LoadReport {
            root_id: tree.root().id.clone(),
            member_count: tree.len(),
            max_depth: tree.max_depth(),
            truncated: tree.truncation_warnings(),
        };
        if !report.truncated.is_empty() {
            tracing::warn!(
                members = report.truncated.len(),
                fetch_depth = self.config.fetch_depth,
                "snapshot is depth-limited; some referrals were not fetched"
            );
        }

        self.expansion = ExpansionState::for_tree(&tree);
        self.highlight = None;
        self.snapshot = Some(Snapshot {
            tree: Arc::new(tree),
            aggregates,
        });
        report
    }

    /// Drop the snapshot and all view state.
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.expansion = ExpansionState::new();
        self.highlight = None;
    }

    fn snapshot(&self) -> Result<&Snapshot, NetworkError> {
        self.snapshot.as_ref().ok_or(NetworkError::EmptyTree)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn tree(&self) -> Result<Arc<MemberTree>, NetworkError> {
        Ok(Arc::clone(&self.snapshot()?.tree))
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Replace the expansion state wholesale (undo/restore)
    pub fn restore_expansion(&mut self, state: ExpansionState) {
        self.expansion = state;
    }

    pub fn highlight(&self) -> Option<&MemberId> {
        self.highlight.as_ref()
    }

    pub fn truncation_warnings(&self) -> Result<Vec<DepthTruncated>, NetworkError> {
        Ok(self.snapshot()?.tree.truncation_warnings())
    }

    /// Flip one member; returns whether it is now expanded.
    pub fn toggle(&mut self, id: &MemberId) -> Result<bool, NetworkError> {
        self.snapshot()?;
        Ok(self.expansion.toggle(id))
    }

    /// Open one member; already open members stay open.
    pub fn expand(&mut self, id: &MemberId) -> Result<(), NetworkError> {
        self.snapshot()?;
        self.expansion.expand(id);
        Ok(())
    }

    pub fn expand_all(&mut self) -> Result<(), NetworkError> {
        let tree = Arc::clone(&self.snapshot()?.tree);
        self.expansion.expand_all(&tree);
        Ok(())
    }

    pub fn collapse_all(&mut self) -> Result<(), NetworkError> {
        let root = self.snapshot()?.tree.root().id.clone();
        self.expansion.collapse_all(&root);
        Ok(())
    }

    pub fn layout(&self) -> Result<LayoutResult, NetworkError> {
        let snapshot = self.snapshot()?;
        Ok(self.engine.layout(&snapshot.tree, &self.expansion))
    }

    /// Aggregate for one member; `Ok(None)` when the id is not in the snapshot.
    pub fn aggregate(&self, id: &MemberId) -> Result<Option<&Aggregate>, NetworkError> {
        Ok(self.snapshot()?.aggregates.get(id))
    }

    pub fn root_aggregate(&self) -> Result<&Aggregate, NetworkError> {
        Ok(self.snapshot()?.aggregates.root())
    }

    pub fn aggregates(&self) -> Result<&AggregateTable, NetworkError> {
        Ok(&self.snapshot()?.aggregates)
    }

    pub fn levels(&self, id: &MemberId) -> Result<Option<Vec<LevelSummary>>, NetworkError> {
        let tree = &self.snapshot()?.tree;
        Ok(tree.index_of(id).map(|idx| level_breakdown(tree, idx)))
    }

    /// Search the loaded tree, reveal the path and highlight the match.
    ///
    /// A miss changes nothing: expansion and highlight stay as they were.
    pub fn search(&mut self, query: &SearchQuery) -> Result<SearchOutcome, NetworkError> {
        let tree = Arc::clone(&self.snapshot()?.tree);
        let outcome = reveal(&tree, &mut self.expansion, query);
        if let SearchOutcome::Found(found) = &outcome {
            self.highlight = Some(found.id.clone());
        }
        Ok(outcome)
    }

    /// Search locally, then ask `source` for a point lookup on a miss.
    /// Remote hits are reported only; they are not grafted into the tree.
    pub async fn locate_remote(
        &mut self,
        source: &dyn HierarchySource,
        query: &SearchQuery,
    ) -> Result<RemoteOutcome, NetworkError> {
        if let SearchOutcome::Found(found) = self.search(query)? {
            return Ok(RemoteOutcome::Local(found));
        }
        match source.lookup(query).await? {
            Some(member) => Ok(RemoteOutcome::Remote { member }),
            None => Ok(RemoteOutcome::NotFound),
        }
    }

    pub fn export(&self) -> Result<NetworkExport, NetworkError> {
        let snapshot = self.snapshot()?;
        export(&snapshot.tree, &snapshot.aggregates)
    }
}

impl Default for NetworkView {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
