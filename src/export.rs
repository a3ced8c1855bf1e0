//! "Download my network" export
//!
//! Loss-less, tree-shaped document of the loaded snapshot decorated with
//! each member's aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, AggregateTable};
use crate::error::NetworkError;
use crate::model::{MemberId, MemberTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedMember {
    pub id: MemberId,
    pub display_name: String,
    pub email: String,
    pub referral_code: String,
    pub invested_amount: Option<Decimal>,
    pub earned_amount: Option<Decimal>,
    pub investment_count: Option<u32>,
    pub direct_child_count: Option<u32>,
    pub truncated: bool,
    pub aggregate: Aggregate,
    pub children: Vec<ExportedMember>,
}

impl Drop for ExportedMember {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkExport {
    pub exported_at: DateTime<Utc>,
    pub member_count: usize,
    pub root: ExportedMember,
}

impl NetworkExport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the export document.
///
/// `aggregates` should come from the same snapshot; any member it lacks has
/// its aggregate recomputed on the spot.
pub fn export(
    tree: &MemberTree,
    aggregates: &AggregateTable,
) -> Result<NetworkExport, NetworkError> {
    let mut built: Vec<Option<ExportedMember>> = vec![None; tree.len()];

    // Reverse pre-order: every child is finished before its parent
    for (idx, member) in tree.preorder().rev() {
        let children = member
            .children()
            .iter()
            .filter_map(|child| built[child.as_usize()].take())
            .collect();
        let aggregate = aggregates
            .at(idx)
            .copied()
            .unwrap_or_else(|| crate::aggregate::aggregate(tree, idx));

        built[idx.as_usize()] = Some(ExportedMember {
            id: member.id.clone(),
            display_name: member.display_name.clone(),
            email: member.email.clone(),
            referral_code: member.referral_code.clone(),
            invested_amount: member.metrics.invested,
            earned_amount: member.metrics.earned,
            investment_count: member.metrics.investment_count,
            direct_child_count: member.metrics.direct_child_count,
            truncated: member.is_truncated(),
            aggregate,
            children,
        });
    }

    let root = built[tree.root_index().as_usize()]
        .take()
        .ok_or(NetworkError::EmptyTree)?;

    Ok(NetworkExport {
        exported_at: Utc::now(),
        member_count: tree.len(),
        root,
    })
}
