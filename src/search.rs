//! Member search and path reveal
//!
//! Depth-first, pre-order, first match wins. The path accumulator is cut
//! back to the current depth before each visit, so ids from exhausted
//! sibling subtrees never leak into a reported path.

use serde::{Deserialize, Serialize};

use crate::expansion::ExpansionState;
use crate::model::{Member, MemberId, MemberTree, NodeIndex};

/// Which predicate a query applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive substring of the display name (free-text box)
    #[default]
    NameContains,
    /// Case-insensitive exact referral code (code entry box)
    CodeExact,
}

impl MatchMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "code" | "code_exact" | "referral_code" => MatchMode::CodeExact,
            _ => MatchMode::NameContains,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::NameContains => "name_contains",
            MatchMode::CodeExact => "code_exact",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub mode: MatchMode,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            text: text.into(),
            mode,
        }
    }

    pub fn name(text: impl Into<String>) -> Self {
        Self::new(text, MatchMode::NameContains)
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self::new(text, MatchMode::CodeExact)
    }

    /// Case-folded needle, or `None` for a blank query
    fn needle(&self) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    fn matches_needle(&self, needle: &str, display_name: &str, referral_code: &str) -> bool {
        match self.mode {
            MatchMode::NameContains => display_name.to_lowercase().contains(needle),
            MatchMode::CodeExact => referral_code.trim().to_lowercase() == needle,
        }
    }

    /// Test a single member against this query. Blank queries never match.
    pub fn matches(&self, member: &Member) -> bool {
        self.needle()
            .map(|needle| self.matches_needle(&needle, &member.display_name, &member.referral_code))
            .unwrap_or(false)
    }

    /// Same predicate over raw fields (used by sources that search payloads)
    pub fn matches_fields(&self, display_name: &str, referral_code: &str) -> bool {
        self.needle()
            .map(|needle| self.matches_needle(&needle, display_name, referral_code))
            .unwrap_or(false)
    }
}

/// A located member and the ids leading to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub id: MemberId,
    /// Root first, matched member last
    pub path: Vec<MemberId>,
}

impl SearchMatch {
    /// Ids that must be open for the match to be visible
    pub fn ancestors(&self) -> &[MemberId] {
        &self.path[..self.path.len().saturating_sub(1)]
    }
}

/// Search result. A miss is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found(SearchMatch),
    NotFound,
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    pub fn found(&self) -> Option<&SearchMatch> {
        match self {
            SearchOutcome::Found(m) => Some(m),
            SearchOutcome::NotFound => None,
        }
    }
}

/// Pre-order DFS carrying the root-to-current path. Returns the first
/// member satisfying `hit` with its path.
fn dfs_with_path<F>(tree: &MemberTree, mut hit: F) -> Option<(NodeIndex, Vec<MemberId>)>
where
    F: FnMut(&Member) -> bool,
{
    let mut path: Vec<MemberId> = Vec::new();
    let mut stack: Vec<(NodeIndex, usize)> = vec![(tree.root_index(), 0)];

    while let Some((idx, level)) = stack.pop() {
        // Backtrack: drop ids from subtrees that yielded nothing
        path.truncate(level);
        let member = tree.get(idx);
        path.push(member.id.clone());

        if hit(member) {
            return Some((idx, path));
        }
        for &child in member.children().iter().rev() {
            stack.push((child, level + 1));
        }
    }
    None
}

/// First member matching `query`, in pre-order.
pub fn find<'a>(tree: &'a MemberTree, query: &SearchQuery) -> Option<&'a Member> {
    let needle = query.needle()?;
    tree.preorder()
        .map(|(_, m)| m)
        .find(|m| query.matches_needle(&needle, &m.display_name, &m.referral_code))
}

/// Root-first ids ending at `target`, or `None` when it is not in the tree.
pub fn path_to(tree: &MemberTree, target: &MemberId) -> Option<Vec<MemberId>> {
    if !tree.contains(target) {
        return None;
    }
    dfs_with_path(tree, |m| &m.id == target).map(|(_, path)| path)
}

/// Find and compute the path in a single traversal. Pure.
pub fn locate(tree: &MemberTree, query: &SearchQuery) -> SearchOutcome {
    let Some(needle) = query.needle() else {
        return SearchOutcome::NotFound;
    };
    match dfs_with_path(tree, |m| {
        query.matches_needle(&needle, &m.display_name, &m.referral_code)
    }) {
        Some((idx, path)) => SearchOutcome::Found(SearchMatch {
            id: tree.get(idx).id.clone(),
            path,
        }),
        None => SearchOutcome::NotFound,
    }
}

/// Locate and open every ancestor of the match.
///
/// On a miss `state` is left exactly as it was.
pub fn reveal(tree: &MemberTree, state: &mut ExpansionState, query: &SearchQuery) -> SearchOutcome {
    let outcome = locate(tree, query);
    match &outcome {
        SearchOutcome::Found(found) => {
            state.expand_path(found.ancestors());
            tracing::debug!(
                query = %query.text,
                mode = query.mode.as_str(),
                matched = %found.id,
                depth = found.path.len() - 1,
                "search hit revealed"
            );
        }
        SearchOutcome::NotFound => {
            tracing::debug!(query = %query.text, mode = query.mode.as_str(), "search miss");
        }
    }
    outcome
}
