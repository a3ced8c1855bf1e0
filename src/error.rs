//! Error types for the referral tree engine
//!
//! Load-time structural problems abort snapshot construction entirely. Search
//! misses and depth truncation are not errors: see `SearchOutcome::NotFound`
//! and `DepthTruncated`.

use thiserror::Error;

use crate::model::MemberId;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Malformed tree: {0}")]
    MalformedTree(#[from] MalformedTree),

    #[error("Empty tree: no root member loaded")]
    EmptyTree,

    #[error("Invalid snapshot payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Hierarchy source error: {message}")]
    Source { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Structural problems found while building a `MemberTree`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTree {
    /// A node has no id (or an empty one).
    #[error("member at position {position} under {} has no id", parent_label(parent))]
    MissingId {
        /// Parent of the offending node, `None` when the root itself has no id.
        parent: Option<MemberId>,
        /// Position within the parent's children.
        position: usize,
    },

    /// The same id appears twice in one snapshot.
    #[error("member id '{id}' appears more than once in the snapshot")]
    DuplicateId { id: MemberId },

    /// A numeric field could not be parsed as a decimal amount.
    #[error("member '{id}' has a non-numeric {field}: '{value}'")]
    InvalidAmount {
        id: MemberId,
        field: &'static str,
        value: String,
    },

    /// Amounts are individually valid but too large to total up.
    #[error("member '{id}' pushes the snapshot's {field} total past the representable range")]
    AmountOverflow { id: MemberId, field: &'static str },
}

fn parent_label(parent: &Option<MemberId>) -> String {
    match parent {
        Some(id) => format!("'{}'", id),
        None => "<snapshot root>".to_string(),
    }
}

impl NetworkError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedTree(MalformedTree::MissingId { .. }) => "MALFORMED_TREE_MISSING_ID",
            Self::MalformedTree(MalformedTree::DuplicateId { .. }) => "MALFORMED_TREE_DUPLICATE_ID",
            Self::MalformedTree(MalformedTree::InvalidAmount { .. }) => {
                "MALFORMED_TREE_INVALID_AMOUNT"
            }
            Self::MalformedTree(MalformedTree::AmountOverflow { .. }) => {
                "MALFORMED_TREE_AMOUNT_OVERFLOW"
            }
            Self::EmptyTree => "EMPTY_TREE",
            Self::Payload(_) => "INVALID_PAYLOAD",
            Self::Source { .. } => "SOURCE_UNAVAILABLE",
            Self::Config { .. } => "INVALID_CONFIG",
        }
    }

    /// Message suitable for showing to the member.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MalformedTree(_) | Self::Payload(_) | Self::Source { .. } => {
                "Network data unavailable, try again."
            }
            Self::EmptyTree => "Your network has not been loaded yet.",
            Self::Config { .. } => "The network view is misconfigured.",
        }
    }

    /// Whether retrying the fetch could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source { .. })
    }
}
