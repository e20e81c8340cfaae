use crate::path::Key;
use crate::tree::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Construction and lookup failures.
///
/// A rule that rejects a value is not an error in this sense: it is recorded
/// as a [`FieldError`](crate::FieldError) on the node that ran it.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("last rule is not set")]
    NoRule,

    #[error("path is not found at segment `{key}`")]
    PathNotFound { key: Key },

    #[error("no every rule")]
    NoEveryRule,

    #[error("no some rule")]
    NoSomeRule,

    #[error("node {0} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
