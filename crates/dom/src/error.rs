//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),

    #[error("Fixture error: {0}")]
    FixtureError(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Maximum iframe depth exceeded: {current} > {max}")]
    MaxIframeDepthExceeded { current: usize, max: usize },

    #[error("Maximum iframe count exceeded: {current} > {max}")]
    MaxIframeCountExceeded { current: usize, max: usize },
}
