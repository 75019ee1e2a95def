//! Error types for inspector operations
//!
//! Lookups of stale handles are ordinary errors. Identity-map corruption is
//! not: it panics where it is detected.

use crate::dangling::DanglingMapId;
use crate::id_map::Handle;
use dom::DomError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectorError>;

#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("No node with handle {0}")]
    NodeNotFound(Handle),

    #[error("No document is being inspected")]
    NoDocument,

    #[error("Invalid node path: {0}")]
    InvalidPath(String),

    #[error("Unknown detached node map: {0:?}")]
    UnknownDetachedMap(DanglingMapId),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}
