//! Host DOM for the inspector
//!
//! A small mutable document tree. Nodes live in an arena and are identified
//! by a `NodeId` that is never reused; removing a node unlinks it but keeps
//! it addressable, which is what lets an inspector keep handing out stable
//! handles for detached subtrees.
//!
//! ## Core Design
//!
//! ```text
//! snapshot JSON → DomService → DomArena (owned, mutable)
//!                                  ↓
//!                     InnerTree (effective tree view)
//!                     outer_html (markup of a subtree)
//! ```

pub mod arena;
pub mod error;
pub mod serializer;
pub mod service;
pub mod traversal;
pub mod types;

pub use arena::DomArena;
pub use error::{DomError, Result};
pub use service::{DomService, DomServiceConfig};
pub use traversal::InnerTree;
pub use types::*;
