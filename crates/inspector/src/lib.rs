//! Node identity and incremental search for a DOM inspector
//!
//! A remote client never sees nodes, only handles. This crate hands those
//! handles out, keeps them valid while the document changes under it, and
//! searches the document without blocking the host for long.
//!
//! ## Core Design
//!
//! ```text
//!   DomAgent ─┬─ NodeBinder ──── NodeIdMap (document)
//!             │       └───────── DanglingNodeRegistry → NodeIdMap (per detached subtree)
//!             ├─ SearchScheduler (one job per timer tick)
//!             └─ BreakpointPropagator
//! ```
//!
//! Everything runs on the thread that owns the tree. The tree is borrowed per
//! call through [`dom::InnerTree`], never stored.

pub mod agent;
pub mod binder;
pub mod breakpoints;
pub mod config;
pub mod dangling;
pub mod error;
pub mod events;
pub mod id_map;
pub mod search;

pub use agent::DomAgent;
pub use binder::{MapKey, NodeBinder};
pub use breakpoints::{BreakpointPropagator, DomBreakpointHit, DomBreakpointType};
pub use config::{DetachedNodePolicy, InspectorConfig};
pub use dangling::{DanglingMapId, DanglingNodeRegistry};
pub use error::{InspectorError, Result};
pub use events::{DomListener, EventBus, InspectorEvent, NodeSummary};
pub use id_map::{Handle, NodeIdMap};
pub use search::{Matcher, SearchQuery, SearchScheduler, SearchState};
