//! Frontend events and DOM listener hooks
//!
//! Two outlets, two audiences:
//! - `InspectorEvent`s are what the client sees; they speak in handles and
//!   are published on an `EventBus` (broadcast, fire and forget).
//! - `DomListener` is an in-process observer that gets raw `NodeId`s, e.g.
//!   a highlighter that must forget a removed node.

use crate::id_map::Handle;
use dom::{NodeId, NodeType};
use serde::Serialize;
use tokio::sync::broadcast;

/// Shallow description of a bound node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub handle: Handle,
    pub node_type: NodeType,
    pub node_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_value: String,
    /// Attributes sorted by name
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    pub child_node_count: usize,
    /// Children pushed along with the node, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

/// Events pushed to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum InspectorEvent {
    /// A new document is inspected (or none, when `root` is empty)
    DocumentUpdated { root: Option<NodeSummary> },
    SetChildNodes {
        parent: Handle,
        nodes: Vec<NodeSummary>,
    },
    /// A detached node was pushed and now roots its own subtree
    SetDetachedRoot { node: NodeSummary },
    ChildNodeInserted {
        parent: Handle,
        previous: Option<Handle>,
        node: NodeSummary,
    },
    ChildNodeRemoved { parent: Handle, node: Handle },
    /// Sent instead of insert/remove when the parent's children were never requested
    ChildNodeCountUpdated { node: Handle, count: usize },
    AttributesUpdated {
        node: Handle,
        attributes: Vec<(String, String)>,
    },
    CharacterDataModified { node: Handle, value: String },
    /// One incremental batch of search matches, never repeating earlier ones
    SearchResults { nodes: Vec<Handle> },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<InspectorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: InspectorEvent) {
        tracing::trace!("frontend event: {:?}", event);
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<InspectorEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process observer of DOM changes seen by the inspector
pub trait DomListener {
    fn on_document_removed(&mut self, document: NodeId);
    fn on_node_removed(&mut self, node: NodeId);
    fn on_attribute_modified(&mut self, element: NodeId);
}
