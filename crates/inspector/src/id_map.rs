//! Node ↔ handle maps
//!
//! A `NodeIdMap` never owns nodes. It records which nodes have been given a
//! handle and whose children have been announced to the client.

use ahash::{AHashMap, AHashSet};
use dom::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-visible node identifier. Positive, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u32);

impl Handle {
    /// Rebuild a handle received from the client. Zero is never a handle.
    pub fn from_raw(value: u32) -> Option<Self> {
        (value != 0).then_some(Handle(value))
    }

    pub(crate) fn first() -> Self {
        Handle(1)
    }

    pub(crate) fn next(self) -> Self {
        Handle(self.0 + 1)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional node/handle map
#[derive(Debug, Default)]
pub struct NodeIdMap {
    node_to_handle: AHashMap<NodeId, Handle>,
    handle_to_node: AHashMap<Handle, NodeId>,
    children_requested: AHashSet<Handle>,
}

impl NodeIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.node_to_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_to_handle.is_empty()
    }

    pub fn handle(&self, node: NodeId) -> Option<Handle> {
        self.node_to_handle.get(&node).copied()
    }

    pub fn node(&self, handle: Handle) -> Option<NodeId> {
        self.handle_to_node.get(&handle).copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node_to_handle.contains_key(&node)
    }

    /// Record `node ↔ handle`.
    ///
    /// # Panics
    ///
    /// If either side is already paired with something else.
    pub fn insert(&mut self, node: NodeId, handle: Handle) {
        let previous_handle = self.node_to_handle.insert(node, handle);
        let previous_node = self.handle_to_node.insert(handle, node);
        assert!(
            previous_handle.unwrap_or(handle) == handle && previous_node.unwrap_or(node) == node,
            "node id map corrupted: node {} / handle {} already paired with {:?} / {:?}",
            node,
            handle,
            previous_handle,
            previous_node
        );
    }

    /// Remove a node, returning its handle and whether its children were requested.
    ///
    /// # Panics
    ///
    /// If the reverse entry does not point back at `node`.
    pub fn remove(&mut self, node: NodeId) -> Option<(Handle, bool)> {
        let handle = self.node_to_handle.remove(&node)?;
        let reverse = self.handle_to_node.remove(&handle);
        assert_eq!(
            reverse,
            Some(node),
            "node id map corrupted: handle {} has no matching reverse entry",
            handle
        );
        let requested = self.children_requested.remove(&handle);
        Some((handle, requested))
    }

    pub fn children_requested(&self, handle: Handle) -> bool {
        self.children_requested.contains(&handle)
    }

    pub fn mark_children_requested(&mut self, handle: Handle) {
        debug_assert!(self.handle_to_node.contains_key(&handle));
        self.children_requested.insert(handle);
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Handle)> + '_ {
        self.node_to_handle.iter().map(|(&node, &handle)| (node, handle))
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.handle_to_node.keys().copied()
    }

    pub fn clear(&mut self) {
        self.node_to_handle.clear();
        self.handle_to_node.clear();
        self.children_requested.clear();
    }
}
