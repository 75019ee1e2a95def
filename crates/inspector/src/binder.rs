//! Node binder - hands out and takes back handles
//!
//! Owns every identity map of a session:
//!
//! ```text
//!   document map ──┐
//!   dangling map 0 ├──> global index: Handle → (NodeId, MapKey)
//!   dangling map 1 ┘
//! ```
//!
//! A handle lives in exactly one map and has exactly one index entry. The
//! counter behind handles only ever grows, so a released handle is never
//! handed out again in the same session.

use crate::config::{DetachedNodePolicy, InspectorConfig};
use crate::dangling::{DanglingMapId, DanglingNodeRegistry};
use crate::error::{InspectorError, Result};
use crate::events::{DomListener, EventBus, InspectorEvent, NodeSummary};
use crate::id_map::{Handle, NodeIdMap};
use ahash::AHashMap;
use dom::{DomError, DomNode, InnerTree, NodeId};
use std::collections::VecDeque;

/// Which map a handle lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKey {
    Document,
    Dangling(DanglingMapId),
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    node: NodeId,
    map: MapKey,
}

pub struct NodeBinder {
    policy: DetachedNodePolicy,
    max_inspected_nodes: usize,
    document_push_depth: u32,

    document: Option<NodeId>,
    document_map: NodeIdMap,
    dangling: DanglingNodeRegistry,
    index: AHashMap<Handle, IndexEntry>,
    next_handle: Handle,

    /// Most recent first
    inspected_nodes: VecDeque<Handle>,

    listener: Option<Box<dyn DomListener>>,
    frontend: EventBus,
}

impl NodeBinder {
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            policy: config.detached_node_policy,
            max_inspected_nodes: config.max_inspected_nodes,
            document_push_depth: config.document_push_depth,
            document: None,
            document_map: NodeIdMap::new(),
            dangling: DanglingNodeRegistry::new(),
            index: AHashMap::new(),
            next_handle: Handle::first(),
            inspected_nodes: VecDeque::new(),
            listener: None,
            frontend: EventBus::new(),
        }
    }

    pub fn frontend(&self) -> &EventBus {
        &self.frontend
    }

    pub fn set_dom_listener(&mut self, listener: Option<Box<dyn DomListener>>) {
        self.listener = listener;
    }

    pub fn document(&self) -> Option<NodeId> {
        self.document
    }

    pub fn document_map(&self) -> &NodeIdMap {
        &self.document_map
    }

    pub fn dangling(&self) -> &DanglingNodeRegistry {
        &self.dangling
    }

    /// Number of live handles across all maps
    pub fn bound_count(&self) -> usize {
        self.index.len()
    }

    fn map(&self, key: MapKey) -> Option<&NodeIdMap> {
        match key {
            MapKey::Document => Some(&self.document_map),
            MapKey::Dangling(id) => self.dangling.get(id),
        }
    }

    fn map_mut(&mut self, key: MapKey) -> Option<&mut NodeIdMap> {
        match key {
            MapKey::Document => Some(&mut self.document_map),
            MapKey::Dangling(id) => self.dangling.get_mut(id),
        }
    }

    /// The map currently holding `node`
    pub fn map_key_of(&self, node: NodeId) -> Option<MapKey> {
        if self.document_map.contains(node) {
            return Some(MapKey::Document);
        }
        self.dangling.find(node).map(|(id, _)| MapKey::Dangling(id))
    }

    pub fn handle_for(&self, node: NodeId) -> Option<(Handle, MapKey)> {
        if let Some(handle) = self.document_map.handle(node) {
            return Some((handle, MapKey::Document));
        }
        self.dangling
            .find(node)
            .map(|(id, handle)| (handle, MapKey::Dangling(id)))
    }

    /// Whether the client already received the children of `handle`
    pub fn children_requested(&self, handle: Handle) -> bool {
        self.index
            .get(&handle)
            .and_then(|entry| self.map(entry.map))
            .is_some_and(|map| map.children_requested(handle))
    }

    pub fn node_for_id(&self, handle: Handle) -> Option<NodeId> {
        self.index.get(&handle).map(|entry| entry.node)
    }

    /// Like [`NodeBinder::node_for_id`], as an error for command handlers
    pub fn resolve(&self, handle: Handle) -> Result<NodeId> {
        self.node_for_id(handle)
            .ok_or(InspectorError::NodeNotFound(handle))
    }

    /// Bind `node` into `key`'s map, returning its handle.
    ///
    /// Idempotent for a node already bound in that map.
    ///
    /// # Panics
    ///
    /// If the node already holds a handle in a different map.
    pub fn bind(&mut self, node: NodeId, key: MapKey) -> Result<Handle> {
        let map = self.map(key).ok_or_else(|| unknown_map(key))?;
        if let Some(handle) = map.handle(node) {
            return Ok(handle);
        }
        if let Some(other) = self.map_key_of(node) {
            panic!(
                "node {} is already bound in {:?} while binding into {:?}",
                node, other, key
            );
        }

        let handle = self.next_handle;
        self.next_handle = handle.next();
        self.map_mut(key)
            .ok_or_else(|| unknown_map(key))?
            .insert(node, handle);
        let previous = self.index.insert(handle, IndexEntry { node, map: key });
        assert!(previous.is_none(), "handle {} issued twice", handle);

        tracing::trace!("bound node {} as {} in {:?}", node, handle, key);
        Ok(handle)
    }

    /// Release `node` and every descendant bound in the same map.
    ///
    /// Children go before their parents. A dangling map left empty is dropped.
    pub fn unbind<T: InnerTree>(&mut self, tree: &T, node: NodeId, key: MapKey) {
        let Some(map) = self.map(key) else {
            return;
        };
        if !map.contains(node) {
            return;
        }

        let order = bound_post_order(tree, map, node);
        for current in &order {
            self.remove_binding(*current, key);
        }
        self.prune_inspected_nodes();
        tracing::debug!("unbound {} node(s) under {} from {:?}", order.len(), node, key);

        if let MapKey::Dangling(id) = key {
            self.discard_if_empty(id);
        }
    }

    fn discard_if_empty(&mut self, id: DanglingMapId) {
        if self.dangling.get(id).is_some_and(NodeIdMap::is_empty) {
            self.dangling.discard(id);
        }
    }

    /// Inspected handles that no longer resolve are forgotten
    fn prune_inspected_nodes(&mut self) {
        self.inspected_nodes
            .retain(|handle| self.index.contains_key(handle));
    }

    /// Move one binding between maps, keeping its handle and flags
    fn move_binding(&mut self, node: NodeId, from: MapKey, to: MapKey) {
        let Some((handle, requested)) = self.map_mut(from).and_then(|map| map.remove(node)) else {
            return;
        };
        if let Some(map) = self.map_mut(to) {
            map.insert(node, handle);
            if requested {
                map.mark_children_requested(handle);
            }
        }
        match self.index.get_mut(&handle) {
            Some(entry) if entry.node == node => entry.map = to,
            other => panic!(
                "global index out of sync for handle {}: expected node {}, found {:?}",
                handle, node, other
            ),
        }
    }

    fn remove_binding(&mut self, node: NodeId, key: MapKey) {
        let Some((handle, _)) = self.map_mut(key).and_then(|map| map.remove(node)) else {
            return;
        };
        match self.index.remove(&handle) {
            Some(entry) if entry.node == node && entry.map == key => {}
            other => panic!(
                "global index out of sync for handle {}: expected ({}, {:?}), found {:?}",
                handle, node, key, other
            ),
        }
    }

    /// Host notification: `node` was just inserted into the tree
    pub fn did_insert_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        if tree.is_whitespace(node) {
            return;
        }
        if !self.is_in_document(tree, node) {
            self.adopt_detached(tree, node);
            return;
        }

        // We could be attaching an existing subtree. Forget its bindings.
        self.forget_bindings(tree, node);

        let Some(parent) = tree.inner_parent_node(node) else {
            return;
        };
        let Some(parent_handle) = self.document_map.handle(parent) else {
            return;
        };

        if !self.document_map.children_requested(parent_handle) {
            // Children were never pushed; only the "has children" state can change
            if tree.inner_child_node_count(parent) == 1 {
                self.frontend.publish(InspectorEvent::ChildNodeCountUpdated {
                    node: parent_handle,
                    count: 1,
                });
            }
            return;
        }

        let previous = tree
            .inner_previous_sibling(node)
            .and_then(|sibling| self.document_map.handle(sibling));
        match self.describe(tree, node, 0, MapKey::Document) {
            Ok(summary) => self.frontend.publish(InspectorEvent::ChildNodeInserted {
                parent: parent_handle,
                previous,
                node: summary,
            }),
            Err(e) => tracing::warn!("could not push inserted node {}: {}", node, e),
        }
    }

    fn forget_bindings<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        self.unbind(tree, node, MapKey::Document);
        if self.dangling.is_empty() {
            return;
        }

        let subtree: Vec<NodeId> = tree.inner_descendants(node).collect();
        for current in subtree {
            if let Some(id) = self.dangling.map_rooted_at(current) {
                self.discard_dangling_map(id);
            } else if let Some((id, _)) = self.dangling.find(current) {
                self.unbind(tree, current, MapKey::Dangling(id));
            }
        }
    }

    fn is_in_document<T: InnerTree>(&self, tree: &T, node: NodeId) -> bool {
        self.document
            .is_some_and(|document| tree.is_inclusive_descendant(node, document))
    }

    /// `node` moved between detached nodes. Its handles stay valid and end up
    /// in the dangling map of its new top-most ancestor.
    fn adopt_detached<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        if self.index.is_empty() {
            return;
        }
        let bound: Vec<(NodeId, MapKey)> = tree
            .inner_descendants(node)
            .filter_map(|current| self.map_key_of(current).map(|key| (current, key)))
            .collect();
        if bound.is_empty() {
            return;
        }

        let mut top = node;
        while let Some(parent) = tree.inner_parent_node(top) {
            top = parent;
        }
        let target = match self.dangling.map_rooted_at(top) {
            Some(id) => id,
            None => match self.dangling.map_rooted_at(node) {
                Some(id) => {
                    self.dangling.reroot(id, top);
                    id
                }
                None => self.dangling.create(top),
            },
        };
        let key = MapKey::Dangling(target);

        let mut sources = Vec::new();
        for (current, from) in bound {
            if from != key {
                self.move_binding(current, from, key);
                sources.push(from);
            }
        }
        for from in sources {
            if let MapKey::Dangling(id) = from {
                self.discard_if_empty(id);
            }
        }

        // A new root is announced the same way a pushed detached node is
        if self.map(key).is_some_and(|map| !map.contains(top)) {
            match self.describe(tree, top, 0, key) {
                Ok(summary) => self
                    .frontend
                    .publish(InspectorEvent::SetDetachedRoot { node: summary }),
                Err(e) => tracing::warn!("could not push detached root {}: {}", top, e),
            }
        }
        tracing::debug!("detached subtree {} now lives under {} in {:?}", node, top, target);
    }

    /// Host notification: `node` is about to be removed from its parent
    pub fn will_remove_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        if tree.is_whitespace(node) {
            return;
        }
        let Some(parent) = tree.inner_parent_node(node) else {
            return;
        };
        // If parent is not mapped yet -> ignore the event.
        let Some(parent_handle) = self.document_map.handle(parent) else {
            return;
        };

        if let Some(listener) = self.listener.as_mut() {
            listener.on_node_removed(node);
        }

        if !self.document_map.children_requested(parent_handle) {
            if tree.inner_child_node_count(parent) == 1 {
                self.frontend.publish(InspectorEvent::ChildNodeCountUpdated {
                    node: parent_handle,
                    count: 0,
                });
            }
        } else if let Some(handle) = self.document_map.handle(node) {
            self.frontend.publish(InspectorEvent::ChildNodeRemoved {
                parent: parent_handle,
                node: handle,
            });
        }

        if !self.document_map.contains(node) {
            return;
        }
        match self.policy {
            DetachedNodePolicy::Retain => self.migrate_to_dangling(tree, node),
            DetachedNodePolicy::Discard => self.unbind(tree, node, MapKey::Document),
        }
    }

    /// Move the bound part of the subtree under `root` into a new dangling map.
    /// Handles and children-requested flags are kept as they are.
    fn migrate_to_dangling<T: InnerTree>(&mut self, tree: &T, root: NodeId) {
        let id = self.dangling.create(root);
        let key = MapKey::Dangling(id);

        let mut moved = 0;
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if !self.document_map.contains(current) {
                continue;
            }
            self.move_binding(current, MapKey::Document, key);
            moved += 1;

            for child in tree.inner_children(current) {
                // Nested detached roots already own their handles
                if self.dangling.map_rooted_at(child).is_none() {
                    stack.push(child);
                }
            }
        }

        tracing::debug!("moved {} handle(s) under {} into {:?}", moved, root, id);
    }

    /// Host notification: attributes of `element` changed
    pub fn did_modify_dom_attr<T: InnerTree>(&mut self, tree: &T, element: NodeId) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_attribute_modified(element);
        }
        // Never allocate a handle just for this
        let Some((handle, _)) = self.handle_for(element) else {
            return;
        };
        let attributes = tree.node(element).map(sorted_attributes).unwrap_or_default();
        self.frontend.publish(InspectorEvent::AttributesUpdated {
            node: handle,
            attributes,
        });
    }

    /// Host notification: text or comment content changed
    pub fn character_data_modified<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        let Some((handle, _)) = self.handle_for(node) else {
            return;
        };
        let value = tree
            .node(node)
            .map(|data| data.node_value.clone())
            .unwrap_or_default();
        self.frontend
            .publish(InspectorEvent::CharacterDataModified { node: handle, value });
    }

    /// Drop one dangling map and all its handles
    pub fn discard_dangling_map(&mut self, id: DanglingMapId) {
        let Some(dangling) = self.dangling.discard(id) else {
            return;
        };
        let map = dangling.into_map();
        for handle in map.handles() {
            self.index.remove(&handle);
        }
        self.prune_inspected_nodes();
        tracing::debug!("released dangling map {:?} ({} handle(s))", id, map.len());
    }

    /// Drop every dangling map and all their handles
    pub fn release_dangling_nodes(&mut self) {
        let maps = self.dangling.take_all();
        let mut released = 0;
        for dangling in maps {
            let map = dangling.into_map();
            released += map.len();
            for handle in map.handles() {
                self.index.remove(&handle);
            }
        }
        if released > 0 {
            self.prune_inspected_nodes();
            tracing::debug!("released {} dangling handle(s)", released);
        }
    }

    /// Forget every handle of the session. The counter keeps going.
    pub fn discard_bindings(&mut self) {
        self.document_map.clear();
        self.release_dangling_nodes();
        self.index.clear();
        self.inspected_nodes.clear();
    }

    /// Switch the inspected document, pushing the new one to the client
    pub fn set_document<T: InnerTree>(&mut self, tree: &T, root: Option<NodeId>) {
        if root == self.document {
            return;
        }
        self.reset();
        self.document = root;

        let Some(root) = root else {
            self.frontend
                .publish(InspectorEvent::DocumentUpdated { root: None });
            return;
        };
        match self.describe(tree, root, self.document_push_depth, MapKey::Document) {
            Ok(summary) => {
                tracing::debug!(
                    "document {} pushed with {} bound node(s)",
                    root,
                    self.index.len()
                );
                self.frontend.publish(InspectorEvent::DocumentUpdated {
                    root: Some(summary),
                });
            }
            Err(e) => tracing::warn!("could not push document {}: {}", root, e),
        }
    }

    /// Stop inspecting the current document and forget all handles
    pub fn reset(&mut self) {
        if let Some(old) = self.document.take() {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_document_removed(old);
            }
        }
        self.discard_bindings();
    }

    /// Bind the inner children of `handle`'s node and send them to the client.
    /// Does nothing for leaf nodes or when the children were already sent.
    pub fn push_child_nodes_to_frontend<T: InnerTree>(
        &mut self,
        tree: &T,
        handle: Handle,
    ) -> Result<()> {
        let entry = *self
            .index
            .get(&handle)
            .ok_or(InspectorError::NodeNotFound(handle))?;
        let data = tree
            .node(entry.node)
            .ok_or(DomError::NodeNotFound(entry.node))?;
        if !data.node_type.is_container() {
            return Ok(());
        }
        if self
            .map(entry.map)
            .is_some_and(|map| map.children_requested(handle))
        {
            return Ok(());
        }

        let nodes = self.describe_children(tree, entry.node, 1, entry.map)?;
        self.frontend.publish(InspectorEvent::SetChildNodes {
            parent: handle,
            nodes,
        });
        Ok(())
    }

    /// Make sure `node` and its ancestors are known to the client.
    ///
    /// Returns `None` without a document, or for nodes that cannot be bound.
    pub fn push_node_path_to_frontend<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
    ) -> Option<Handle> {
        let document = self.document?;
        if !self.document_map.contains(document) {
            return None;
        }
        if let Some((handle, _)) = self.handle_for(node) {
            return Some(handle);
        }
        if tree.node(node).is_none() || tree.is_whitespace(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;
        let key = loop {
            match tree.inner_parent_node(current) {
                Some(parent) => {
                    path.push(parent);
                    if let Some(key) = self.map_key_of(parent) {
                        break key;
                    }
                    current = parent;
                }
                None => {
                    // Node being pushed is detached -> push subtree root.
                    let id = self.dangling.create(current);
                    let key = MapKey::Dangling(id);
                    let summary = self.describe(tree, current, 0, key).ok()?;
                    self.frontend
                        .publish(InspectorEvent::SetDetachedRoot { node: summary });
                    break key;
                }
            }
        };

        for ancestor in path.into_iter().rev() {
            let handle = self.map(key)?.handle(ancestor)?;
            if let Err(e) = self.push_child_nodes_to_frontend(tree, handle) {
                tracing::warn!("could not push children of {}: {}", ancestor, e);
                return None;
            }
        }
        self.map(key)?.handle(node)
    }

    /// Bind `node` and describe it, pushing children `depth` levels deep
    fn describe<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
        depth: u32,
        key: MapKey,
    ) -> Result<NodeSummary> {
        let handle = self.bind(node, key)?;
        let data = tree.node(node).ok_or(DomError::NodeNotFound(node))?;

        let mut summary = NodeSummary {
            handle,
            node_type: data.node_type,
            node_name: data.node_name.clone(),
            node_value: if data.is_character_data() {
                data.node_value.clone()
            } else {
                String::new()
            },
            attributes: sorted_attributes(data),
            child_node_count: 0,
            children: Vec::new(),
        };
        if data.node_type.is_container() {
            summary.child_node_count = tree.inner_child_node_count(node);
            summary.children = self.describe_children(tree, node, depth, key)?;
        }
        Ok(summary)
    }

    fn describe_children<T: InnerTree>(
        &mut self,
        tree: &T,
        container: NodeId,
        depth: u32,
        key: MapKey,
    ) -> Result<Vec<NodeSummary>> {
        if depth == 0 {
            // Special case the only text child
            if tree.inner_child_node_count(container) == 1 {
                if let Some(child) = tree.inner_first_child(container) {
                    if tree.node(child).is_some_and(DomNode::is_text) {
                        return Ok(vec![self.describe(tree, child, 0, key)?]);
                    }
                }
            }
            return Ok(Vec::new());
        }

        let children: Vec<NodeId> = tree.inner_children(container).collect();
        let mut summaries = Vec::with_capacity(children.len());
        for child in children {
            summaries.push(self.describe(tree, child, depth - 1, key)?);
        }

        let handle = self.bind(container, key)?;
        if let Some(map) = self.map_mut(key) {
            map.mark_children_requested(handle);
        }
        Ok(summaries)
    }

    /// Remember `handle` as the most recently inspected node
    pub fn add_inspected_node(&mut self, handle: Handle) -> Result<()> {
        self.resolve(handle)?;
        self.inspected_nodes.retain(|h| *h != handle);
        self.inspected_nodes.push_front(handle);
        self.inspected_nodes.truncate(self.max_inspected_nodes);
        Ok(())
    }

    /// `index` 0 is the most recent one
    pub fn inspected_node(&self, index: usize) -> Option<Handle> {
        self.inspected_nodes.get(index).copied()
    }

    /// Document root first, then dangling roots in creation order
    pub fn traversal_roots(&self) -> Vec<NodeId> {
        self.document
            .into_iter()
            .chain(self.dangling.roots().map(|(_, root)| root))
            .collect()
    }

    pub fn is_traversal_root(&self, node: NodeId) -> bool {
        self.document == Some(node) || self.dangling.map_rooted_at(node).is_some()
    }

    /// Check that the maps and the global index agree.
    ///
    /// # Panics
    ///
    /// On the first inconsistency found.
    pub fn assert_consistent(&self) {
        let mut seen = 0;
        let maps = std::iter::once((MapKey::Document, &self.document_map)).chain(
            self.dangling
                .roots()
                .filter_map(|(id, _)| self.dangling.get(id).map(|m| (MapKey::Dangling(id), m))),
        );
        let mut owners: AHashMap<NodeId, MapKey> = AHashMap::new();
        for (key, map) in maps {
            for (node, handle) in map.iter() {
                assert_eq!(map.node(handle), Some(node), "reverse entry missing for {}", handle);
                match self.index.get(&handle) {
                    Some(entry) => assert!(
                        entry.node == node && entry.map == key,
                        "index entry for {} disagrees with {:?}",
                        handle,
                        key
                    ),
                    None => panic!("handle {} missing from the global index", handle),
                }
                if let Some(other) = owners.insert(node, key) {
                    panic!("node {} bound in both {:?} and {:?}", node, other, key);
                }
                seen += 1;
            }
        }
        assert_eq!(seen, self.index.len(), "global index has stray handles");
    }
}

/// Bound part of the subtree under `node`, children before their parents
fn bound_post_order<T: InnerTree>(tree: &T, map: &NodeIdMap, node: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![(node, false)];
    while let Some((current, expanded)) = stack.pop() {
        if expanded {
            order.push(current);
            continue;
        }
        stack.push((current, true));
        for child in tree.inner_children(current) {
            if map.contains(child) {
                stack.push((child, false));
            }
        }
    }
    order
}

fn unknown_map(key: MapKey) -> InspectorError {
    match key {
        MapKey::Dangling(id) => InspectorError::UnknownDetachedMap(id),
        MapKey::Document => InspectorError::NoDocument,
    }
}

fn sorted_attributes(node: &DomNode) -> Vec<(String, String)> {
    let mut attributes: Vec<_> = node
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    attributes.sort();
    attributes
}
