//! Dangling node maps
//!
//! When a subtree the client knows about leaves the document, its handles
//! move into a map of its own so they keep resolving. The registry keeps
//! these maps in creation order and only drops one when asked to.

use crate::id_map::{Handle, NodeIdMap};
use dom::NodeId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DanglingMapId(u32);

/// Handles of one detached subtree
#[derive(Debug)]
pub struct DanglingMap {
    id: DanglingMapId,
    root: NodeId,
    map: NodeIdMap,
}

impl DanglingMap {
    pub fn id(&self) -> DanglingMapId {
        self.id
    }

    /// The detached node this map was created for
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn map(&self) -> &NodeIdMap {
        &self.map
    }

    pub(crate) fn into_map(self) -> NodeIdMap {
        self.map
    }
}

#[derive(Debug, Default)]
pub struct DanglingNodeRegistry {
    maps: Vec<DanglingMap>,
    next_id: u32,
}

impl DanglingNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty map for the subtree rooted at `root`
    pub fn create(&mut self, root: NodeId) -> DanglingMapId {
        debug_assert!(self.map_rooted_at(root).is_none());
        let id = DanglingMapId(self.next_id);
        self.next_id += 1;
        self.maps.push(DanglingMap {
            id,
            root,
            map: NodeIdMap::new(),
        });
        id
    }

    /// The subtree of a map got attached below another detached node
    pub fn reroot(&mut self, id: DanglingMapId, root: NodeId) {
        debug_assert!(self.map_rooted_at(root).is_none());
        if let Some(i) = self.position(id) {
            self.maps[i].root = root;
        }
    }

    pub fn get(&self, id: DanglingMapId) -> Option<&NodeIdMap> {
        self.position(id).map(|i| &self.maps[i].map)
    }

    pub fn get_mut(&mut self, id: DanglingMapId) -> Option<&mut NodeIdMap> {
        self.position(id).map(move |i| &mut self.maps[i].map)
    }

    pub fn root(&self, id: DanglingMapId) -> Option<NodeId> {
        self.position(id).map(|i| self.maps[i].root)
    }

    pub fn map_rooted_at(&self, node: NodeId) -> Option<DanglingMapId> {
        self.maps.iter().find(|m| m.root == node).map(|m| m.id)
    }

    /// Which dangling map holds `node`, if any
    pub fn find(&self, node: NodeId) -> Option<(DanglingMapId, Handle)> {
        self.maps
            .iter()
            .find_map(|m| m.map.handle(node).map(|handle| (m.id, handle)))
    }

    /// Remove a map; the caller is responsible for its handles
    pub fn discard(&mut self, id: DanglingMapId) -> Option<DanglingMap> {
        self.position(id).map(|i| self.maps.remove(i))
    }

    /// Remove every map, oldest first
    pub fn take_all(&mut self) -> Vec<DanglingMap> {
        std::mem::take(&mut self.maps)
    }

    /// Roots in creation order
    pub fn roots(&self) -> impl Iterator<Item = (DanglingMapId, NodeId)> + '_ {
        self.maps.iter().map(|m| (m.id, m.root))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    fn position(&self, id: DanglingMapId) -> Option<usize> {
        self.maps.iter().position(|m| m.id == id)
    }
}
