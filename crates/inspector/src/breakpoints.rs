//! DOM breakpoints
//!
//! Every node with breakpoint state carries one `u32` mask:
//! - low bits: breakpoints set on the node itself (`1 << type`)
//! - bits from 16 up: breakpoints inherited from an ancestor (`1 << (type + 16)`)
//!
//! Only subtree-modification breakpoints are inherited. Setting one on a node
//! marks its whole subtree; the walk stops below nodes that own the same
//! breakpoint themselves since their subtree is already marked.

use crate::binder::NodeBinder;
use crate::id_map::Handle;
use ahash::AHashMap;
use dom::{InnerTree, NodeId};
use serde::Serialize;

const DERIVED_TYPE_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DomBreakpointType {
    SubtreeModified = 0,
    AttributeModified = 1,
    NodeRemoved = 2,
}

impl DomBreakpointType {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::SubtreeModified),
            1 => Some(Self::AttributeModified),
            2 => Some(Self::NodeRemoved),
            _ => None,
        }
    }

    fn root_bit(self) -> u32 {
        1 << self as u32
    }

    fn derived_bit(self) -> u32 {
        self.root_bit() << DERIVED_TYPE_SHIFT
    }

    fn is_inheritable(self) -> bool {
        self.root_bit() & INHERITABLE_TYPES_MASK != 0
    }
}

const INHERITABLE_TYPES_MASK: u32 = 1 << DomBreakpointType::SubtreeModified as u32;

/// Why a mutation would stop the debugger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomBreakpointHit {
    /// Node owning the breakpoint
    pub node: Handle,
    pub breakpoint_type: DomBreakpointType,
    /// Node the mutation happened to, for inherited breakpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Handle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion: Option<bool>,
}

#[derive(Debug, Default)]
pub struct BreakpointPropagator {
    masks: AHashMap<NodeId, u32>,
}

impl BreakpointPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Raw state of a node, 0 if it has none
    pub fn mask(&self, node: NodeId) -> u32 {
        self.masks.get(&node).copied().unwrap_or(0)
    }

    fn store(&mut self, node: NodeId, mask: u32) {
        if mask == 0 {
            self.masks.remove(&node);
        } else {
            self.masks.insert(node, mask);
        }
    }

    pub fn has_breakpoint(&self, node: NodeId, breakpoint_type: DomBreakpointType) -> bool {
        self.mask(node) & (breakpoint_type.root_bit() | breakpoint_type.derived_bit()) != 0
    }

    pub fn set_dom_breakpoint<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
        breakpoint_type: DomBreakpointType,
    ) {
        let root_bit = breakpoint_type.root_bit();
        self.store(node, self.mask(node) | root_bit);
        if breakpoint_type.is_inheritable() {
            let children: Vec<NodeId> = tree.inner_children(node).collect();
            for child in children {
                self.update_subtree_breakpoints(tree, child, root_bit, true);
            }
        }
    }

    pub fn remove_dom_breakpoint<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
        breakpoint_type: DomBreakpointType,
    ) {
        let root_bit = breakpoint_type.root_bit();
        let mask = self.mask(node) & !root_bit;
        self.store(node, mask);

        // Still covered by an ancestor: the subtree keeps its derived bits
        if breakpoint_type.is_inheritable() && mask & breakpoint_type.derived_bit() == 0 {
            let children: Vec<NodeId> = tree.inner_children(node).collect();
            for child in children {
                self.update_subtree_breakpoints(tree, child, root_bit, false);
            }
        }
    }

    /// Set or clear the derived bits of `root_mask` on `root` and below
    pub fn update_subtree_breakpoints<T: InnerTree>(
        &mut self,
        tree: &T,
        root: NodeId,
        root_mask: u32,
        value: bool,
    ) {
        let mut stack = vec![(root, root_mask)];
        while let Some((node, root_mask)) = stack.pop() {
            let old_mask = self.mask(node);
            let derived_mask = root_mask << DERIVED_TYPE_SHIFT;
            let new_mask = if value {
                old_mask | derived_mask
            } else {
                old_mask & !derived_mask
            };
            self.store(node, new_mask);

            let new_root_mask = root_mask & !new_mask;
            if new_root_mask == 0 {
                continue;
            }
            stack.extend(tree.inner_children(node).map(|child| (child, new_root_mask)));
        }
    }

    /// Inherit the parent's subtree breakpoints
    pub fn did_insert_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        if self.masks.is_empty() {
            return;
        }
        let Some(parent) = tree.inner_parent_node(node) else {
            return;
        };
        let mask = self.mask(parent);
        let inheritable = (mask | (mask >> DERIVED_TYPE_SHIFT)) & INHERITABLE_TYPES_MASK;
        if inheritable != 0 {
            self.update_subtree_breakpoints(tree, node, inheritable, true);
        }
    }

    /// Forget all state of the subtree about to leave the tree
    pub fn will_remove_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        if self.masks.is_empty() {
            return;
        }
        for id in tree.inner_descendants(node) {
            self.masks.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.masks.clear();
    }

    pub fn should_break_on_node_insertion<T: InnerTree>(
        &self,
        tree: &T,
        binder: &mut NodeBinder,
        parent: NodeId,
    ) -> Option<DomBreakpointHit> {
        if self.has_breakpoint(parent, DomBreakpointType::SubtreeModified) {
            return self.describe_hit(tree, binder, parent, DomBreakpointType::SubtreeModified, true);
        }
        None
    }

    pub fn should_break_on_node_removal<T: InnerTree>(
        &self,
        tree: &T,
        binder: &mut NodeBinder,
        node: NodeId,
    ) -> Option<DomBreakpointHit> {
        if self.has_breakpoint(node, DomBreakpointType::NodeRemoved) {
            return self.describe_hit(tree, binder, node, DomBreakpointType::NodeRemoved, false);
        }
        let parent = tree.inner_parent_node(node)?;
        if self.has_breakpoint(parent, DomBreakpointType::SubtreeModified) {
            return self.describe_hit(tree, binder, node, DomBreakpointType::SubtreeModified, false);
        }
        None
    }

    pub fn should_break_on_attribute_modification<T: InnerTree>(
        &self,
        tree: &T,
        binder: &mut NodeBinder,
        element: NodeId,
    ) -> Option<DomBreakpointHit> {
        if self.has_breakpoint(element, DomBreakpointType::AttributeModified) {
            return self.describe_hit(
                tree,
                binder,
                element,
                DomBreakpointType::AttributeModified,
                false,
            );
        }
        None
    }

    fn describe_hit<T: InnerTree>(
        &self,
        tree: &T,
        binder: &mut NodeBinder,
        target: NodeId,
        breakpoint_type: DomBreakpointType,
        insertion: bool,
    ) -> Option<DomBreakpointHit> {
        let mut owner = target;
        let mut hit_target = None;
        let mut hit_insertion = None;

        if breakpoint_type.is_inheritable() {
            // The target may be unknown to the client
            hit_target = binder.push_node_path_to_frontend(tree, target);
            if !insertion {
                owner = tree.inner_parent_node(target)?;
            }
            while self.mask(owner) & breakpoint_type.root_bit() == 0 {
                owner = tree.inner_parent_node(owner)?;
            }
            hit_insertion = Some(insertion);
        }

        let (node, _) = binder.handle_for(owner)?;
        Some(DomBreakpointHit {
            node,
            breakpoint_type,
            target: hit_target,
            insertion: hit_insertion,
        })
    }
}
