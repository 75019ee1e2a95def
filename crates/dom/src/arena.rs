//! Arena-based DOM tree storage
//!
//! "Bad programmers worry about the code. Good programmers worry about
//! data structures and their relationships."
//!
//! Nodes are never freed: removing a node only unlinks it, so a `NodeId`
//! stays a valid identity for the whole lifetime of the arena. Observers
//! (the inspector) key their own state by `NodeId` and never own nodes.
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Node0][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

/// Arena allocator for DOM nodes
///
/// Design:
/// - Single Vec<DomNode> for sequential allocation
/// - No Rc/Arc: use indices everywhere
/// - Unlinked nodes keep their slot (detached, not destroyed)
#[derive(Debug)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,

    /// Root node ID (if set)
    root_id: Option<NodeId>,

    /// Whether the effective tree hides whitespace-only text nodes
    skip_whitespace: bool,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root_id: None,
            skip_whitespace: true,
        }
    }

    fn create_node(&mut self, node_type: NodeType, node_name: impl Into<String>) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        self.nodes.push(DomNode::new(node_id, node_type, node_name));
        node_id
    }

    /// Create a document node. The first document created becomes the root.
    pub fn create_document(&mut self) -> NodeId {
        let node_id = self.create_node(NodeType::Document, "#document");
        if self.root_id.is_none() {
            self.root_id = Some(node_id);
        }
        node_id
    }

    /// Create a detached element; tag names are stored upper-case like HTML documents do
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_node(NodeType::Element, tag.to_ascii_uppercase())
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        let node_id = self.create_node(NodeType::Text, "#text");
        self.nodes[node_id as usize].node_value = text.into();
        node_id
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        let node_id = self.create_node(NodeType::Comment, "#comment");
        self.nodes[node_id as usize].node_value = text.into();
        node_id
    }

    /// Create a detached document fragment
    pub fn create_document_fragment(&mut self) -> NodeId {
        self.create_node(NodeType::DocumentFragment, "#document-fragment")
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        // Verify node exists
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    /// Get root node ID
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Total number of nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_skip_whitespace(&mut self, skip: bool) {
        self.skip_whitespace = skip;
    }

    pub fn skips_whitespace(&self) -> bool {
        self.skip_whitespace
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or last when `None`).
    ///
    /// A child that is already attached somewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insertion(parent, child)?;
        if let Some(reference) = reference {
            if self.get(reference)?.parent_id != Some(parent) || reference == child {
                return Err(DomError::HierarchyRequest(format!(
                    "node {} is not a child of {}",
                    reference, parent
                )));
            }
        }

        self.detach(child)?;

        let parent_node = self.get_mut(parent)?;
        let position = match reference {
            Some(reference) => parent_node
                .children_ids
                .iter()
                .position(|&id| id == reference)
                .unwrap_or(parent_node.children_ids.len()),
            None => parent_node.children_ids.len(),
        };
        let prev = position
            .checked_sub(1)
            .and_then(|p| parent_node.children_ids.get(p).copied());
        let next = parent_node.children_ids.get(position).copied();
        parent_node.children_ids.insert(position, child);

        if let Some(prev) = prev {
            self.get_mut(prev)?.next_sibling_id = Some(child);
        }
        if let Some(next) = next {
            self.get_mut(next)?.prev_sibling_id = Some(child);
        }
        let child_node = self.get_mut(child)?;
        child_node.parent_id = Some(parent);
        child_node.prev_sibling_id = prev;
        child_node.next_sibling_id = next;
        Ok(())
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.get(parent)?;
        let child_node = self.get(child)?;

        if !parent_node.node_type.is_container() {
            return Err(DomError::HierarchyRequest(format!(
                "{} cannot have children",
                parent_node.node_name
            )));
        }
        if child_node.node_type == NodeType::Document {
            return Err(DomError::HierarchyRequest(
                "documents can only be attached through a frame owner".to_string(),
            ));
        }

        // Walk up from the parent: inserting an ancestor would create a cycle
        let mut current = Some(parent);
        while let Some(node_id) = current {
            if node_id == child {
                return Err(DomError::HierarchyRequest(format!(
                    "node {} is an ancestor of {}",
                    child, parent
                )));
            }
            current = self.get(node_id)?.parent_id;
        }
        Ok(())
    }

    /// Remove `child` from `parent`. The node keeps its own subtree.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.get(child)?.parent_id != Some(parent) {
            return Err(DomError::HierarchyRequest(format!(
                "node {} is not a child of {}",
                child, parent
            )));
        }
        self.detach(child)
    }

    /// Unlink a node from its parent, if it has one
    pub fn detach(&mut self, node_id: NodeId) -> Result<()> {
        let Some(parent) = self.get(node_id)?.parent_id else {
            return Ok(());
        };

        let parent_node = self.get_mut(parent)?;
        if parent_node.content_document_id == Some(node_id) {
            parent_node.content_document_id = None;
        } else {
            parent_node.children_ids.retain(|id| *id != node_id);
        }

        let node = self.get_mut(node_id)?;
        node.parent_id = None;
        let prev = node.prev_sibling_id.take();
        let next = node.next_sibling_id.take();
        if let Some(prev) = prev {
            self.get_mut(prev)?.next_sibling_id = next;
        }
        if let Some(next) = next {
            self.get_mut(next)?.prev_sibling_id = prev;
        }
        Ok(())
    }

    /// Attach a document as the content document of a frame owner element
    pub fn set_content_document(&mut self, owner: NodeId, document: NodeId) -> Result<()> {
        let owner_node = self.get(owner)?;
        if !owner_node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "Element".to_string(),
                actual: format!("{:?}", owner_node.node_type),
            });
        }
        let document_node = self.get(document)?;
        if document_node.node_type != NodeType::Document {
            return Err(DomError::InvalidNodeType {
                expected: "Document".to_string(),
                actual: format!("{:?}", document_node.node_type),
            });
        }

        if let Some(previous) = self.get(owner)?.content_document_id {
            self.get_mut(previous)?.parent_id = None;
        }
        self.detach(document)?;
        self.get_mut(owner)?.content_document_id = Some(document);
        self.get_mut(document)?.parent_id = Some(owner);
        Ok(())
    }

    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.element_mut(element)?;
        node.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Returns whether the attribute existed
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<bool> {
        let node = self.element_mut(element)?;
        Ok(node.attributes.remove(name).is_some())
    }

    /// Replace the character data of a text or comment node
    pub fn set_node_value(&mut self, node_id: NodeId, value: impl Into<String>) -> Result<()> {
        let node = self.get_mut(node_id)?;
        if !node.is_character_data() {
            return Err(DomError::InvalidNodeType {
                expected: "CharacterData".to_string(),
                actual: format!("{:?}", node.node_type),
            });
        }
        node.node_value = value.into();
        Ok(())
    }

    fn element_mut(&mut self, element: NodeId) -> Result<&mut DomNode> {
        let node = self.get_mut(element)?;
        if !node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "Element".to_string(),
                actual: format!("{:?}", node.node_type),
            });
        }
        Ok(node)
    }

    /// Traverse tree depth-first (iterative, no recursion)
    ///
    /// Follows raw child lists and content documents; whitespace is not skipped.
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            if let Some(document) = node.content_document_id {
                stack.push(document);
            }
            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find nodes attached under `start_id` matching predicate, in document order
    pub fn find<F>(&self, start_id: NodeId, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut found = Vec::new();
        let _ = self.traverse_df(start_id, |node| {
            if predicate(node) {
                found.push(node.node_id);
            }
            Ok(())
        });
        found
    }

    /// Find all elements under the root by tag name
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let Some(root) = self.root_id else {
            return Vec::new();
        };
        self.find(root, |node| {
            node.node_type == NodeType::Element && node.node_name.eq_ignore_ascii_case(tag)
        })
    }

    /// Find element under the root by ID attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let root = self.root_id?;
        self.find(root, |node| {
            node.node_type == NodeType::Element && node.attr("id") == Some(id)
        })
        .into_iter()
        .next()
    }

    /// Concatenated text of every text node in the subtree
    pub fn text_content(&self, node_id: NodeId) -> Result<String> {
        let mut text = String::new();
        self.traverse_df(node_id, |node| {
            if node.node_type == NodeType::Text {
                text.push_str(&node.node_value);
            }
            Ok(())
        })?;
        Ok(text)
    }

    /// Clear arena (reuse allocation)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root_id = None;
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}
