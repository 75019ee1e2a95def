//! Core node type definitions
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. A NodeId is never reused, so it doubles as stable node identity
//! 3. Use SmallVec for small arrays (avoid heap allocation)

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Node identifier (index into arena)
/// u32 allows 4 billion nodes, enough for any webpage
pub type NodeId = u32;

/// Node type matching DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CdataSection = 4,
    EntityReference = 5,
    Entity = 6,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
    Notation = 12,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CdataSection),
            5 => Some(NodeType::EntityReference),
            6 => Some(NodeType::Entity),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            12 => Some(NodeType::Notation),
            _ => None,
        }
    }

    /// Nodes that may own children
    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeType::Element | NodeType::Document | NodeType::DocumentFragment
        )
    }
}

/// The DOM tree node structure
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>, // Most nodes have <4 children
    pub prev_sibling_id: Option<NodeId>,
    pub next_sibling_id: Option<NodeId>,

    pub node_name: String,
    pub node_value: String,
    pub attributes: HashMap<String, String>,

    /// Frame owners (iframe, object) point at their content document.
    /// The content document's `parent_id` points back at the owner.
    pub content_document_id: Option<NodeId>,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: impl Into<String>) -> Self {
        Self {
            node_id,
            node_type,
            node_name: node_name.into(),
            node_value: String::new(),
            attributes: HashMap::new(),
            parent_id: None,
            children_ids: SmallVec::new(),
            prev_sibling_id: None,
            next_sibling_id: None,
            content_document_id: None,
        }
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    /// Check if node is an element
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Check if node is text
    pub fn is_text(&self) -> bool {
        self.node_type == NodeType::Text
    }

    /// Text and comment nodes carry searchable character data
    pub fn is_character_data(&self) -> bool {
        matches!(
            self.node_type,
            NodeType::Text | NodeType::Comment | NodeType::CdataSection
        )
    }

    /// Check if element hosts a nested document
    pub fn is_frame_owner(&self) -> bool {
        self.content_document_id.is_some()
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Whitespace-separated tokens of the `class` attribute
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        let mut node = DomNode::new(0, NodeType::Element, "div");
        node.attributes
            .insert("class".to_string(), " card  wide ".to_string());

        let classes: Vec<_> = node.class_names().collect();
        assert_eq!(classes, vec!["card", "wide"]);
    }

    #[test]
    fn test_container_types() {
        assert!(NodeType::Element.is_container());
        assert!(NodeType::Document.is_container());
        assert!(!NodeType::Text.is_container());
        assert_eq!(NodeType::from_u8(8), Some(NodeType::Comment));
        assert_eq!(NodeType::from_u8(42), None);
    }
}
