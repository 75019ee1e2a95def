//! DOM Service - builds a live document from a CDP-shaped snapshot
//!
//! This handles:
//! - Parsing `DOM.getDocument`-style JSON into a fresh arena
//! - Attaching iframe content documents as frame owners
//! - Enforcing iframe limits

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{NodeId, NodeType};
use serde_json::Value;

/// Configuration for DOM service
#[derive(Debug, Clone)]
pub struct DomServiceConfig {
    pub skip_whitespace: bool,
    pub max_iframes: usize,
    pub max_iframe_depth: usize,
}

impl Default for DomServiceConfig {
    fn default() -> Self {
        Self {
            skip_whitespace: true,
            max_iframes: 100,
            max_iframe_depth: 5,
        }
    }
}

/// Main DOM service
pub struct DomService {
    config: DomServiceConfig,
    arena: DomArena,
    iframe_count: usize,
}

impl DomService {
    /// Create new DOM service with default config
    pub fn new() -> Self {
        Self::with_config(DomServiceConfig::default())
    }

    /// Create DOM service with custom config
    pub fn with_config(config: DomServiceConfig) -> Self {
        let mut arena = DomArena::new();
        arena.set_skip_whitespace(config.skip_whitespace);
        Self {
            config,
            arena,
            iframe_count: 0,
        }
    }

    /// Get reference to internal arena
    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    /// Get mutable reference to internal arena
    pub fn arena_mut(&mut self) -> &mut DomArena {
        &mut self.arena
    }

    pub fn into_arena(self) -> DomArena {
        self.arena
    }

    /// Parse a document snapshot and make it the arena root
    ///
    /// Input format follows CDP's DOM.getDocument response:
    /// ```json
    /// {
    ///   "root": {
    ///     "nodeType": 9,
    ///     "nodeName": "#document",
    ///     "children": [
    ///       { "nodeType": 1, "nodeName": "DIV", "attributes": ["id", "a"] }
    ///     ]
    ///   }
    /// }
    /// ```
    pub fn load_document(&mut self, snapshot: &Value) -> Result<NodeId> {
        let root = snapshot
            .get("root")
            .ok_or_else(|| DomError::FixtureError("Missing 'root' in snapshot".to_string()))?;

        self.arena.clear();
        self.iframe_count = 0;
        let root_id = self.parse_node(root, 0)?;
        self.arena.set_root(root_id)?;

        Ok(root_id)
    }

    /// Parse a snapshot string, see [`DomService::load_document`]
    pub fn load_document_str(&mut self, snapshot: &str) -> Result<NodeId> {
        let value: Value = serde_json::from_str(snapshot)?;
        self.load_document(&value)
    }

    /// Recursively parse a node, returning its detached id
    fn parse_node(&mut self, json: &Value, frame_depth: usize) -> Result<NodeId> {
        let node_type_val = json["nodeType"]
            .as_u64()
            .ok_or_else(|| DomError::FixtureError("Missing nodeType".to_string()))?;

        let node_type = u8::try_from(node_type_val)
            .ok()
            .and_then(NodeType::from_u8)
            .ok_or_else(|| DomError::InvalidNodeType {
                expected: "valid NodeType".to_string(),
                actual: format!("{}", node_type_val),
            })?;

        let node_value = json["nodeValue"].as_str().unwrap_or("");

        let node_id = match node_type {
            NodeType::Document => self.arena.create_document(),
            NodeType::DocumentFragment => self.arena.create_document_fragment(),
            NodeType::Text => self.arena.create_text(node_value),
            NodeType::Comment => self.arena.create_comment(node_value),
            NodeType::Element => {
                let name = json["nodeName"]
                    .as_str()
                    .ok_or_else(|| DomError::FixtureError("Missing nodeName".to_string()))?;
                self.arena.create_element(name)
            }
            other => {
                return Err(DomError::InvalidNodeType {
                    expected: "Document, Element, Text or Comment".to_string(),
                    actual: format!("{:?}", other),
                })
            }
        };

        // Attributes come as a flat [name, value, name, value, ...] list
        if let Some(attrs) = json["attributes"].as_array() {
            for pair in attrs.chunks_exact(2) {
                if let (Some(key), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
                    self.arena.set_attribute(node_id, key, value)?;
                }
            }
        }

        if let Some(children) = json["children"].as_array() {
            for child in children {
                let child_id = self.parse_node(child, frame_depth)?;
                self.arena.append_child(node_id, child_id)?;
            }
        }

        // Content document (iframe)
        if let Some(content_doc) = json.get("contentDocument") {
            self.iframe_count += 1;
            if self.iframe_count > self.config.max_iframes {
                return Err(DomError::MaxIframeCountExceeded {
                    current: self.iframe_count,
                    max: self.config.max_iframes,
                });
            }
            if frame_depth + 1 > self.config.max_iframe_depth {
                return Err(DomError::MaxIframeDepthExceeded {
                    current: frame_depth + 1,
                    max: self.config.max_iframe_depth,
                });
            }
            let doc_id = self.parse_node(content_doc, frame_depth + 1)?;
            self.arena.set_content_document(node_id, doc_id)?;
        }

        Ok(node_id)
    }
}

impl Default for DomService {
    fn default() -> Self {
        Self::new()
    }
}
