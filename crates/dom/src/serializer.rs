//! Markup serializer - outer HTML of a subtree
//!
//! Follows raw child lists, so whitespace text is kept. Content documents of
//! frame owners are not part of their owner's markup.

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;

/// Elements that never have a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text is emitted without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl DomArena {
    /// Markup of `node_id` and everything below it
    pub fn outer_html(&self, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(256);
        self.serialize_node(node_id, false, &mut output)?;
        Ok(output)
    }

    fn serialize_node(&self, node_id: NodeId, raw_text: bool, output: &mut String) -> Result<()> {
        let node = self.get(node_id)?;

        match node.node_type {
            NodeType::Element => {
                let tag = node.node_name.to_ascii_lowercase();
                output.push('<');
                output.push_str(&tag);

                let mut attributes: Vec<_> = node.attributes.iter().collect();
                attributes.sort();
                for (name, value) in attributes {
                    output.push(' ');
                    output.push_str(name);
                    output.push_str("=\"");
                    escape_into(value, true, output);
                    output.push('"');
                }
                output.push('>');

                if VOID_ELEMENTS.contains(&tag.as_str()) && node.children_ids.is_empty() {
                    return Ok(());
                }
                let raw = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
                for &child in &node.children_ids {
                    self.serialize_node(child, raw, output)?;
                }

                output.push_str("</");
                output.push_str(&tag);
                output.push('>');
            }
            NodeType::Text if raw_text => output.push_str(&node.node_value),
            NodeType::Text => escape_into(&node.node_value, false, output),
            NodeType::Comment => {
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->");
            }
            NodeType::CdataSection => {
                output.push_str("<![CDATA[");
                output.push_str(&node.node_value);
                output.push_str("]]>");
            }
            NodeType::ProcessingInstruction => {
                output.push_str("<?");
                output.push_str(&node.node_name);
                output.push(' ');
                output.push_str(&node.node_value);
                output.push_str("?>");
            }
            NodeType::DocumentType => {
                output.push_str("<!DOCTYPE ");
                output.push_str(&node.node_name);
                output.push('>');
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child in &node.children_ids {
                    self.serialize_node(child, false, output)?;
                }
            }
            // No markup of their own
            NodeType::Attribute | NodeType::EntityReference | NodeType::Entity | NodeType::Notation => {}
        }

        Ok(())
    }
}

fn escape_into(text: &str, in_attribute: bool, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            '"' if in_attribute => output.push_str("&quot;"),
            '<' if !in_attribute => output.push_str("&lt;"),
            '>' if !in_attribute => output.push_str("&gt;"),
            c => output.push(c),
        }
    }
}
