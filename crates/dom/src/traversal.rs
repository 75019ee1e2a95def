//! Effective tree traversal
//!
//! Inspector-facing view of the document: embedded documents are part of the
//! same hierarchy (a frame owner's only child is its content document) and
//! whitespace-only text nodes can be hidden. Observers walk the tree through
//! these primitives only, never through raw child lists.

use crate::arena::DomArena;
use crate::types::{DomNode, NodeId, NodeType};

/// Traversal primitives over the effective tree
pub trait InnerTree {
    /// Node data, `None` for unknown ids
    fn node(&self, node_id: NodeId) -> Option<&DomNode>;

    fn inner_first_child(&self, node_id: NodeId) -> Option<NodeId>;
    fn inner_next_sibling(&self, node_id: NodeId) -> Option<NodeId>;
    fn inner_previous_sibling(&self, node_id: NodeId) -> Option<NodeId>;
    fn inner_parent_node(&self, node_id: NodeId) -> Option<NodeId>;

    /// Whitespace-only text node that the effective tree hides
    fn is_whitespace(&self, node_id: NodeId) -> bool;

    fn inner_child_node_count(&self, node_id: NodeId) -> usize {
        let mut count = 0;
        let mut child = self.inner_first_child(node_id);
        while let Some(id) = child {
            count += 1;
            child = self.inner_next_sibling(id);
        }
        count
    }

    /// Iterate the inner children of a node, left to right
    fn inner_children(&self, node_id: NodeId) -> InnerChildren<'_, Self>
    where
        Self: Sized,
    {
        InnerChildren {
            tree: self,
            next: self.inner_first_child(node_id),
        }
    }

    /// Pre-order walk of the subtree rooted at `root`, root included
    fn inner_descendants(&self, root: NodeId) -> InnerDescendants<'_, Self>
    where
        Self: Sized,
    {
        InnerDescendants {
            tree: self,
            stack: vec![root],
        }
    }

    /// Whether `node_id` is `ancestor` or lies below it
    fn is_inclusive_descendant(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.inner_parent_node(id);
        }
        false
    }
}

pub struct InnerChildren<'a, T> {
    tree: &'a T,
    next: Option<NodeId>,
}

impl<T: InnerTree> Iterator for InnerChildren<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.inner_next_sibling(current);
        Some(current)
    }
}

pub struct InnerDescendants<'a, T> {
    tree: &'a T,
    stack: Vec<NodeId>,
}

impl<T: InnerTree> Iterator for InnerDescendants<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let mark = self.stack.len();
        self.stack.extend(self.tree.inner_children(current));
        // Children were pushed left-to-right; flip them so the first one pops first
        self.stack[mark..].reverse();
        Some(current)
    }
}

impl DomArena {
    /// Next or previous sibling in the raw child list of the parent
    fn raw_sibling(&self, node_id: NodeId, forward: bool) -> Option<NodeId> {
        let node = self.get(node_id).ok()?;
        if forward {
            node.next_sibling_id
        } else {
            node.prev_sibling_id
        }
    }
}

impl InnerTree for DomArena {
    fn node(&self, node_id: NodeId) -> Option<&DomNode> {
        self.get(node_id).ok()
    }

    fn inner_first_child(&self, node_id: NodeId) -> Option<NodeId> {
        let node = self.get(node_id).ok()?;
        if let Some(document) = node.content_document_id {
            return Some(document);
        }
        let mut child = node.children_ids.first().copied();
        while let Some(id) = child {
            if !self.is_whitespace(id) {
                break;
            }
            child = self.raw_sibling(id, true);
        }
        child
    }

    fn inner_next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let mut sibling = self.raw_sibling(node_id, true);
        while let Some(id) = sibling {
            if !self.is_whitespace(id) {
                break;
            }
            sibling = self.raw_sibling(id, true);
        }
        sibling
    }

    fn inner_previous_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let mut sibling = self.raw_sibling(node_id, false);
        while let Some(id) = sibling {
            if !self.is_whitespace(id) {
                break;
            }
            sibling = self.raw_sibling(id, false);
        }
        sibling
    }

    fn inner_parent_node(&self, node_id: NodeId) -> Option<NodeId> {
        self.get(node_id).ok()?.parent_id
    }

    fn is_whitespace(&self, node_id: NodeId) -> bool {
        if !self.skips_whitespace() {
            return false;
        }
        match self.get(node_id) {
            Ok(node) => node.node_type == NodeType::Text && node.node_value.trim().is_empty(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomArena, Vec<NodeId>) {
        // document -> body -> [ws, p, ws, iframe -> #document -> span, ws]
        let mut arena = DomArena::new();
        let document = arena.create_document();
        let body = arena.create_element("body");
        let ws1 = arena.create_text("\n  ");
        let p = arena.create_element("p");
        let ws2 = arena.create_text(" ");
        let iframe = arena.create_element("iframe");
        let ws3 = arena.create_text("\t");
        arena.append_child(document, body).unwrap();
        for child in [ws1, p, ws2, iframe, ws3] {
            arena.append_child(body, child).unwrap();
        }
        let inner_document = arena.create_document();
        let span = arena.create_element("span");
        arena.append_child(inner_document, span).unwrap();
        arena.set_content_document(iframe, inner_document).unwrap();

        (arena, vec![document, body, p, iframe, inner_document, span, ws1])
    }

    #[test]
    fn test_skips_whitespace() {
        let (arena, ids) = sample();
        let (body, p, iframe) = (ids[1], ids[2], ids[3]);

        assert_eq!(arena.inner_first_child(body), Some(p));
        assert_eq!(arena.inner_next_sibling(p), Some(iframe));
        assert_eq!(arena.inner_previous_sibling(iframe), Some(p));
        assert_eq!(arena.inner_previous_sibling(p), None);
        assert_eq!(arena.inner_next_sibling(iframe), None);
        assert_eq!(arena.inner_child_node_count(body), 2);
        assert!(arena.is_whitespace(ids[6]));
    }

    #[test]
    fn test_keeps_whitespace_when_disabled() {
        let (mut arena, ids) = sample();
        arena.set_skip_whitespace(false);

        assert_eq!(arena.inner_first_child(ids[1]), Some(ids[6]));
        assert_eq!(arena.inner_child_node_count(ids[1]), 5);
    }

    #[test]
    fn test_crosses_frame_owners() {
        let (arena, ids) = sample();
        let (iframe, inner_document, span) = (ids[3], ids[4], ids[5]);

        assert_eq!(arena.inner_first_child(iframe), Some(inner_document));
        assert_eq!(arena.inner_child_node_count(iframe), 1);
        assert_eq!(arena.inner_parent_node(inner_document), Some(iframe));
        assert_eq!(arena.inner_next_sibling(inner_document), None);
        assert!(arena.is_inclusive_descendant(span, ids[0]));
    }

    #[test]
    fn test_wide_fan_out() {
        let mut arena = DomArena::new();
        let document = arena.create_document();
        let body = arena.create_element("body");
        arena.append_child(document, body).unwrap();
        let mut items = Vec::new();
        for i in 0..5000 {
            let node = if i % 2 == 0 {
                arena.create_element("li")
            } else {
                arena.create_text(" ")
            };
            arena.append_child(body, node).unwrap();
            if i % 2 == 0 {
                items.push(node);
            }
        }

        assert_eq!(arena.inner_child_node_count(body), 2500);
        let children: Vec<_> = arena.inner_children(body).collect();
        assert_eq!(children, items);
        assert_eq!(arena.inner_previous_sibling(items[1]), Some(items[0]));
        assert_eq!(arena.inner_descendants(document).count(), 2502);
    }

    #[test]
    fn test_descendants_in_document_order() {
        let (arena, ids) = sample();
        let order: Vec<_> = arena.inner_descendants(ids[0]).collect();
        assert_eq!(order, vec![ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]]);
    }
}
