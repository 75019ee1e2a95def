//! DOM agent - one inspection session
//!
//! Composes the binder, the search scheduler and the breakpoint state, and is
//! the only thing a host talks to. The host keeps ownership of its tree and
//! passes it into every call:
//!
//! ```text
//!   host loop
//!     ├─ tree mutated      → did_insert_dom_node / will_remove_dom_node / ...
//!     ├─ client command    → get_child_nodes / perform_search / set_attribute / ...
//!     └─ search_tick()     → on_match_jobs_timer
//! ```

use crate::binder::NodeBinder;
use crate::breakpoints::{BreakpointPropagator, DomBreakpointHit, DomBreakpointType};
use crate::config::InspectorConfig;
use crate::error::{InspectorError, Result};
use crate::events::{DomListener, InspectorEvent};
use crate::id_map::Handle;
use crate::search::SearchScheduler;
use dom::{DomArena, DomError, InnerTree, NodeId};
use std::future::Future;
use tokio::sync::broadcast;

pub struct DomAgent {
    pub config: InspectorConfig,
    binder: NodeBinder,
    search: SearchScheduler,
    breakpoints: BreakpointPropagator,
}

impl DomAgent {
    pub fn new() -> Self {
        Self::with_config(InspectorConfig::default())
    }

    pub fn with_config(config: InspectorConfig) -> Self {
        Self {
            binder: NodeBinder::new(&config),
            search: SearchScheduler::new(&config),
            breakpoints: BreakpointPropagator::new(),
            config,
        }
    }

    pub fn binder(&self) -> &NodeBinder {
        &self.binder
    }

    pub fn search(&self) -> &SearchScheduler {
        &self.search
    }

    pub fn breakpoints(&self) -> &BreakpointPropagator {
        &self.breakpoints
    }

    /// Subscribe to client events
    pub fn subscribe(&self) -> broadcast::Receiver<InspectorEvent> {
        self.binder.frontend().subscribe()
    }

    pub fn set_dom_listener(&mut self, listener: Option<Box<dyn DomListener>>) {
        self.binder.set_dom_listener(listener);
    }

    pub fn document(&self) -> Option<NodeId> {
        self.binder.document()
    }

    /// Inspect another document. Drops every handle, search and breakpoint.
    pub fn set_document<T: InnerTree>(&mut self, tree: &T, root: Option<NodeId>) {
        if root == self.binder.document() {
            return;
        }
        self.search.search_canceled();
        self.breakpoints.clear();
        self.binder.set_document(tree, root);
    }

    /// Stop inspecting the current document and forget all handles
    pub fn reset(&mut self) {
        self.search.search_canceled();
        self.breakpoints.clear();
        self.binder.reset();
    }

    // ---- Host notifications ----

    pub fn did_insert_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        self.breakpoints.did_insert_dom_node(tree, node);
        self.binder.did_insert_dom_node(tree, node);
    }

    pub fn will_remove_dom_node<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        self.breakpoints.will_remove_dom_node(tree, node);
        self.binder.will_remove_dom_node(tree, node);
    }

    pub fn did_modify_dom_attr<T: InnerTree>(&mut self, tree: &T, element: NodeId) {
        self.binder.did_modify_dom_attr(tree, element);
    }

    pub fn character_data_modified<T: InnerTree>(&mut self, tree: &T, node: NodeId) {
        self.binder.character_data_modified(tree, node);
    }

    // ---- Handles ----

    pub fn node_for_id(&self, handle: Handle) -> Option<NodeId> {
        self.binder.node_for_id(handle)
    }

    /// Bind the children of a node and send them to the client
    pub fn get_child_nodes<T: InnerTree>(&mut self, tree: &T, handle: Handle) -> Result<()> {
        self.binder.push_child_nodes_to_frontend(tree, handle)
    }

    pub fn push_node_path_to_frontend<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
    ) -> Option<Handle> {
        self.binder.push_node_path_to_frontend(tree, node)
    }

    /// Resolve a path like `"1,HTML,1,BODY"`: pairs of child index and node
    /// name, starting at the document root.
    pub fn node_for_path<T: InnerTree>(&self, tree: &T, path: &str) -> Result<NodeId> {
        let mut node = self.binder.document().ok_or(InspectorError::NoDocument)?;
        let invalid = || InspectorError::InvalidPath(path.to_string());

        let tokens: Vec<&str> = path.split(',').filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() || tokens.len() % 2 != 0 {
            return Err(invalid());
        }

        for step in tokens.chunks(2) {
            let index: usize = step[0].trim().parse().map_err(|_| invalid())?;
            let child = tree
                .inner_children(node)
                .nth(index)
                .ok_or_else(invalid)?;
            let name = tree.node(child).map(|n| n.node_name.as_str());
            if name != Some(step[1]) {
                return Err(invalid());
            }
            node = child;
        }
        Ok(node)
    }

    pub fn push_node_by_path_to_frontend<T: InnerTree>(
        &mut self,
        tree: &T,
        path: &str,
    ) -> Result<Handle> {
        let node = self.node_for_path(tree, path)?;
        self.binder
            .push_node_path_to_frontend(tree, node)
            .ok_or_else(|| InspectorError::InvalidPath(path.to_string()))
    }

    pub fn release_dangling_nodes(&mut self) {
        self.binder.release_dangling_nodes();
    }

    pub fn add_inspected_node(&mut self, handle: Handle) -> Result<()> {
        self.binder.add_inspected_node(handle)
    }

    pub fn inspected_node(&self, index: usize) -> Option<Handle> {
        self.binder.inspected_node(index)
    }

    // ---- Search ----

    pub fn perform_search<T: InnerTree>(&mut self, tree: &T, query: &str, run_synchronously: bool) {
        self.search
            .perform_search(tree, &mut self.binder, query, run_synchronously);
    }

    pub fn search_canceled(&mut self) {
        self.search.search_canceled();
    }

    /// Resolves when the next search step is due. Pending forever while no
    /// search runs; create a fresh one after every step.
    pub fn search_tick(&self) -> impl Future<Output = ()> + Send + 'static {
        self.search.tick()
    }

    pub fn on_match_jobs_timer<T: InnerTree>(&mut self, tree: &T) {
        self.search.on_match_jobs_timer(tree, &mut self.binder);
    }

    // ---- Breakpoints ----

    pub fn set_dom_breakpoint<T: InnerTree>(
        &mut self,
        tree: &T,
        handle: Handle,
        breakpoint_type: DomBreakpointType,
    ) -> Result<()> {
        let node = self.binder.resolve(handle)?;
        self.breakpoints.set_dom_breakpoint(tree, node, breakpoint_type);
        tracing::debug!("{:?} breakpoint set on {}", breakpoint_type, handle);
        Ok(())
    }

    pub fn remove_dom_breakpoint<T: InnerTree>(
        &mut self,
        tree: &T,
        handle: Handle,
        breakpoint_type: DomBreakpointType,
    ) -> Result<()> {
        let node = self.binder.resolve(handle)?;
        self.breakpoints
            .remove_dom_breakpoint(tree, node, breakpoint_type);
        Ok(())
    }

    pub fn has_breakpoint(&self, handle: Handle, breakpoint_type: DomBreakpointType) -> Result<bool> {
        let node = self.binder.resolve(handle)?;
        Ok(self.breakpoints.has_breakpoint(node, breakpoint_type))
    }

    pub fn should_break_on_node_insertion<T: InnerTree>(
        &mut self,
        tree: &T,
        parent: NodeId,
    ) -> Option<DomBreakpointHit> {
        self.breakpoints
            .should_break_on_node_insertion(tree, &mut self.binder, parent)
    }

    pub fn should_break_on_node_removal<T: InnerTree>(
        &mut self,
        tree: &T,
        node: NodeId,
    ) -> Option<DomBreakpointHit> {
        self.breakpoints
            .should_break_on_node_removal(tree, &mut self.binder, node)
    }

    pub fn should_break_on_attribute_modification<T: InnerTree>(
        &mut self,
        tree: &T,
        element: NodeId,
    ) -> Option<DomBreakpointHit> {
        self.breakpoints
            .should_break_on_attribute_modification(tree, &mut self.binder, element)
    }

    // ---- Editing commands ----

    pub fn set_attribute(
        &mut self,
        arena: &mut DomArena,
        handle: Handle,
        name: &str,
        value: &str,
    ) -> Result<()> {
        let element = self.binder.resolve(handle)?;
        arena.set_attribute(element, name, value)?;
        self.did_modify_dom_attr(&*arena, element);
        Ok(())
    }

    pub fn remove_attribute(&mut self, arena: &mut DomArena, handle: Handle, name: &str) -> Result<()> {
        let element = self.binder.resolve(handle)?;
        if arena.remove_attribute(element, name)? {
            self.did_modify_dom_attr(&*arena, element);
        }
        Ok(())
    }

    pub fn remove_node(&mut self, arena: &mut DomArena, handle: Handle) -> Result<()> {
        let node = self.binder.resolve(handle)?;
        let parent = arena.get(node)?.parent_id.ok_or_else(|| {
            DomError::HierarchyRequest(format!("node {} has no parent", node))
        })?;
        self.will_remove_dom_node(&*arena, node);
        arena.remove_child(parent, node)?;
        Ok(())
    }

    /// Markup of the node behind `handle`
    pub fn get_outer_html(&self, arena: &DomArena, handle: Handle) -> Result<String> {
        let node = self.binder.resolve(handle)?;
        Ok(arena.outer_html(node)?)
    }

    /// Replace an element by a new one with another tag name.
    ///
    /// Attributes and children move over; the old element leaves the tree.
    /// Returns the handle of the new element, which the client learns
    /// about the same way it would for any inserted node.
    pub fn change_tag_name(
        &mut self,
        arena: &mut DomArena,
        handle: Handle,
        tag_name: &str,
    ) -> Result<Handle> {
        let old = self.binder.resolve(handle)?;
        let old_node = arena.get(old)?;
        if !old_node.is_element() {
            return Err(DomError::InvalidNodeType {
                expected: "Element".to_string(),
                actual: format!("{:?}", old_node.node_type),
            }
            .into());
        }
        if !is_valid_tag_name(tag_name) {
            return Err(DomError::InvalidName(tag_name.to_string()).into());
        }
        if old_node.node_name.eq_ignore_ascii_case(tag_name) {
            return Ok(handle);
        }
        let parent = old_node.parent_id.ok_or_else(|| {
            DomError::HierarchyRequest(format!("node {} has no parent", old))
        })?;
        let attributes = old_node.attributes.clone();
        let children = old_node.children_ids.to_vec();
        let children_requested = self.binder.children_requested(handle);

        let new = arena.create_element(tag_name);
        for (name, value) in &attributes {
            arena.set_attribute(new, name, value)?;
        }
        arena.insert_before(parent, new, Some(old))?;
        self.did_insert_dom_node(&*arena, new);

        for child in children {
            self.will_remove_dom_node(&*arena, child);
            arena.append_child(new, child)?;
            self.did_insert_dom_node(&*arena, child);
        }

        self.will_remove_dom_node(&*arena, old);
        arena.remove_child(parent, old)?;
        tracing::debug!("renamed {} to <{}> as node {}", handle, tag_name, new);

        let new_handle = self
            .binder
            .push_node_path_to_frontend(&*arena, new)
            .ok_or(InspectorError::NodeNotFound(handle))?;
        if children_requested {
            self.binder.push_child_nodes_to_frontend(&*arena, new_handle)?;
        }
        Ok(new_handle)
    }

    pub fn set_text_node_value(
        &mut self,
        arena: &mut DomArena,
        handle: Handle,
        value: &str,
    ) -> Result<()> {
        let node = self.binder.resolve(handle)?;
        arena.set_node_value(node, value)?;
        self.character_data_modified(&*arena, node);
        Ok(())
    }
}

fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(char::is_alphabetic)
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

impl Default for DomAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// document -> HTML -> (HEAD, BODY -> (DIV, P "text"))
    fn page() -> (DomArena, NodeId) {
        let mut arena = DomArena::new();
        let document = arena.create_document();
        let html = arena.create_element("html");
        let head = arena.create_element("head");
        let body = arena.create_element("body");
        let div = arena.create_element("div");
        let p = arena.create_element("p");
        let text = arena.create_text("text");
        arena.append_child(document, html).unwrap();
        arena.append_child(html, head).unwrap();
        arena.append_child(html, body).unwrap();
        arena.append_child(body, div).unwrap();
        arena.append_child(body, p).unwrap();
        arena.append_child(p, text).unwrap();
        (arena, document)
    }

    #[test]
    fn test_node_for_path() {
        let (arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));

        let p = agent.node_for_path(&arena, "0,HTML,1,BODY,1,P").unwrap();
        assert_eq!(arena.get(p).unwrap().node_name, "P");

        for bad in ["", "0,HTML,1", "0,BODY", "x,HTML", "0,HTML,5,BODY"] {
            assert!(
                matches!(agent.node_for_path(&arena, bad), Err(InspectorError::InvalidPath(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_node_for_path_without_document() {
        let (arena, _) = page();
        let agent = DomAgent::new();
        assert!(matches!(
            agent.node_for_path(&arena, "0,HTML"),
            Err(InspectorError::NoDocument)
        ));
    }

    #[test]
    fn test_push_node_by_path() {
        let (arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));

        let handle = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,0,DIV")
            .unwrap();
        let div = agent.node_for_id(handle).unwrap();
        assert_eq!(arena.get(div).unwrap().node_name, "DIV");
    }

    #[test]
    fn test_editing_commands_emit_events() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let mut rx = agent.subscribe();

        let handle = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,1,P")
            .unwrap();
        let p = agent.node_for_id(handle).unwrap();
        let text = arena.get(p).unwrap().children_ids[0];
        let text_handle = agent.push_node_path_to_frontend(&arena, text).unwrap();
        while rx.try_recv().is_ok() {}

        agent.set_attribute(&mut arena, handle, "class", "x").unwrap();
        agent.remove_attribute(&mut arena, handle, "missing").unwrap();
        agent.set_text_node_value(&mut arena, text_handle, "changed").unwrap();
        agent.remove_node(&mut arena, handle).unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            InspectorEvent::AttributesUpdated { node, .. } if node == handle
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            InspectorEvent::CharacterDataModified {
                node: text_handle,
                value: "changed".to_string()
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            InspectorEvent::ChildNodeRemoved { node, .. } if node == handle
        ));
        // Removed but still addressable
        assert_eq!(agent.node_for_id(handle), Some(p));
        assert!(arena.get(p).unwrap().parent_id.is_none());
    }

    #[test]
    fn test_get_outer_html() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let p = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,1,P")
            .unwrap();

        agent.set_attribute(&mut arena, p, "class", "lead").unwrap();
        assert_eq!(
            agent.get_outer_html(&arena, p).unwrap(),
            r#"<p class="lead">text</p>"#
        );
        assert!(matches!(
            agent.get_outer_html(&arena, Handle::from_raw(4242).unwrap()),
            Err(InspectorError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_change_tag_name() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let body = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY")
            .unwrap();
        let p = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,1,P")
            .unwrap();
        agent.set_attribute(&mut arena, p, "class", "lead").unwrap();
        let old = agent.node_for_id(p).unwrap();
        let mut rx = agent.subscribe();

        let section = agent.change_tag_name(&mut arena, p, "section").unwrap();

        let node = agent.node_for_id(section).unwrap();
        assert_ne!(node, old);
        assert_eq!(
            agent.get_outer_html(&arena, section).unwrap(),
            r#"<section class="lead">text</section>"#
        );
        assert_eq!(agent.node_for_path(&arena, "0,HTML,1,BODY,1,SECTION").unwrap(), node);
        // The old element is detached but its handle still resolves
        assert_eq!(agent.node_for_id(p), Some(old));
        assert!(arena.get(old).unwrap().children_ids.is_empty());

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(
            events.first(),
            Some(InspectorEvent::ChildNodeInserted { parent, node, .. })
                if *parent == body && node.handle == section
        ));
        assert_eq!(
            events.last(),
            Some(&InspectorEvent::ChildNodeRemoved { parent: body, node: p })
        );
        agent.binder().assert_consistent();
    }

    #[test]
    fn test_change_tag_name_keeps_pushed_children_visible() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let body = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY")
            .unwrap();
        agent.get_child_nodes(&arena, body).unwrap();
        let mut rx = agent.subscribe();

        let main = agent.change_tag_name(&mut arena, body, "main").unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        match events.last() {
            Some(InspectorEvent::SetChildNodes { parent, nodes }) => {
                assert_eq!(*parent, main);
                let names: Vec<_> = nodes.iter().map(|n| n.node_name.as_str()).collect();
                assert_eq!(names, vec!["DIV", "P"]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        agent.binder().assert_consistent();
    }

    #[test]
    fn test_change_tag_name_rejects_bad_input() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let div = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,0,DIV")
            .unwrap();
        let root = agent.binder().document_map().handle(document).unwrap();

        assert!(matches!(
            agent.change_tag_name(&mut arena, div, "no spaces"),
            Err(InspectorError::Dom(DomError::InvalidName(_)))
        ));
        assert!(matches!(
            agent.change_tag_name(&mut arena, root, "html"),
            Err(InspectorError::Dom(DomError::InvalidNodeType { .. }))
        ));
        // Same name, nothing to do
        assert_eq!(agent.change_tag_name(&mut arena, div, "div").unwrap(), div);
    }

    #[test]
    fn test_editing_unknown_handle() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let stale = Handle::from_raw(4242).unwrap();

        assert!(matches!(
            agent.set_attribute(&mut arena, stale, "a", "b"),
            Err(InspectorError::NodeNotFound(h)) if h == stale
        ));
        assert!(matches!(
            agent.remove_node(&mut arena, stale),
            Err(InspectorError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_removing_document_root_is_rejected() {
        let (mut arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let root = agent.binder().document_map().handle(document).unwrap();

        assert!(matches!(
            agent.remove_node(&mut arena, root),
            Err(InspectorError::Dom(DomError::HierarchyRequest(_)))
        ));
    }

    #[test]
    fn test_breakpoint_commands() {
        let (arena, document) = page();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let body = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY")
            .unwrap();
        let div = agent
            .push_node_by_path_to_frontend(&arena, "0,HTML,1,BODY,0,DIV")
            .unwrap();

        agent
            .set_dom_breakpoint(&arena, body, DomBreakpointType::SubtreeModified)
            .unwrap();
        assert!(agent
            .has_breakpoint(div, DomBreakpointType::SubtreeModified)
            .unwrap());

        agent
            .remove_dom_breakpoint(&arena, body, DomBreakpointType::SubtreeModified)
            .unwrap();
        assert!(!agent
            .has_breakpoint(div, DomBreakpointType::SubtreeModified)
            .unwrap());
        assert!(agent.breakpoints().is_empty());
    }

    #[test]
    fn test_new_document_drops_search_and_breakpoints() {
        let (mut arena, document) = page();
        let other_document = arena.create_document();
        let mut agent = DomAgent::new();
        agent.set_document(&arena, Some(document));
        let html = agent.push_node_by_path_to_frontend(&arena, "0,HTML").unwrap();
        agent
            .set_dom_breakpoint(&arena, html, DomBreakpointType::NodeRemoved)
            .unwrap();
        agent.perform_search(&arena, "div", false);

        agent.set_document(&arena, Some(other_document));

        assert!(agent.breakpoints().is_empty());
        assert_eq!(agent.search().pending_jobs(), 0);
        assert!(!agent.search().timer().is_active());
        assert_eq!(agent.node_for_id(html), None);
    }
}
