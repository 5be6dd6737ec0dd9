//! Nodes live in a generational arena: a [`NodeId`] stays valid until the node
//! is removed, after which it never resolves again, even if the slot is reused.

mod html;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr("class", class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) if *existing == value => false,
            Some((_, existing)) => {
                *existing = value;
                true
            }
            None => {
                self.attributes.push((name, value));
                true
            }
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        before != self.attributes.len()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|candidate| candidate == class)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    Markup(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            head: NodeId {
                index: 0,
                generation: 0,
            },
            body: NodeId {
                index: 0,
                generation: 0,
            },
            revision: 0,
        };
        document.root = document.create_element(Element::new("html"));
        document.head = document.create_element(Element::new("head"));
        document.body = document.create_element(Element::new("body"));
        document.append_child(document.root, document.head);
        document.append_child(document.root, document.body);
        document.revision = 0;
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.allocate(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Text(text.into()))
    }

    pub fn create_markup(&mut self, markup: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Markup(markup.into()))
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        self.revision += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            data: Some(data),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_ref()
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id)
            .map(|data| data.children.as_slice())
            .unwrap_or_default()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let changed = match self.data_mut(id).map(|data| &mut data.kind) {
            Some(NodeKind::Element(element)) => element.set_attr(name, value),
            _ => false,
        };
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let changed = match self.data_mut(id).map(|data| &mut data.kind) {
            Some(NodeKind::Element(element)) => element.remove_attr(name),
            _ => false,
        };
        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) || self.is_ancestor(child, parent) {
            return false;
        }
        self.detach(child);
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        self.revision += 1;
        true
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        if !self.contains(node) || self.is_ancestor(node, parent) {
            return false;
        }
        self.detach(node);
        let Some(data) = self.data_mut(parent) else {
            return false;
        };
        let position = data
            .children
            .iter()
            .position(|child| *child == reference)
            .map(|index| index + 1)
            .unwrap_or(data.children.len());
        data.children.insert(position, node);
        if let Some(data) = self.data_mut(node) {
            data.parent = Some(parent);
        }
        self.revision += 1;
        true
    }

    // Puts `new` where `old` was. `old` stays alive but detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        if old == new || !self.contains(new) || self.is_ancestor(new, parent) {
            return false;
        }
        self.detach(new);
        if let Some(data) = self.data_mut(parent) {
            if let Some(slot) = data.children.iter_mut().find(|child| **child == old) {
                *slot = new;
            }
        }
        if let Some(data) = self.data_mut(new) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(old) {
            data.parent = None;
        }
        self.revision += 1;
        true
    }

    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|child| *child != id);
        }
        if let Some(data) = self.data_mut(id) {
            data.parent = None;
        }
        self.revision += 1;
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.contains(id) || id == self.root {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let index = current.index as usize;
            let Some(data) = self.slots[index].data.take() else {
                continue;
            };
            stack.extend(data.children);
            self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
            self.free.push(current.index);
        }
        self.revision += 1;
        true
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let [only] = self.children(id) {
            if matches!(self.kind(*only), Some(NodeKind::Text(existing)) if existing == text) {
                return;
            }
        }
        self.clear_children(id);
        let node = self.create_text(text);
        self.append_child(id, node);
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeKind::Text(text)) = self.kind(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let Some(NodeKind::Text(text)) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants {
            document: self,
            stack,
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_ancestor(self.root, id)
    }

    pub fn first_child_element(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.element(*child).is_some_and(|element| element.is(tag)))
    }

    pub fn find_first(
        &self,
        root: NodeId,
        mut predicate: impl FnMut(NodeId, &Element) -> bool,
    ) -> Option<NodeId> {
        self.descendants(root).find(|node| {
            self.element(*node)
                .is_some_and(|element| predicate(*node, element))
        })
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        html::write_node(self, id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            html::write_node(self, *child, &mut out);
        }
        out
    }
}

pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.document.children(next).iter().rev().copied());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_block(document: &mut Document, parent: NodeId, text: &str) -> (NodeId, NodeId) {
        let pre = document.create_element(Element::new("pre"));
        let code = document.create_element(Element::new("code").with_class("language-json"));
        document.append_child(parent, pre);
        document.append_child(pre, code);
        document.set_text(code, text);
        (pre, code)
    }

    #[test]
    fn removed_ids_never_resolve_again() {
        let mut document = Document::new();
        let body = document.body();
        let (pre, code) = code_block(&mut document, body, "{}");

        assert!(document.remove(pre));
        assert!(!document.contains(pre));
        assert!(!document.contains(code));

        let reused = document.create_element(Element::new("div"));
        assert_ne!(reused, pre);
        assert_ne!(reused, code);
        assert!(!document.contains(pre));
    }

    #[test]
    fn replace_keeps_old_node_alive_but_detached() {
        let mut document = Document::new();
        let body = document.body();
        let (pre, _) = code_block(&mut document, body, "{}");
        let container = document.create_element(Element::new("div"));

        assert!(document.replace(pre, container));
        assert!(document.contains(pre));
        assert!(!document.is_attached(pre));
        assert!(document.is_attached(container));
        assert_eq!(document.children(body), &[container]);
    }

    #[test]
    fn insert_after_places_sibling_in_order() {
        let mut document = Document::new();
        let body = document.body();
        let first = document.create_element(Element::new("p"));
        let last = document.create_element(Element::new("p"));
        document.append_child(body, first);
        document.append_child(body, last);

        let middle = document.create_element(Element::new("div"));
        assert!(document.insert_after(first, middle));
        assert_eq!(document.children(body), &[first, middle, last]);
    }

    #[test]
    fn set_text_with_identical_content_is_not_a_mutation() {
        let mut document = Document::new();
        let body = document.body();
        let (_, code) = code_block(&mut document, body, "{\"a\": 1}");

        let before = document.revision();
        document.set_text(code, "{\"a\": 1}");
        assert_eq!(document.revision(), before);

        document.set_text(code, "{\"a\": 2}");
        assert!(document.revision() > before);
        assert_eq!(document.text_content(code), "{\"a\": 2}");
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let mut document = Document::new();
        let body = document.body();
        let (pre, code) = code_block(&mut document, body, "x");
        let after = document.create_element(Element::new("p"));
        document.append_child(body, after);

        let order: Vec<NodeId> = document
            .descendants(body)
            .filter(|node| document.element(*node).is_some())
            .collect();
        assert_eq!(order, vec![pre, code, after]);
    }

    #[test]
    fn append_child_refuses_cycles() {
        let mut document = Document::new();
        let body = document.body();
        let (pre, code) = code_block(&mut document, body, "x");

        assert!(!document.append_child(code, pre));
        assert_eq!(document.parent(code), Some(pre));
    }

    #[test]
    fn serializes_attributes_text_and_markup() {
        let mut document = Document::new();
        let body = document.body();
        let div = document.create_element(
            Element::new("div")
                .with_class("box")
                .with_attr("hidden", ""),
        );
        document.append_child(body, div);
        let text = document.create_text("a < b");
        document.append_child(div, text);
        let markup = document.create_markup("<b>raw</b>");
        document.append_child(div, markup);

        assert_eq!(
            document.outer_html(div),
            "<div class=\"box\" hidden>a &lt; b<b>raw</b></div>"
        );
    }

    #[test]
    fn style_text_is_written_raw_and_attributes_are_quoted() {
        let mut document = Document::new();
        let head = document.head();
        let style = document.create_element(Element::new("style").with_attr("title", "a \"b\""));
        document.append_child(head, style);
        document.set_text(style, ".tm-window > .tm-content { gap: 4px; }");

        assert_eq!(
            document.outer_html(style),
            "<style title=\"a &quot;b&quot;\">.tm-window > .tm-content { gap: 4px; }</style>"
        );
    }
}
