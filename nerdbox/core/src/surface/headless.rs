//! Headless Document
//!
//! An in-memory element tree implementing [`Document`]. It backs the test
//! suite and the command-line driver, and serves as the reference for what
//! the lifecycle controller expects from a real DOM binding.
//!
//! # Thread Safety
//!
//! The tree lives behind a single `parking_lot::RwLock`. Every trait method
//! takes the lock for the duration of one operation only.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::markup::{self, MarkupNode};
use super::selector::{Combinator, Complex, Compound, Selector};
use super::{Document, ElementHandle};

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<u64>,
    children: Vec<u64>,
    hidden: bool,
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn class_list(&self) -> Vec<String> {
        self.attr("class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn set_class_list(&mut self, classes: &[String]) {
        if let NodeKind::Element { attrs, .. } = &mut self.kind {
            let joined = classes.join(" ");
            match attrs.iter_mut().find(|(key, _)| key == "class") {
                Some((_, value)) => *value = joined,
                None => attrs.push(("class".to_string(), joined)),
            }
        }
    }

    fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }
}

/// `style="display: none"` in any spacing or case
fn starts_hidden(attrs: &[(String, String)]) -> bool {
    attrs.iter().any(|(key, value)| {
        key == "style" && {
            let compact: String = value
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            compact.contains("display:none")
        }
    })
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    body: u64,
}

impl Tree {
    fn new() -> Self {
        let body = Node {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            hidden: false,
        };
        let mut nodes = HashMap::new();
        nodes.insert(0, body);
        Self {
            nodes,
            next_id: 1,
            body: 0,
        }
    }

    fn insert(&mut self, node: Node) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn element(&self, handle: ElementHandle) -> Option<&Node> {
        self.nodes
            .get(&handle.as_u64())
            .filter(|node| node.is_element())
    }

    fn element_mut(&mut self, handle: ElementHandle) -> Option<&mut Node> {
        self.nodes
            .get_mut(&handle.as_u64())
            .filter(|node| node.is_element())
    }

    /// Build `markup` nodes under `parent`, returning the new top-level ids
    fn build(&mut self, nodes: Vec<MarkupNode>, parent: Option<u64>) -> Vec<u64> {
        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            let id = match node {
                MarkupNode::Text(text) => self.insert(Node {
                    kind: NodeKind::Text(text),
                    parent,
                    children: Vec::new(),
                    hidden: false,
                }),
                MarkupNode::Element {
                    tag,
                    attrs,
                    children,
                } => {
                    let hidden = starts_hidden(&attrs);
                    let id = self.insert(Node {
                        kind: NodeKind::Element { tag, attrs },
                        parent,
                        children: Vec::new(),
                        hidden,
                    });
                    let child_ids = self.build(children, Some(id));
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.children = child_ids;
                    }
                    id
                }
            };
            ids.push(id);
        }
        ids
    }

    fn attach(&mut self, parent: u64, ids: &[u64]) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.parent = Some(parent);
            }
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.extend_from_slice(ids);
        }
    }

    fn detach(&mut self, id: u64) {
        let parent = self.nodes.get_mut(&id).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }
    }

    fn remove_subtree(&mut self, id: u64) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    fn remove_children(&mut self, id: u64) {
        let children = self
            .nodes
            .get_mut(&id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
    }

    fn deep_clone(&mut self, id: u64, parent: Option<u64>) -> Option<u64> {
        let original = self.nodes.get(&id)?.clone();
        let copy = self.insert(Node {
            kind: original.kind,
            parent,
            children: Vec::new(),
            hidden: original.hidden,
        });
        let children: Vec<u64> = original
            .children
            .iter()
            .filter_map(|child| self.deep_clone(*child, Some(copy)))
            .collect();
        if let Some(node) = self.nodes.get_mut(&copy) {
            node.children = children;
        }
        Some(copy)
    }

    fn serialize(&self, id: u64, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attribute(value));
                    out.push('"');
                }
                if markup::is_void(tag) {
                    out.push_str(" />");
                    return;
                }
                out.push('>');
                self.serialize_children(id, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn serialize_children(&self, id: u64, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            for child in &node.children {
                self.serialize(*child, out);
            }
        }
    }

    fn text(&self, id: u64, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            match &node.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => {
                    for child in &node.children {
                        self.text(*child, out);
                    }
                }
            }
        }
    }

    fn parent_element(&self, id: u64) -> Option<u64> {
        self.nodes.get(&id)?.parent
    }

    /// Attached elements in document order, body first
    fn attached_elements(&self) -> Vec<u64> {
        let mut order = Vec::new();
        let mut stack = vec![self.body];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                if node.is_element() {
                    order.push(id);
                    stack.extend(node.children.iter().rev());
                }
            }
        }
        order
    }

    fn is_attached(&self, id: u64) -> bool {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if candidate == self.body {
                return true;
            }
            current = self.parent_element(candidate);
        }
        false
    }

    fn matches_compound(&self, id: u64, compound: &Compound) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let NodeKind::Element { tag, .. } = &node.kind else {
            return false;
        };
        if compound.tag.as_deref().is_some_and(|wanted| wanted != tag) {
            return false;
        }
        if let Some(wanted) = &compound.id {
            if node.attr("id") != Some(wanted.as_str()) {
                return false;
            }
        }
        if !compound.classes.is_empty() {
            let classes = node.class_list();
            if !compound.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        true
    }

    fn matches_complex(&self, id: u64, compounds: &[Compound], combinators: &[Combinator]) -> bool {
        let Some((last, earlier)) = compounds.split_last() else {
            return false;
        };
        if !self.matches_compound(id, last) {
            return false;
        }
        let Some((combinator, earlier_combinators)) = combinators.split_last() else {
            return true;
        };
        match combinator {
            Combinator::Child => self
                .parent_element(id)
                .is_some_and(|parent| self.matches_complex(parent, earlier, earlier_combinators)),
            Combinator::Descendant => {
                let mut current = self.parent_element(id);
                while let Some(ancestor) = current {
                    if self.matches_complex(ancestor, earlier, earlier_combinators) {
                        return true;
                    }
                    current = self.parent_element(ancestor);
                }
                false
            }
        }
    }

    fn matches(&self, id: u64, selector: &Selector) -> bool {
        selector
            .alternatives
            .iter()
            .any(|Complex { compounds, combinators }| {
                self.matches_complex(id, compounds, combinators)
            })
    }
}

/// In-memory [`Document`]
///
/// # Example
///
/// ```
/// use nerdbox_core::surface::{Document, HeadlessDocument};
///
/// let document = HeadlessDocument::from_markup(r#"<div id="fragment">Nerdbox Content</div>"#);
/// let fragment = document.query_first("#fragment").unwrap();
/// assert_eq!(document.text_content(fragment).as_deref(), Some("Nerdbox Content"));
/// ```
#[derive(Debug)]
pub struct HeadlessDocument {
    tree: RwLock<Tree>,
}

impl Default for HeadlessDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDocument {
    /// Create an empty document (just a body)
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::new()),
        }
    }

    /// Create a document whose body contains `markup`
    #[must_use]
    pub fn from_markup(markup: &str) -> Self {
        let document = Self::new();
        document.load(markup);
        document
    }

    /// Append `markup` to the body
    pub fn load(&self, markup: &str) -> Vec<ElementHandle> {
        self.append_markup(self.body(), markup)
    }

    /// Serialized body content
    #[must_use]
    pub fn body_html(&self) -> String {
        self.inner_html(self.body()).unwrap_or_default()
    }

    /// Number of attached elements matching `selector`
    #[must_use]
    pub fn count(&self, selector: &str) -> usize {
        self.query(selector).len()
    }
}

impl Document for HeadlessDocument {
    fn body(&self) -> ElementHandle {
        ElementHandle::from_raw(self.tree.read().body)
    }

    fn query(&self, selector: &str) -> Vec<ElementHandle> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let tree = self.tree.read();
        tree.attached_elements()
            .into_iter()
            .filter(|id| tree.matches(*id, &selector))
            .map(ElementHandle::from_raw)
            .collect()
    }

    fn matches(&self, element: ElementHandle, selector: &str) -> bool {
        Selector::parse(selector)
            .is_some_and(|selector| self.tree.read().matches(element.as_u64(), &selector))
    }

    fn parent(&self, element: ElementHandle) -> Option<ElementHandle> {
        self.tree
            .read()
            .parent_element(element.as_u64())
            .map(ElementHandle::from_raw)
    }

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        self.tree
            .read()
            .element(element)
            .and_then(|node| node.attr(name))
            .map(str::to_string)
    }

    fn inner_html(&self, element: ElementHandle) -> Option<String> {
        let tree = self.tree.read();
        tree.element(element)?;
        let mut out = String::new();
        tree.serialize_children(element.as_u64(), &mut out);
        Some(out)
    }

    fn outer_html(&self, element: ElementHandle) -> Option<String> {
        let tree = self.tree.read();
        tree.element(element)?;
        let mut out = String::new();
        tree.serialize(element.as_u64(), &mut out);
        Some(out)
    }

    fn text_content(&self, element: ElementHandle) -> Option<String> {
        let tree = self.tree.read();
        tree.element(element)?;
        let mut out = String::new();
        tree.text(element.as_u64(), &mut out);
        Some(out)
    }

    fn set_inner_html(&self, element: ElementHandle, markup: &str) {
        let mut tree = self.tree.write();
        if tree.element(element).is_none() {
            return;
        }
        let id = element.as_u64();
        tree.remove_children(id);
        let children = tree.build(markup::parse(markup), Some(id));
        if let Some(node) = tree.nodes.get_mut(&id) {
            node.children = children;
        }
    }

    fn append_markup(&self, parent: ElementHandle, markup: &str) -> Vec<ElementHandle> {
        let mut tree = self.tree.write();
        if tree.element(parent).is_none() {
            return Vec::new();
        }
        let ids = tree.build(markup::parse(markup), None);
        tree.attach(parent.as_u64(), &ids);
        ids.into_iter()
            .filter(|id| tree.nodes.get(id).is_some_and(Node::is_element))
            .map(ElementHandle::from_raw)
            .collect()
    }

    fn append_element(&self, parent: ElementHandle, element: ElementHandle) {
        let mut tree = self.tree.write();
        if tree.element(parent).is_none() || tree.element(element).is_none() {
            return;
        }
        // Refuse to create a cycle
        let mut current = Some(parent.as_u64());
        while let Some(candidate) = current {
            if candidate == element.as_u64() {
                return;
            }
            current = tree.parent_element(candidate);
        }
        tree.detach(element.as_u64());
        tree.attach(parent.as_u64(), &[element.as_u64()]);
    }

    fn empty(&self, element: ElementHandle) {
        let mut tree = self.tree.write();
        if tree.element(element).is_some() {
            tree.remove_children(element.as_u64());
        }
    }

    fn classes(&self, element: ElementHandle) -> Vec<String> {
        self.tree
            .read()
            .element(element)
            .map(Node::class_list)
            .unwrap_or_default()
    }

    fn clear_classes(&self, element: ElementHandle) {
        if let Some(node) = self.tree.write().element_mut(element) {
            node.set_class_list(&[]);
        }
    }

    fn add_classes(&self, element: ElementHandle, classes: &[String]) {
        if let Some(node) = self.tree.write().element_mut(element) {
            let mut list = node.class_list();
            for class in classes {
                if !list.contains(class) {
                    list.push(class.clone());
                }
            }
            node.set_class_list(&list);
        }
    }

    fn remove_class(&self, element: ElementHandle, class: &str) {
        if let Some(node) = self.tree.write().element_mut(element) {
            let mut list = node.class_list();
            list.retain(|c| c != class);
            node.set_class_list(&list);
        }
    }

    fn clone_element(&self, element: ElementHandle) -> Option<ElementHandle> {
        let mut tree = self.tree.write();
        tree.element(element)?;
        tree.deep_clone(element.as_u64(), None)
            .map(ElementHandle::from_raw)
    }

    fn set_visible(&self, element: ElementHandle, visible: bool) {
        if let Some(node) = self.tree.write().element_mut(element) {
            node.hidden = !visible;
        }
    }

    fn is_visible(&self, element: ElementHandle) -> bool {
        let tree = self.tree.read();
        if tree.element(element).is_none() || !tree.is_attached(element.as_u64()) {
            return false;
        }
        let mut current = Some(element.as_u64());
        while let Some(id) = current {
            if tree.nodes.get(&id).is_some_and(|node| node.hidden) {
                return false;
            }
            current = tree.parent_element(id);
        }
        true
    }
}
