//! Namespace-qualified document tree.
//!
//! Documents are stored in an arena: every node lives in one vector and
//! refers to its parent and children by [`NodeId`]. A [`Document`] can only
//! be built around a root element, so a tree without a root cannot exist.
//!
//! Detached nodes stay in the arena but are unreachable from the root; all
//! traversals start at a node and follow child links.

mod serialize;

use crate::namespace;

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Qualified name of an element or attribute.
///
/// The prefix is kept for serialization fidelity; comparisons use the
/// resolved namespace URI and local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(namespace: Option<&str>, prefix: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }

    /// Name without prefix or namespace (plain attributes).
    pub fn local(local: &str) -> Self {
        Self::new(None, None, local)
    }

    /// Element in the structural namespace, using the default prefix.
    pub fn docbook(local: &str) -> Self {
        Self::new(Some(namespace::DOCBOOK), None, local)
    }

    /// Check namespace and local name.
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == namespace
    }

    /// The name as written in XML (`prefix:local`).
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// Attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Namespace declaration (`xmlns` / `xmlns:prefix`) written on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

/// Element payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub namespaces: Vec<NamespaceDecl>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style namespace declaration.
    pub fn with_namespace(mut self, prefix: Option<&str>, uri: &str) -> Self {
        self.namespaces.push(NamespaceDecl {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        });
        self
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    /// Look up an attribute value by namespace and local name.
    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.is(name.namespace.as_deref(), &name.local))
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }
}

/// Content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A rich text document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document around its root element.
    pub fn new(root: Element) -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Element(root),
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Minimal `section` document declaring the standard namespaces.
    pub fn empty_section() -> Self {
        Self::new(namespace::section_root())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    /// Whether the node is an element with the given namespace and local name.
    pub fn is_element(&self, id: NodeId, namespace: Option<&str>, local: &str) -> bool {
        self.element(id).is_some_and(|e| e.is(namespace, local))
    }

    /// Whether the node is a text node holding only whitespace.
    pub fn is_whitespace(&self, id: NodeId) -> bool {
        self.text(id).is_some_and(|t| t.trim().is_empty())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Child elements with the given namespace and local name.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        namespace: Option<&'a str>,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c, namespace, local))
    }

    /// Append a new element under `parent`.
    pub fn append_element(&mut self, parent: NodeId, element: Element) -> NodeId {
        self.push_child(parent, NodeData::Element(element))
    }

    /// Append text under `parent`, merging with a trailing text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return last;
            }
        }
        self.push_child(parent, NodeData::Text(text.to_string()))
    }

    fn push_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Unlink a node from its parent. The root cannot be detached.
    pub fn detach(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Move every child of `parent` into a new `element`, which becomes
    /// the only child of `parent`.
    pub fn wrap_children(&mut self, parent: NodeId, element: Element) -> NodeId {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        let wrapper = self.push_child(parent, NodeData::Element(element));
        for child in &children {
            self.nodes[child.0].parent = Some(wrapper);
        }
        self.nodes[wrapper.0].children = children;
        wrapper
    }

    /// Deep-copy `source_id` from `source` and append it under `parent`.
    pub fn import_subtree(&mut self, parent: NodeId, source: &Document, source_id: NodeId) -> NodeId {
        let copied = self.push_child(parent, source.data(source_id).clone());
        let mut pending = vec![(source_id, copied)];
        while let Some((from, to)) = pending.pop() {
            for &child in source.children(from) {
                let new_child = self.push_child(to, source.data(child).clone());
                pending.push((child, new_child));
            }
        }
        copied
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Concatenated text of a node and all of its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .filter_map(|d| self.text(d))
            .collect()
    }

    /// Elements anywhere below the root with the given name, in document order.
    pub fn find_all(&self, namespace: Option<&str>, local: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|d| self.is_element(*d, namespace, local))
            .collect()
    }
}

/// Pre-order traversal using an explicit stack.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Walk up the parent chain.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.parent(id);
        Some(id)
    }
}
