//! XML serialization with namespace repair.
//!
//! Declarations written in the tree are emitted as-is. Any prefix (or
//! default namespace) that a name needs but which is not in scope gets a
//! declaration on the element that uses it, so subtrees imported from other
//! documents and nodes created by converters always serialize qualified.

use quick_xml::escape::{escape, partial_escape};

use super::{Document, Element, NodeData, NodeId};
use crate::namespace::{XML, preferred_prefix};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

impl Document {
    /// Serialize the whole document, with an XML declaration and no doctype.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str(&self.node_to_xml(self.root()));
        out
    }

    /// Serialize one node and its subtree.
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut serializer = Serializer::new(self);
        serializer.write(id);
        serializer.out
    }

    /// Serialize the children of a node.
    pub fn inner_xml(&self, id: NodeId) -> String {
        let mut serializer = Serializer::new(self);
        for &child in self.children(id) {
            serializer.write(child);
        }
        serializer.out
    }
}

enum Step {
    Open(NodeId),
    Close(String),
}

struct Serializer<'a> {
    doc: &'a Document,
    out: String,
    scopes: Vec<Vec<(Option<String>, String)>>,
    generated: usize,
}

impl<'a> Serializer<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            out: String::new(),
            scopes: Vec::new(),
            generated: 0,
        }
    }

    fn write(&mut self, id: NodeId) {
        let doc = self.doc;
        let mut steps = vec![Step::Open(id)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Close(name) => {
                    self.out.push_str("</");
                    self.out.push_str(&name);
                    self.out.push('>');
                    self.scopes.pop();
                }
                Step::Open(node) => match doc.data(node) {
                    NodeData::Text(text) => self.out.push_str(&partial_escape(text.as_str())),
                    NodeData::Element(element) => {
                        let children = doc.children(node);
                        let name = self.open(element, children.is_empty());
                        if children.is_empty() {
                            self.scopes.pop();
                        } else {
                            steps.push(Step::Close(name));
                            steps.extend(children.iter().rev().map(|c| Step::Open(*c)));
                        }
                    }
                },
            }
        }
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Ensure `prefix` resolves to `uri` in the current scope.
    fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        if prefix == Some("xml") || self.lookup(prefix).unwrap_or("") == uri {
            return;
        }
        if prefix.is_some() && uri.is_empty() {
            // Prefixes cannot be undeclared in XML 1.0.
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    fn attribute_prefix(&mut self, prefix: Option<&str>, uri: &str) -> String {
        if let Some(prefix) = prefix {
            return prefix.to_string();
        }
        if let Some(prefix) = preferred_prefix(uri) {
            return prefix.to_string();
        }
        self.generated += 1;
        format!("ns{}", self.generated)
    }

    /// Write a start tag (or empty tag) and push its namespace scope.
    /// Returns the qualified name for the matching end tag.
    fn open(&mut self, element: &Element, empty: bool) -> String {
        let declared: Vec<(Option<String>, String)> = element
            .namespaces
            .iter()
            .map(|d| (d.prefix.clone(), d.uri.clone()))
            .collect();
        self.scopes.push(declared);

        let name = &element.name;
        self.bind(name.prefix.as_deref(), name.namespace.as_deref().unwrap_or(""));

        let mut attributes = Vec::with_capacity(element.attributes.len());
        for attribute in &element.attributes {
            let qualified = match attribute.name.namespace.as_deref() {
                Some(uri) => {
                    let prefix = self.attribute_prefix(attribute.name.prefix.as_deref(), uri);
                    self.bind(Some(&prefix), uri);
                    format!("{prefix}:{}", attribute.name.local)
                }
                None => attribute.name.local.clone(),
            };
            attributes.push((qualified, attribute.value.as_str()));
        }

        let qualified = name.qualified();
        self.out.push('<');
        self.out.push_str(&qualified);

        let scope = self.scopes.last().map(Vec::as_slice).unwrap_or(&[]);
        for (prefix, uri) in scope {
            match prefix {
                Some(prefix) => {
                    self.out.push_str(" xmlns:");
                    self.out.push_str(prefix);
                }
                None => self.out.push_str(" xmlns"),
            }
            self.out.push_str("=\"");
            self.out.push_str(&escape(uri.as_str()));
            self.out.push('"');
        }

        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(&key);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value));
            self.out.push('"');
        }

        self.out.push_str(if empty { "/>" } else { ">" });
        qualified
    }
}
