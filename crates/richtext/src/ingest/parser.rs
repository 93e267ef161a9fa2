//! Tree construction from sanitized XML.
//!
//! The reader is run with end-name checking off so that mismatched and
//! unclosed elements can be reported together with every other problem in
//! one pass. Entity references resolve against the predefined XML entities
//! and the allow-listed declarations; anything else expands to nothing.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::NsReader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use tracing::debug;

use crate::dom::{Document, Element, NodeId, QName};
use crate::error::{Diagnostic, InvalidDocumentError};
use crate::namespace::XML;

/// Parse `input` into a [`Document`], collecting every diagnostic.
pub(crate) fn build_tree(
    input: &str,
    entities: &HashMap<String, String>,
) -> Result<Document, InvalidDocumentError> {
    let mut reader = NsReader::from_str(input);
    reader.config_mut().check_end_names = false;

    let mut builder = TreeBuilder::new(input);
    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = read_element(&reader, &start, entities, input, offset, &mut builder.diagnostics);
                builder.open(element, start.name().as_ref(), offset, false);
            }
            Ok(Event::Empty(start)) => {
                let element = read_element(&reader, &start, entities, input, offset, &mut builder.diagnostics);
                builder.open(element, start.name().as_ref(), offset, true);
            }
            Ok(Event::End(end)) => builder.close(end.name().as_ref(), offset),
            Ok(Event::Text(text)) => match text.unescape_with(|name| resolve_entity(entities, name)) {
                Ok(text) => builder.text(&text, offset),
                Err(e) => builder.report(offset, format!("invalid character data: {e}")),
            },
            Ok(Event::CData(cdata)) => {
                let bytes = cdata.into_inner();
                builder.text(&String::from_utf8_lossy(&bytes), offset);
            }
            Ok(Event::Eof) => break,
            // Declarations, processing instructions, comments and doctypes
            // carry nothing the tree keeps.
            Ok(_) => {}
            Err(e) => {
                let position = reader.error_position() as usize;
                builder.report(position, e.to_string());
                break;
            }
        }
    }
    builder.finish()
}

fn resolve_entity<'e>(entities: &'e HashMap<String, String>, name: &str) -> Option<&'e str> {
    resolve_predefined_entity(name)
        .or_else(|| entities.get(name).map(String::as_str))
        .or_else(|| {
            debug!(entity = name, "dropping reference to undeclared entity");
            Some("")
        })
}

fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn bound_namespace(
    resolved: ResolveResult<'_>,
    qualified: &[u8],
    input: &str,
    offset: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            diagnostics.push(Diagnostic::at_offset(
                input,
                offset,
                format!(
                    "namespace prefix '{}' is not bound (in '{}')",
                    utf8(&prefix),
                    utf8(qualified)
                ),
            ));
            None
        }
    }
}

/// Convert a start tag into an [`Element`] with resolved names.
fn read_element(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    entities: &HashMap<String, String>,
    input: &str,
    offset: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Element {
    let raw_name = start.name();
    let (resolved, local) = reader.resolve_element(raw_name);
    let namespace = bound_namespace(resolved, raw_name.as_ref(), input, offset, diagnostics);
    let prefix = raw_name.prefix().map(|p| utf8(p.as_ref()));
    let mut element = Element::new(QName {
        prefix,
        local: utf8(local.as_ref()),
        namespace,
    });

    for attribute in start.attributes() {
        let attribute = match attribute {
            Ok(attribute) => attribute,
            Err(e) => {
                diagnostics.push(Diagnostic::at_offset(
                    input,
                    offset,
                    format!("malformed attribute on <{}>: {e}", utf8(raw_name.as_ref())),
                ));
                break;
            }
        };
        let value = match attribute.unescape_value_with(|name| resolve_entity(entities, name)) {
            Ok(value) => value,
            Err(e) => {
                diagnostics.push(Diagnostic::at_offset(
                    input,
                    offset,
                    format!("invalid attribute value: {e}"),
                ));
                Cow::Borrowed("")
            }
        };

        let key = attribute.key;
        let raw_key = key.as_ref();
        if raw_key == b"xmlns" {
            element = element.with_namespace(None, &value);
            continue;
        }
        if let Some(declared) = raw_key.strip_prefix(b"xmlns:") {
            element = element.with_namespace(Some(&utf8(declared)), &value);
            continue;
        }

        let key_prefix = key.prefix().map(|p| utf8(p.as_ref()));
        let (resolved, local) = reader.resolve_attribute(key);
        let namespace = if key_prefix.as_deref() == Some("xml") {
            Some(XML.to_string())
        } else {
            bound_namespace(resolved, raw_key, input, offset, diagnostics)
        };
        element.set_attribute(
            QName {
                prefix: key_prefix,
                local: utf8(local.as_ref()),
                namespace,
            },
            value.into_owned(),
        );
    }
    element
}

struct Open {
    /// `None` when the subtree is being discarded.
    node: Option<NodeId>,
    name: Vec<u8>,
}

struct TreeBuilder<'a> {
    input: &'a str,
    doc: Option<Document>,
    stack: Vec<Open>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TreeBuilder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            doc: None,
            stack: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, offset: usize, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::at_offset(self.input, offset, message));
    }

    fn open(&mut self, element: Element, raw_name: &[u8], offset: usize, empty: bool) {
        let node = match (self.stack.last(), self.doc.as_mut()) {
            (Some(parent), Some(doc)) => parent.node.map(|p| doc.append_element(p, element)),
            (None, None) => {
                let doc = Document::new(element);
                let root = doc.root();
                self.doc = Some(doc);
                Some(root)
            }
            (None, Some(_)) => {
                self.report(
                    offset,
                    format!(
                        "extra content after the root element: <{}>",
                        utf8(raw_name)
                    ),
                );
                None
            }
            (Some(_), None) => None,
        };
        if !empty {
            self.stack.push(Open {
                node,
                name: raw_name.to_vec(),
            });
        }
    }

    fn close(&mut self, raw_name: &[u8], offset: usize) {
        let Some(position) = self.stack.iter().rposition(|open| open.name == raw_name) else {
            let expected = self
                .stack
                .last()
                .map(|open| format!(", expected </{}>", utf8(&open.name)))
                .unwrap_or_default();
            self.report(
                offset,
                format!("unexpected end tag </{}>{expected}", utf8(raw_name)),
            );
            return;
        };
        let unclosed: Vec<Open> = self.stack.drain(position + 1..).collect();
        for open in unclosed.iter().rev() {
            self.report(
                offset,
                format!(
                    "element <{}> is not closed before </{}>",
                    utf8(&open.name),
                    utf8(raw_name)
                ),
            );
        }
        self.stack.pop();
    }

    fn text(&mut self, text: &str, offset: usize) {
        match (self.stack.last(), self.doc.as_mut()) {
            (Some(open), Some(doc)) => {
                if let Some(parent) = open.node {
                    doc.append_text(parent, text);
                }
            }
            _ => {
                if !text.trim().is_empty() {
                    self.report(offset, "text outside the root element");
                }
            }
        }
    }

    fn finish(mut self) -> Result<Document, InvalidDocumentError> {
        let end = self.input.len();
        let unclosed: Vec<Open> = std::mem::take(&mut self.stack);
        for open in unclosed.iter().rev() {
            self.report(
                end,
                format!("element <{}> is not closed", utf8(&open.name)),
            );
        }
        match self.doc {
            Some(doc) if self.diagnostics.is_empty() => Ok(doc),
            Some(_) => Err(InvalidDocumentError::new(self.diagnostics)),
            None => {
                if self.diagnostics.is_empty() {
                    self.report(end, "document has no root element");
                }
                Err(InvalidDocumentError::new(self.diagnostics))
            }
        }
    }
}
