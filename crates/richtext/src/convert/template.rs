//! Template resolution: renders `tvtemplate` / `tvtemplateinline` nodes.
//!
//! Only outermost invocations are handled directly. Nested content is
//! copied into a fresh document and run through the current pipeline again,
//! which resolves inner templates and embeds. The result reaches the
//! renderer as the `content` parameter; the stored `tvcontent` is left as
//! authored, so only the invocation's payload is added to the tree.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    AttributeTypeMapper, ConversionContext, Converter, MAX_NESTING_DEPTH, RenderInvoker,
    config_values, inside_template,
};
use crate::dom::{Document, Element, NodeId, QName};
use crate::namespace::{DOCBOOK, element};

/// How a template applies to its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateType {
    /// Custom style: decorates its content.
    Style,
    /// Custom tag: stands alone (default).
    Tag,
}

impl TemplateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Tag => "tag",
        }
    }

    fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("style") => Self::Style,
            None | Some("tag") => Self::Tag,
            Some(other) => {
                warn!(template_type = other, "unknown template type, treating as tag");
                Self::Tag
            }
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TemplateConverter {
    invoker: RenderInvoker,
    mapper: Arc<AttributeTypeMapper>,
}

impl TemplateConverter {
    pub fn new(invoker: RenderInvoker, mapper: Arc<AttributeTypeMapper>) -> Self {
        Self { invoker, mapper }
    }

    fn resolve(&self, doc: &mut Document, node: NodeId, context: &ConversionContext<'_>) -> bool {
        let Some(invocation) = doc.element(node) else {
            return false;
        };
        let is_inline = invocation.local_name() == element::TEMPLATE_INLINE;
        let Some(name) = invocation
            .attribute(None, "name")
            .filter(|n| !n.is_empty())
            .map(str::to_string)
        else {
            warn!("template invocation without a name, skipping");
            return false;
        };
        let template_type = TemplateType::from_attribute(invocation.attribute(None, "type"));

        let raw_params = config_values(doc, node);
        let mut params = Map::new();
        params.insert("name".into(), name.clone().into());
        params.insert("type".into(), template_type.as_str().into());
        params.insert(
            "params".into(),
            Value::Object(self.mapper.map_params(&name, &raw_params)),
        );

        let content_node = doc
            .children_named(node, Some(DOCBOOK), element::CONTENT)
            .next();
        if let Some(content_node) = content_node {
            let converted = convert_content(doc, content_node, context);
            params.insert(
                "content".into(),
                converted.inner_xml(converted.root()).into(),
            );
        }

        let params = Value::Object(params);
        match self
            .invoker
            .render_template(&name, template_type.as_str(), &params, is_inline)
        {
            Some(payload) => {
                RenderInvoker::append_payload(doc, node, &payload);
                true
            }
            None => {
                debug!(template = %name, "renderer returned nothing for template");
                false
            }
        }
    }
}

impl Converter for TemplateConverter {
    fn name(&self) -> &str {
        "template"
    }

    fn convert(&self, mut doc: Document, context: &ConversionContext<'_>) -> Document {
        let invocations: Vec<NodeId> = doc
            .descendants(doc.root())
            .filter(|node| {
                doc.is_element(*node, Some(DOCBOOK), element::TEMPLATE)
                    || doc.is_element(*node, Some(DOCBOOK), element::TEMPLATE_INLINE)
            })
            .filter(|node| !inside_template(&doc, *node))
            .collect();
        if invocations.is_empty() {
            return doc;
        }
        if context.depth() >= MAX_NESTING_DEPTH {
            warn!(
                depth = context.depth(),
                invocations = invocations.len(),
                "template nesting too deep, leaving templates unresolved"
            );
            return doc;
        }

        let mut rendered = 0;
        for node in &invocations {
            if self.resolve(&mut doc, *node, context) {
                rendered += 1;
            }
        }
        debug!(
            depth = context.depth(),
            templates = invocations.len(),
            rendered,
            "templates resolved"
        );
        doc
    }
}

/// Run the content of a `tvcontent` node through the current pipeline.
fn convert_content(doc: &Document, content_node: NodeId, context: &ConversionContext<'_>) -> Document {
    let mut nested = Document::empty_section();
    let root = nested.root();
    for &child in doc.children(content_node) {
        nested.import_subtree(root, doc, child);
    }

    let mut converted = context.reenter(nested);
    wrap_line_breaks(&mut converted);
    converted
}

/// Preserve authored line breaks in plain text content.
///
/// Applies only when the content is bare text; block children are left
/// alone since `literallayout` may not contain them.
fn wrap_line_breaks(doc: &mut Document) {
    let root = doc.root();
    let children = doc.children(root);
    let text_only = !children.is_empty() && children.iter().all(|n| doc.text(*n).is_some());
    let has_breaks = children
        .iter()
        .filter_map(|n| doc.text(*n))
        .any(|t| t.trim().contains('\n'));
    if text_only && has_breaks {
        doc.wrap_children(
            root,
            Element::new(QName::docbook(element::LITERAL_LAYOUT))
                .with_attribute(QName::local("class"), "normal"),
        );
    }
}
