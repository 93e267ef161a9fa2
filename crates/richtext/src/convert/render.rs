//! Renderer capability and the invocation helper shared by the embed and
//! template converters.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::dom::{Document, Element, NodeId, QName};
use crate::namespace::{DOCBOOK, element};
use crate::reference::{ResourceKind, ResourceReference};

/// Produces HTML fragments for embeds and templates.
///
/// `Ok(None)` means "nothing to inject" and is not an error. Calls may
/// block; callers needing bounded latency enforce it in the implementation.
pub trait Renderer: Send + Sync {
    fn render_template(
        &self,
        name: &str,
        template_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>>;

    fn render_content_embed(
        &self,
        id: &str,
        view_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>>;

    fn render_location_embed(
        &self,
        id: &str,
        view_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> anyhow::Result<Option<String>>;
}

/// Calls the renderer and attaches its output as a payload child.
///
/// Renderer errors are logged and treated as "no output".
#[derive(Clone)]
pub struct RenderInvoker {
    renderer: Arc<dyn Renderer>,
}

impl RenderInvoker {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }

    pub fn render_template(
        &self,
        name: &str,
        template_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> Option<String> {
        match self
            .renderer
            .render_template(name, template_type, params, is_inline)
        {
            Ok(output) => output,
            Err(e) => {
                error!(template = %name, error = %e, "template rendering failed");
                None
            }
        }
    }

    /// Render an embed; opaque URLs have nothing to render.
    pub fn render_embed(
        &self,
        reference: &ResourceReference,
        view_type: &str,
        params: &Value,
        is_inline: bool,
    ) -> Option<String> {
        let result = match reference.kind {
            ResourceKind::ContentItem => {
                self.renderer
                    .render_content_embed(&reference.id, view_type, params, is_inline)
            }
            ResourceKind::Location => {
                self.renderer
                    .render_location_embed(&reference.id, view_type, params, is_inline)
            }
            ResourceKind::Url => {
                debug!(href = %reference, "embed points at an external URL, not rendering");
                return None;
            }
        };
        match result {
            Ok(output) => output,
            Err(e) => {
                error!(
                    reference = %reference,
                    view_type,
                    error = %e,
                    "embed rendering failed"
                );
                None
            }
        }
    }

    /// Attach `payload` to `node`, replacing any earlier payload.
    pub fn append_payload(doc: &mut Document, node: NodeId, payload: &str) {
        let existing: Vec<NodeId> = doc
            .children_named(node, Some(DOCBOOK), element::PAYLOAD)
            .collect();
        for old in existing {
            doc.detach(old);
        }
        let payload_node = doc.append_element(node, Element::new(QName::docbook(element::PAYLOAD)));
        doc.append_text(payload_node, payload);
    }
}
