//! Embed resolution: renders `tvembed` / `tvembedinline` nodes.
//!
//! Each embed is described to the renderer as a JSON parameter object:
//!
//! ```json
//! {
//!   "viewType": "embed",
//!   "id": "anchor", "class": "wide", "align": "center",
//!   "link": { "href": "...", "resourceType": "content-item", "resourceId": "12", ... },
//!   "linked": true,
//!   "config": { "size": "medium" },
//!   "dataAttributes": { "caption": "..." }
//! }
//! ```
//!
//! Only `viewType` is always present. The rendered fragment is attached as a
//! `tvpayload` child; the embed itself is never modified.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{ConversionContext, Converter, RenderInvoker, config_values, inside_template};
use crate::dom::{Document, NodeId};
use crate::namespace::{CUSTOM_ATTR, DOCBOOK, XHTML_ATTR, XLINK, XML, element};
use crate::reference::ResourceReference;
use crate::settings::EmbedSettings;

pub struct EmbedConverter {
    invoker: RenderInvoker,
    inline: bool,
    default_view: String,
}

impl EmbedConverter {
    /// Converter for block embeds (`tvembed`).
    pub fn block(invoker: RenderInvoker, settings: &EmbedSettings) -> Self {
        Self {
            invoker,
            inline: false,
            default_view: settings.default_view(false).to_string(),
        }
    }

    /// Converter for inline embeds (`tvembedinline`).
    pub fn inline(invoker: RenderInvoker, settings: &EmbedSettings) -> Self {
        Self {
            invoker,
            inline: true,
            default_view: settings.default_view(true).to_string(),
        }
    }

    fn element_name(&self) -> &'static str {
        if self.inline {
            element::EMBED_INLINE
        } else {
            element::EMBED
        }
    }

    /// Renderer parameters for one embed node.
    pub fn params(&self, doc: &Document, node: NodeId) -> Map<String, Value> {
        let mut params = Map::new();
        let Some(embed) = doc.element(node) else {
            return params;
        };

        let view_type = embed
            .attribute(None, "view")
            .filter(|v| !v.is_empty())
            .unwrap_or(self.default_view.as_str());
        params.insert("viewType".into(), view_type.into());

        for (key, namespace, local) in [
            ("id", XML, "id"),
            ("class", XHTML_ATTR, "class"),
            ("align", XHTML_ATTR, "align"),
        ] {
            if let Some(value) = embed.attribute(Some(namespace), local) {
                params.insert(key.into(), value.into());
            }
        }

        let links: Vec<NodeId> = doc
            .children_named(node, Some(DOCBOOK), element::EMBED_LINK)
            .collect();
        match links.as_slice() {
            [] => {}
            [link] => {
                params.insert("link".into(), Value::Object(link_params(doc, *link)));
            }
            _ => warn!(
                links = links.len(),
                "embed has more than one link wrapper, ignoring them"
            ),
        }

        if is_link_wrapped(doc, node) {
            params.insert("linked".into(), Value::Bool(true));
        }

        let config = config_values(doc, node);
        if !config.is_empty() {
            params.insert("config".into(), string_map(config));
        }

        let data: Vec<(String, String)> = embed
            .attributes
            .iter()
            .filter(|a| a.name.namespace.as_deref() == Some(CUSTOM_ATTR))
            .map(|a| (a.name.local.clone(), a.value.clone()))
            .collect();
        if !data.is_empty() {
            params.insert("dataAttributes".into(), string_map(data));
        }

        params
    }
}

impl Converter for EmbedConverter {
    fn name(&self) -> &str {
        if self.inline { "embed_inline" } else { "embed_block" }
    }

    fn convert(&self, mut doc: Document, _context: &ConversionContext<'_>) -> Document {
        let embeds: Vec<NodeId> = doc
            .find_all(Some(DOCBOOK), self.element_name())
            .into_iter()
            .filter(|node| !inside_template(&doc, *node))
            .collect();

        let mut rendered = 0;
        for node in &embeds {
            let Some(href) = doc
                .element(*node)
                .and_then(|e| e.attribute(Some(XLINK), "href"))
            else {
                warn!(element = self.element_name(), "embed without a reference, skipping");
                continue;
            };
            let reference = match ResourceReference::parse(href) {
                Ok(reference) => reference,
                Err(e) => {
                    warn!(href, error = %e, "unresolvable embed reference, skipping");
                    continue;
                }
            };

            let params = Value::Object(self.params(&doc, *node));
            let view_type = params
                .get("viewType")
                .and_then(Value::as_str)
                .unwrap_or(self.default_view.as_str())
                .to_string();
            if let Some(payload) = self
                .invoker
                .render_embed(&reference, &view_type, &params, self.inline)
            {
                RenderInvoker::append_payload(&mut doc, *node, &payload);
                rendered += 1;
            }
        }

        debug!(
            converter = self.name(),
            embeds = embeds.len(),
            rendered,
            "embeds resolved"
        );
        doc
    }
}

fn string_map<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Value {
    Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

fn link_params(doc: &Document, link: NodeId) -> Map<String, Value> {
    let mut params = Map::new();
    let Some(element) = doc.element(link) else {
        return params;
    };

    if let Some(href) = element.attribute(Some(XLINK), "href") {
        params.insert("href".into(), href.into());
        match ResourceReference::parse(href) {
            Ok(reference) if reference.is_internal() => {
                params.insert("resourceType".into(), reference.kind.as_str().into());
                params.insert("resourceId".into(), reference.id.clone().into());
                if let Some(fragment) = reference.fragment {
                    params.insert("resourceFragment".into(), fragment.into());
                }
            }
            Ok(_) => {}
            Err(e) => debug!(href, error = %e, "embed link is not a resource reference"),
        }
    }

    if element.attribute(Some(XLINK), "show") == Some("new") {
        params.insert("target".into(), "_blank".into());
    }
    for (key, namespace, local) in [
        ("title", XLINK, "title"),
        ("id", XML, "id"),
        ("class", XHTML_ATTR, "class"),
    ] {
        if let Some(value) = element.attribute(Some(namespace), local) {
            params.insert(key.into(), value.into());
        }
    }
    params
}

/// Whether an authored `link` surrounds the embed.
///
/// A `link` that is the immediate parent and holds nothing but the embed
/// (ignoring whitespace) is a structural wrapper, not an authored link.
fn is_link_wrapped(doc: &Document, node: NodeId) -> bool {
    let parent = doc.parent(node);
    doc.ancestors(node)
        .filter(|a| doc.is_element(*a, Some(DOCBOOK), element::LINK))
        .any(|link| {
            let structural = Some(link) == parent
                && doc
                    .children(link)
                    .iter()
                    .all(|c| *c == node || doc.is_whitespace(*c));
            !structural
        })
}
