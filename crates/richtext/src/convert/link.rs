//! Link resolution for display: `content-item://` and `location://` hrefs
//! become real URLs.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{ConversionContext, Converter};
use crate::dom::{Document, NodeId};
use crate::error::ReferenceError;
use crate::namespace::{self, DOCBOOK, XLINK, element};
use crate::reference::{ResourceKind, ResourceReference};

/// Href written when an internal reference cannot be resolved.
pub const UNRESOLVED_HREF: &str = "#";

/// Maps internal references to URLs.
pub trait LinkResolver: Send + Sync {
    fn content_url(&self, id: &str) -> anyhow::Result<Option<String>>;

    fn location_url(&self, id: &str) -> anyhow::Result<Option<String>>;
}

pub struct LinkConverter {
    resolver: Arc<dyn LinkResolver>,
}

impl LinkConverter {
    pub fn new(resolver: Arc<dyn LinkResolver>) -> Self {
        Self { resolver }
    }

    /// New href for an internal reference, or `None` to leave it alone.
    fn resolve(&self, href: &str) -> Option<String> {
        let reference = match ResourceReference::parse(href) {
            Ok(reference) => reference,
            Err(ReferenceError::MissingIdentifier { .. }) => {
                warn!(href, "link reference has no identifier");
                return Some(UNRESOLVED_HREF.to_string());
            }
            Err(e) => {
                debug!(href, error = %e, "leaving non-reference link as is");
                return None;
            }
        };

        let resolved = match reference.kind {
            ResourceKind::ContentItem => self.resolver.content_url(&reference.id),
            ResourceKind::Location => self.resolver.location_url(&reference.id),
            ResourceKind::Url => return None,
        };
        match resolved {
            Ok(Some(url)) => Some(reference.with_fragment(&url)),
            Ok(None) => {
                warn!(reference = %reference, "link target not found");
                Some(UNRESOLVED_HREF.to_string())
            }
            Err(e) => {
                error!(reference = %reference, error = %e, "link resolution failed");
                Some(UNRESOLVED_HREF.to_string())
            }
        }
    }
}

impl Converter for LinkConverter {
    fn name(&self) -> &str {
        "link"
    }

    fn convert(&self, mut doc: Document, _context: &ConversionContext<'_>) -> Document {
        let links: Vec<NodeId> = doc.find_all(Some(DOCBOOK), element::LINK);
        let mut rewritten = 0;
        for node in links {
            let Some(href) = doc
                .element(node)
                .and_then(|e| e.attribute(Some(XLINK), "href"))
            else {
                continue;
            };
            let Some(url) = self.resolve(href) else {
                continue;
            };
            if let Some(link) = doc.element_mut(node) {
                link.set_attribute(namespace::xlink("href"), url);
                rewritten += 1;
            }
        }
        debug!(rewritten, "links resolved");
        doc
    }
}
