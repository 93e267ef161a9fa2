use tracing::debug;

use super::{ConversionContext, Converter};
use crate::dom::Document;
use crate::namespace::{DOCBOOK, element};

/// Removes rendered payloads so they are never stored or edited.
pub struct PayloadStripConverter;

impl Converter for PayloadStripConverter {
    fn name(&self) -> &str {
        "payload_strip"
    }

    fn convert(&self, mut doc: Document, _context: &ConversionContext<'_>) -> Document {
        let payloads = doc.find_all(Some(DOCBOOK), element::PAYLOAD);
        if !payloads.is_empty() {
            debug!(payloads = payloads.len(), "stripping rendered payloads");
        }
        for payload in payloads {
            doc.detach(payload);
        }
        doc
    }
}
