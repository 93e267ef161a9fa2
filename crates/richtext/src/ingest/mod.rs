//! Secure ingestion of untrusted rich text.
//!
//! [`SecureParser::parse`] defuses the raw text (see [`sanitize`]) and then
//! builds a namespace-aware [`Document`]. External entities, entity
//! expansion and active markup never reach the tree.

mod parser;
pub mod sanitize;

use tracing::{debug, warn};

use crate::dom::Document;
use crate::error::InvalidDocumentError;

/// Parser for untrusted XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureParser;

impl SecureParser {
    pub fn new() -> Self {
        Self
    }

    /// Sanitize and parse `raw`.
    ///
    /// Returns every diagnostic found when the input is not well-formed.
    pub fn parse(&self, raw: &str) -> Result<Document, InvalidDocumentError> {
        let sanitized = sanitize::sanitize(raw);
        let entities = sanitize::declared_entities(&sanitized);
        let body = sanitize::strip_doctype(&sanitized);
        debug!(
            input_len = raw.len(),
            sanitized_len = body.len(),
            entities = entities.len(),
            "parsing rich text"
        );
        parser::build_tree(&body, &entities).inspect_err(|e| {
            warn!(diagnostics = e.diagnostics.len(), error = %e, "rejected rich text document");
        })
    }
}

/// Shorthand for [`SecureParser::parse`].
pub fn parse(raw: &str) -> Result<Document, InvalidDocumentError> {
    SecureParser::new().parse(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::namespace::DOCBOOK;

    #[test]
    fn doctype_entities_are_usable() {
        let doc = parse(&format!(
            "<!DOCTYPE section [<!ENTITY nbsp \"&#160;\">]>\n<section xmlns=\"{DOCBOOK}\"><para>a&nbsp;b</para></section>"
        ))
        .unwrap();
        assert_eq!(doc.text_content(doc.root()), "a\u{a0}b");
    }

    #[test]
    fn external_entity_is_dropped() {
        let doc = parse(
            "<!DOCTYPE section [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]><section><para>&xxe;</para></section>",
        )
        .unwrap();
        assert_eq!(doc.text_content(doc.root()), "");
    }

    #[test]
    fn comments_never_reach_the_tree() {
        let doc = parse("<section><!-- secret --><para>x</para></section>").unwrap();
        assert!(!doc.to_xml().contains("secret"));
    }

    #[test]
    fn diagnostics_keep_original_line_numbers() {
        let err = parse("<!DOCTYPE section [\n<!ENTITY nbsp \"&#160;\">\n]>\n<section>\n<para></section>")
            .unwrap_err();
        assert_eq!(err.diagnostics[0].line, 5);
    }
}
