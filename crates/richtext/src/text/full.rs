use super::{TextExtractor, visible_text_nodes};
use crate::dom::Document;
use crate::node_filter::{NodeFilter, NodeFilterFactory};

/// Every visible text node, trimmed, each followed by a space.
pub struct FullTextExtractor {
    filter: Box<dyn NodeFilter>,
}

impl FullTextExtractor {
    pub fn new(filter: Box<dyn NodeFilter>) -> Self {
        Self { filter }
    }
}

impl Default for FullTextExtractor {
    fn default() -> Self {
        Self::new(Box::new(NodeFilterFactory::full_text_filter()))
    }
}

impl TextExtractor for FullTextExtractor {
    fn extract(&self, doc: &Document) -> String {
        let mut out = String::new();
        for text in visible_text_nodes(doc, doc.root(), self.filter.as_ref()) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push(' ');
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest;
    use crate::namespace::DOCBOOK;

    #[test]
    fn concatenates_in_document_order() {
        let doc = ingest::parse(&format!(
            "<section xmlns=\"{DOCBOOK}\"><title> Intro </title><para>First <emphasis>bold</emphasis> end</para></section>"
        ))
        .unwrap();
        assert_eq!(FullTextExtractor::default().extract(&doc), "Intro First bold end ");
    }

    #[test]
    fn skips_embed_config_and_payload() {
        let doc = ingest::parse(&format!(
            "<section xmlns=\"{DOCBOOK}\"><para>Body</para><tvembed><tvconfig><tvvalue key=\"size\">medium</tvvalue></tvconfig><tvpayload>rendered</tvpayload></tvembed></section>"
        ))
        .unwrap();
        assert_eq!(FullTextExtractor::default().extract(&doc), "Body ");
    }

    #[test]
    fn template_config_is_indexed() {
        let doc = ingest::parse(&format!(
            "<section xmlns=\"{DOCBOOK}\"><tvtemplate name=\"quote\"><tvconfig><tvvalue key=\"author\">Ada</tvvalue></tvconfig></tvtemplate></section>"
        ))
        .unwrap();
        assert_eq!(FullTextExtractor::default().extract(&doc), "Ada ");
    }

    #[test]
    fn extraction_is_idempotent() {
        let doc = ingest::parse(&format!("<section xmlns=\"{DOCBOOK}\"><para>a</para><para>b</para></section>"))
            .unwrap();
        let extractor = FullTextExtractor::default();
        assert_eq!(extractor.extract(&doc), extractor.extract(&doc));
    }
}
