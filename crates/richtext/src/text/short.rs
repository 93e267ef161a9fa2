use super::{TextExtractor, visible_text_nodes};
use crate::dom::{Document, NodeId};
use crate::node_filter::{NodeFilter, NodeFilterFactory};

pub const SHORT_TEXT_MAX_CHARS: usize = 255;

/// First non-empty line of the first text-bearing node in the document's
/// leading block.
pub struct ShortTextExtractor {
    filter: Box<dyn NodeFilter>,
}

impl ShortTextExtractor {
    pub fn new(filter: Box<dyn NodeFilter>) -> Self {
        Self { filter }
    }

    /// First text node under `node` that has something besides whitespace.
    fn first_text<'a>(&'a self, doc: &'a Document, node: NodeId) -> Option<&'a str> {
        visible_text_nodes(doc, node, self.filter.as_ref()).find(|text| !text.trim().is_empty())
    }

    /// Leading block: the root's first child that is not blank text.
    fn leading_text<'a>(&'a self, doc: &'a Document) -> Option<&'a str> {
        let first = doc
            .children(doc.root())
            .iter()
            .copied()
            .find(|c| !doc.is_whitespace(*c))?;
        self.first_text(doc, first)
    }
}

impl Default for ShortTextExtractor {
    fn default() -> Self {
        Self::new(Box::new(NodeFilterFactory::full_text_filter()))
    }
}

impl TextExtractor for ShortTextExtractor {
    fn extract(&self, doc: &Document) -> String {
        let Some(text) = self
            .leading_text(doc)
            .or_else(|| self.first_text(doc, doc.root()))
        else {
            return String::new();
        };

        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.chars().take(SHORT_TEXT_MAX_CHARS).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest;
    use crate::namespace::DOCBOOK;

    fn extract(body: &str) -> String {
        let doc = ingest::parse(&format!("<section xmlns=\"{DOCBOOK}\">{body}</section>")).unwrap();
        ShortTextExtractor::default().extract(&doc)
    }

    #[test]
    fn first_line_of_first_paragraph() {
        assert_eq!(
            extract("\n  <para>Welcome to Example\nMore text</para><para>Second</para>"),
            "Welcome to Example"
        );
    }

    #[test]
    fn skips_leading_blank_lines() {
        assert_eq!(extract("<para>\n\n   Hello  \nworld</para>"), "Hello");
    }

    #[test]
    fn stops_at_first_text_descendant() {
        assert_eq!(extract("<para>Hello <emphasis>world</emphasis></para>"), "Hello");
        assert_eq!(
            extract("<para><emphasis>Bold</emphasis> start</para>"),
            "Bold"
        );
    }

    #[test]
    fn falls_back_to_whole_document() {
        assert_eq!(
            extract("<tvembed><tvconfig><tvvalue key=\"a\">x</tvvalue></tvconfig></tvembed><para>Later</para>"),
            "Later"
        );
    }

    #[test]
    fn truncates_long_lines() {
        let long = "x".repeat(300);
        assert_eq!(extract(&format!("<para>{long}</para>")).chars().count(), SHORT_TEXT_MAX_CHARS);
    }

    #[test]
    fn empty_document_gives_empty_string() {
        assert_eq!(extract(""), "");
        assert_eq!(extract("<para>   </para>"), "");
    }
}
