//! Predicates that exclude subtrees from text extraction.

use crate::dom::{Document, NodeId};
use crate::namespace::element;

/// Decides whether a node (and its subtree) is filtered out.
pub trait NodeFilter: Send + Sync {
    fn matches(&self, doc: &Document, node: NodeId) -> bool;
}

/// Matches an element by its local name and the local names of its
/// nearest ancestors.
///
/// `path` runs outermost to innermost: `["tvembed", "tvconfig"]` matches a
/// `tvconfig` element whose parent is a `tvembed`.
#[derive(Debug, Clone)]
pub struct PathFilter {
    path: Vec<String>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(path: &[S]) -> Self {
        Self {
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

impl NodeFilter for PathFilter {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((last, outer)) = self.path.split_last() else {
            return false;
        };
        if doc.element(node).is_none_or(|e| e.local_name() != last) {
            return false;
        }

        let mut ancestors = doc.ancestors(node);
        outer.iter().rev().all(|expected| {
            ancestors
                .next()
                .and_then(|a| doc.element(a))
                .is_some_and(|e| e.local_name() == expected)
        })
    }
}

/// Logical OR over sub-filters. Empty aggregates match nothing.
#[derive(Default)]
pub struct AggregateFilter {
    filters: Vec<Box<dyn NodeFilter>>,
}

impl AggregateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: NodeFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl NodeFilter for AggregateFilter {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.filters.iter().any(|f| f.matches(doc, node))
    }
}

/// Builds the filters used by the text extractors.
pub struct NodeFilterFactory;

impl NodeFilterFactory {
    /// Path filter from tag names, outermost first.
    pub fn create_path_filter<S: AsRef<str>>(tags: &[S]) -> PathFilter {
        PathFilter::new(tags)
    }

    /// Embed configuration and rendered payloads are not document text.
    pub fn full_text_filter() -> AggregateFilter {
        AggregateFilter::new()
            .with(Self::create_path_filter(&[element::EMBED, element::CONFIG]))
            .with(Self::create_path_filter(&[element::EMBED_INLINE, element::CONFIG]))
            .with(Self::create_path_filter(&[element::PAYLOAD]))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dom::{Element, QName};

    fn embed_doc() -> (Document, NodeId, NodeId) {
        let mut doc = Document::empty_section();
        let root = doc.root();
        let embed = doc.append_element(root, Element::new(QName::docbook("tvembed")));
        let config = doc.append_element(embed, Element::new(QName::docbook("tvconfig")));
        let stray = doc.append_element(root, Element::new(QName::docbook("tvconfig")));
        (doc, config, stray)
    }

    #[test]
    fn path_requires_ancestors() {
        let (doc, config, stray) = embed_doc();
        let filter = NodeFilterFactory::create_path_filter(&["tvembed", "tvconfig"]);
        assert!(filter.matches(&doc, config));
        assert!(!filter.matches(&doc, stray));
    }

    #[test]
    fn single_tag_matches_anywhere() {
        let (doc, config, stray) = embed_doc();
        let filter = NodeFilterFactory::create_path_filter(&["tvconfig"]);
        assert!(filter.matches(&doc, config));
        assert!(filter.matches(&doc, stray));
    }

    #[test]
    fn empty_path_matches_nothing() {
        let (doc, config, _) = embed_doc();
        let filter = PathFilter::new::<&str>(&[]);
        assert!(!filter.matches(&doc, config));
    }

    #[test]
    fn aggregate_is_logical_or() {
        let (doc, config, stray) = embed_doc();
        let filter = AggregateFilter::new()
            .with(NodeFilterFactory::create_path_filter(&["tvembed", "tvconfig"]))
            .with(NodeFilterFactory::create_path_filter(&["section", "tvconfig"]));
        assert!(filter.matches(&doc, config));
        assert!(filter.matches(&doc, stray));
        assert!(!AggregateFilter::new().matches(&doc, config));
    }

    #[test]
    fn text_nodes_never_match() {
        let mut doc = Document::empty_section();
        let root = doc.root();
        let text = doc.append_text(root, "tvpayload");
        assert!(!NodeFilterFactory::full_text_filter().matches(&doc, text));
    }
}
