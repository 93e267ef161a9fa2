//! Plain text extraction for search indexing and summaries.

mod full;
mod short;

pub use full::FullTextExtractor;
pub use short::{SHORT_TEXT_MAX_CHARS, ShortTextExtractor};

use crate::dom::{Document, NodeId};
use crate::node_filter::NodeFilter;

/// Produces plain text from a document.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, doc: &Document) -> String;
}

/// Text nodes below `node` in document order, skipping filtered subtrees.
pub(crate) fn visible_text_nodes<'a>(
    doc: &'a Document,
    node: NodeId,
    filter: &'a dyn NodeFilter,
) -> impl Iterator<Item = &'a str> + 'a {
    let mut stack = vec![node];
    std::iter::from_fn(move || {
        while let Some(id) = stack.pop() {
            if filter.matches(doc, id) {
                continue;
            }
            if let Some(text) = doc.text(id) {
                return Some(text);
            }
            stack.extend(doc.children(id).iter().rev().copied());
        }
        None
    })
}
