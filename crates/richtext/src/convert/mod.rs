//! Tree-to-tree converters composed into named pipelines.
//!
//! - `input`: applied on ingestion, before storage
//! - `edit`: prepares a stored document for the editor
//! - `output`: resolves links, embeds and templates for display
//!
//! Converters never fail. Problems with a single node are logged and that
//! node is left as it was, so one bad embed cannot break a document.

pub mod attribute_mapper;
mod dispatcher;
mod embed;
mod link;
mod payload;
mod registry;
mod render;
mod template;

use std::fmt;
use std::str::FromStr;

pub use attribute_mapper::AttributeTypeMapper;
pub use dispatcher::ConverterDispatcher;
pub use embed::EmbedConverter;
pub use link::{LinkConverter, LinkResolver};
pub use payload::PayloadStripConverter;
pub use registry::{ConverterHandler, ConverterRegistry};
pub use render::{RenderInvoker, Renderer};
pub use template::{TemplateConverter, TemplateType};

use indexmap::IndexMap;
use tracing::warn;

use crate::dom::{Document, NodeId};
use crate::error::ConversionError;
use crate::namespace::{DOCBOOK, element};

/// Deepest template nesting that is still rendered.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Named conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    Input,
    Edit,
    Output,
}

impl Pipeline {
    pub const ALL: [Pipeline; 3] = [Pipeline::Edit, Pipeline::Input, Pipeline::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Edit => "edit",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pipeline {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConversionError::UnknownPipeline {
                name: s.to_string(),
                known: Self::ALL.map(Pipeline::as_str).join(", "),
            })
    }
}

/// A single tree transform.
pub trait Converter: Send + Sync {
    /// Converter name for logging.
    fn name(&self) -> &str;

    fn convert(&self, doc: Document, context: &ConversionContext<'_>) -> Document;
}

/// State of the running pipeline, handed to every converter.
pub struct ConversionContext<'a> {
    dispatcher: &'a ConverterDispatcher,
    pipeline: Pipeline,
    depth: usize,
}

impl<'a> ConversionContext<'a> {
    pub(crate) fn new(dispatcher: &'a ConverterDispatcher, pipeline: Pipeline, depth: usize) -> Self {
        Self {
            dispatcher,
            pipeline,
            depth,
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Nesting depth; 0 for the top-level document.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run the current pipeline over a nested document, one level deeper.
    pub fn reenter(&self, doc: Document) -> Document {
        self.dispatcher
            .run_at_depth(self.pipeline, doc, self.depth + 1)
    }
}

/// Key/value pairs of the `tvconfig` child of `node`, in document order.
pub(crate) fn config_values(doc: &Document, node: NodeId) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    for config in doc.children_named(node, Some(DOCBOOK), element::CONFIG) {
        for value in doc.children_named(config, Some(DOCBOOK), element::VALUE) {
            let Some(key) = doc.element(value).and_then(|e| e.attribute(None, "key")) else {
                warn!("ignoring configuration value without a key");
                continue;
            };
            values.insert(key.to_string(), doc.text_content(value));
        }
    }
    values
}

/// Whether `node` sits inside a template invocation.
pub(crate) fn inside_template(doc: &Document, node: NodeId) -> bool {
    doc.ancestors(node).any(|a| {
        doc.is_element(a, Some(DOCBOOK), element::TEMPLATE)
            || doc.is_element(a, Some(DOCBOOK), element::TEMPLATE_INLINE)
    })
}
