//! Converter dispatcher - runs a pipeline's converters in weight order.

use std::sync::Arc;

use tracing::debug;

use super::{ConversionContext, ConverterRegistry, Pipeline};
use crate::dom::Document;
use crate::error::ConversionError;

/// Applies the converters of a named pipeline in sequence.
#[derive(Clone)]
pub struct ConverterDispatcher {
    registry: Arc<ConverterRegistry>,
}

impl ConverterDispatcher {
    /// Create a new dispatcher.
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self { registry }
    }

    /// Run the pipeline called `pipeline`.
    pub fn convert(&self, pipeline: &str, doc: Document) -> Result<Document, ConversionError> {
        let pipeline: Pipeline = pipeline.parse()?;
        Ok(self.run(pipeline, doc))
    }

    /// Run a pipeline over a top-level document.
    pub fn run(&self, pipeline: Pipeline, doc: Document) -> Document {
        self.run_at_depth(pipeline, doc, 0)
    }

    pub(crate) fn run_at_depth(&self, pipeline: Pipeline, doc: Document, depth: usize) -> Document {
        let handlers = self.registry.get_handlers(pipeline);
        if handlers.is_empty() {
            debug!(pipeline = %pipeline, "no converters registered for pipeline");
            return doc;
        }

        let context = ConversionContext::new(self, pipeline, depth);
        let doc = handlers
            .iter()
            .fold(doc, |doc, handler| handler.converter.convert(doc, &context));

        debug!(
            pipeline = %pipeline,
            converters = handlers.len(),
            depth,
            "conversion complete"
        );
        doc
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use crate::dom::{Element, QName};

    /// Appends a marker element named after itself.
    struct Mark(&'static str);

    impl Converter for Mark {
        fn name(&self) -> &str {
            self.0
        }

        fn convert(&self, mut doc: Document, _context: &ConversionContext<'_>) -> Document {
            let root = doc.root();
            doc.append_element(root, Element::new(QName::docbook(self.0)));
            doc
        }
    }

    /// Re-enters the pipeline until the depth guard is reached.
    struct Recurse;

    impl Converter for Recurse {
        fn name(&self) -> &str {
            "recurse"
        }

        fn convert(&self, mut doc: Document, context: &ConversionContext<'_>) -> Document {
            let root = doc.root();
            doc.append_text(root, &context.depth().to_string());
            if context.depth() < 3 {
                let nested = context.reenter(Document::empty_section());
                doc.import_subtree(root, &nested, nested.root());
            }
            doc
        }
    }

    fn marks(doc: &Document) -> Vec<String> {
        doc.children(doc.root())
            .iter()
            .filter_map(|c| doc.element(*c))
            .map(|e| e.local_name().to_string())
            .collect()
    }

    #[test]
    fn runs_converters_in_weight_order() {
        let registry = ConverterRegistry::new()
            .register(Pipeline::Output, 2, Arc::new(Mark("second")))
            .register(Pipeline::Output, 1, Arc::new(Mark("first")));
        let dispatcher = ConverterDispatcher::new(Arc::new(registry));

        let doc = dispatcher.convert("output", Document::empty_section()).unwrap();
        assert_eq!(marks(&doc), vec!["first", "second"]);
    }

    #[test]
    fn empty_pipeline_returns_document_unchanged() {
        let dispatcher = ConverterDispatcher::new(Arc::new(ConverterRegistry::new()));
        let doc = dispatcher.run(Pipeline::Edit, Document::empty_section());
        assert!(doc.children(doc.root()).is_empty());
    }

    #[test]
    fn unknown_pipeline_fails() {
        let dispatcher = ConverterDispatcher::new(Arc::new(ConverterRegistry::new()));
        let err = dispatcher
            .convert("preview", Document::empty_section())
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnknownPipeline { ref name, .. } if name == "preview"));
    }

    #[test]
    fn reentry_increments_depth() {
        let registry = ConverterRegistry::new().register(Pipeline::Output, 0, Arc::new(Recurse));
        let dispatcher = ConverterDispatcher::new(Arc::new(registry));
        let doc = dispatcher.run(Pipeline::Output, Document::empty_section());
        assert_eq!(doc.text_content(doc.root()), "0123");
    }
}
