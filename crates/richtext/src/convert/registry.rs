//! Converter registry - indexes which converters run in which pipeline.
//!
//! Converters are sorted by weight (lower = runs first). The registry is
//! built once and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    AttributeTypeMapper, Converter, EmbedConverter, LinkConverter, LinkResolver,
    PayloadStripConverter, Pipeline, RenderInvoker, Renderer, TemplateConverter,
};
use crate::settings::Settings;

/// Weights of the standard converters.
pub mod weight {
    pub const PAYLOAD_STRIP: i32 = -100;
    pub const LINK: i32 = 0;
    pub const EMBED_BLOCK: i32 = 10;
    pub const EMBED_INLINE: i32 = 20;
    pub const TEMPLATE: i32 = 30;
}

/// A registered converter with its ordering weight.
#[derive(Clone)]
pub struct ConverterHandler {
    pub converter: Arc<dyn Converter>,
    /// Weight for ordering (lower = runs first).
    pub weight: i32,
}

/// Registry mapping pipelines to ordered converters.
#[derive(Default)]
pub struct ConverterRegistry {
    handlers: HashMap<Pipeline, Vec<ConverterHandler>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for a pipeline.
    ///
    /// Converters with equal weight run in registration order.
    pub fn register(mut self, pipeline: Pipeline, weight: i32, converter: Arc<dyn Converter>) -> Self {
        let handlers = self.handlers.entry(pipeline).or_default();
        handlers.push(ConverterHandler { converter, weight });
        handlers.sort_by_key(|h| h.weight);
        self
    }

    /// The standard pipelines.
    ///
    /// Without a renderer the `output` pipeline only resolves links, and
    /// only when a link resolver is given.
    pub fn standard(
        settings: &Settings,
        renderer: Option<Arc<dyn Renderer>>,
        link_resolver: Option<Arc<dyn LinkResolver>>,
    ) -> Self {
        let strip: Arc<dyn Converter> = Arc::new(PayloadStripConverter);
        let mut registry = Self::new()
            .register(Pipeline::Input, weight::PAYLOAD_STRIP, Arc::clone(&strip))
            .register(Pipeline::Edit, weight::PAYLOAD_STRIP, strip);

        if let Some(resolver) = link_resolver {
            registry = registry.register(
                Pipeline::Output,
                weight::LINK,
                Arc::new(LinkConverter::new(resolver)),
            );
        }

        if let Some(renderer) = renderer {
            let invoker = RenderInvoker::new(renderer);
            let mapper = Arc::new(AttributeTypeMapper::new(settings.templates.clone()));
            registry = registry
                .register(
                    Pipeline::Output,
                    weight::EMBED_BLOCK,
                    Arc::new(EmbedConverter::block(invoker.clone(), &settings.embed)),
                )
                .register(
                    Pipeline::Output,
                    weight::EMBED_INLINE,
                    Arc::new(EmbedConverter::inline(invoker.clone(), &settings.embed)),
                )
                .register(
                    Pipeline::Output,
                    weight::TEMPLATE,
                    Arc::new(TemplateConverter::new(invoker, mapper)),
                );
        }

        registry
    }

    /// Get converters for a pipeline, in weight order.
    ///
    /// Returns an empty slice if nothing is registered.
    pub fn get_handlers(&self, pipeline: Pipeline) -> &[ConverterHandler] {
        self.handlers
            .get(&pipeline)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get the count of converters for a pipeline.
    pub fn handler_count(&self, pipeline: Pipeline) -> usize {
        self.get_handlers(pipeline).len()
    }

    /// Converter names for a pipeline, in execution order.
    pub fn converter_names(&self, pipeline: Pipeline) -> Vec<&str> {
        self.get_handlers(pipeline)
            .iter()
            .map(|h| h.converter.name())
            .collect()
    }
}
