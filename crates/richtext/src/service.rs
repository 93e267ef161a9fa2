//! Rich text field service.
//!
//! Ties ingestion, the converter pipelines and text extraction together for
//! one field configuration.

use std::sync::Arc;

use tracing::debug;

use crate::convert::{ConverterDispatcher, ConverterRegistry, LinkResolver, Pipeline, Renderer};
use crate::dom::Document;
use crate::error::{InvalidDocumentError, ValidationError};
use crate::ingest::SecureParser;
use crate::normalizer::NormalizerChain;
use crate::settings::Settings;
use crate::text::{FullTextExtractor, ShortTextExtractor, TextExtractor};

/// External document validator (schema checks and the like).
pub trait Validator: Send + Sync {
    fn validate(&self, doc: &Document) -> Vec<ValidationError>;
}

/// Rich text service, cheap to clone.
#[derive(Clone)]
pub struct RichTextService {
    inner: Arc<RichTextServiceInner>,
}

struct RichTextServiceInner {
    normalizers: NormalizerChain,
    parser: SecureParser,
    dispatcher: ConverterDispatcher,
    validators: Vec<Arc<dyn Validator>>,
    full_text: FullTextExtractor,
    short_text: ShortTextExtractor,
}

impl RichTextService {
    /// Service with the standard pipelines and no renderer.
    pub fn new(settings: &Settings) -> Self {
        Self::builder(settings.clone()).build()
    }

    pub fn builder(settings: Settings) -> RichTextServiceBuilder {
        RichTextServiceBuilder {
            settings,
            renderer: None,
            link_resolver: None,
            validators: Vec::new(),
        }
    }

    /// Normalize, securely parse and run the `input` pipeline.
    pub fn ingest(&self, raw: &str) -> Result<Document, InvalidDocumentError> {
        let normalized = self.inner.normalizers.process(raw);
        let doc = self.inner.parser.parse(&normalized)?;
        Ok(self.inner.dispatcher.run(Pipeline::Input, doc))
    }

    /// Authoring-time validation: ingestion diagnostics first, then the
    /// messages of every registered validator. Empty means valid.
    pub fn validate(&self, raw: &str) -> Vec<ValidationError> {
        let doc = match self.ingest(raw) {
            Ok(doc) => doc,
            Err(e) => {
                return e.diagnostics.into_iter().map(ValidationError::from).collect();
            }
        };

        let errors: Vec<ValidationError> = self
            .inner
            .validators
            .iter()
            .flat_map(|validator| validator.validate(&doc))
            .collect();
        debug!(
            validators = self.inner.validators.len(),
            errors = errors.len(),
            "rich text validated"
        );
        errors
    }

    /// Edit form: rendered payloads removed.
    pub fn to_edit(&self, doc: Document) -> Document {
        self.inner.dispatcher.run(Pipeline::Edit, doc)
    }

    /// Display form: links, embeds and templates resolved.
    pub fn to_display(&self, doc: Document) -> Document {
        self.inner.dispatcher.run(Pipeline::Output, doc)
    }

    pub fn full_text(&self, doc: &Document) -> String {
        self.inner.full_text.extract(doc)
    }

    pub fn short_text(&self, doc: &Document) -> String {
        self.inner.short_text.extract(doc)
    }

    pub fn dispatcher(&self) -> &ConverterDispatcher {
        &self.inner.dispatcher
    }
}

/// Builder for [`RichTextService`].
pub struct RichTextServiceBuilder {
    settings: Settings,
    renderer: Option<Arc<dyn Renderer>>,
    link_resolver: Option<Arc<dyn LinkResolver>>,
    validators: Vec<Arc<dyn Validator>>,
}

impl RichTextServiceBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.link_resolver = Some(resolver);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn build(self) -> RichTextService {
        let registry =
            ConverterRegistry::standard(&self.settings, self.renderer, self.link_resolver);
        RichTextService {
            inner: Arc::new(RichTextServiceInner {
                normalizers: NormalizerChain::from_settings(&self.settings),
                parser: SecureParser::new(),
                dispatcher: ConverterDispatcher::new(Arc::new(registry)),
                validators: self.validators,
                full_text: FullTextExtractor::default(),
                short_text: ShortTextExtractor::default(),
            }),
        }
    }
}
