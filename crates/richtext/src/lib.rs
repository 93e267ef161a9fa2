//! Trovato Rich Text
//!
//! Secure ingestion, conversion pipelines and text extraction for DocBook
//! rich text fields. The `richtext` binary wraps the service for
//! administrative use.

pub mod config;
pub mod convert;
pub mod db;
pub mod dom;
pub mod error;
pub mod ingest;
pub mod migration;
pub mod namespace;
pub mod node_filter;
pub mod normalizer;
pub mod reference;
pub mod service;
pub mod settings;
pub mod text;

pub use dom::{Document, NodeId};
pub use error::{
    ConversionError, Diagnostic, InvalidDocumentError, MigrationError, ReferenceError,
    ValidationError,
};
pub use service::{RichTextService, RichTextServiceBuilder, Validator};
pub use settings::Settings;
