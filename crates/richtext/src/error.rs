//! Rich text error types.
//!
//! Only ingestion surfaces errors to callers. Problems found while resolving
//! embeds, templates and links are logged and the affected node is left as
//! it was, so these types never travel through the converter pipeline.

use std::fmt;

use thiserror::Error;

/// A single problem found while parsing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line of the offending input, after sanitization.
    pub line: usize,
    /// 1-based column (in characters).
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Build a diagnostic for a byte offset into `input`.
    pub fn at_offset(input: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(input.len());
        let mut boundary = offset;
        while !input.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let before = &input[..boundary];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self::new(line, column, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Ingestion failed; carries every diagnostic the parser collected.
#[derive(Debug, Clone, Error)]
#[error("invalid rich text document: {}", summarize(.diagnostics))]
pub struct InvalidDocumentError {
    pub diagnostics: Vec<Diagnostic>,
}

impl InvalidDocumentError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Diagnostics rendered as plain messages.
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "no diagnostics".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// A resource reference could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("empty resource reference")]
    Empty,

    #[error("resource reference '{href}' has no identifier")]
    MissingIdentifier { href: String },

    #[error("resource reference '{href}' is not a valid URL: {details}")]
    InvalidUrl { href: String, details: String },
}

/// Errors raised by the converter dispatcher itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("unknown conversion pipeline '{name}'. Known pipelines: {known}")]
    UnknownPipeline { name: String, known: String },
}

/// Errors raised by the namespace migration gateway.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Table or column name from settings is not a plain SQL identifier.
    #[error("invalid SQL identifier '{name}' in migration settings")]
    InvalidIdentifier { name: String },

    /// The storage layer failed.
    #[error("namespace migration failed: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Message produced by authoring-time validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<Diagnostic> for ValidationError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(diagnostic.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_maps_to_line_and_column() {
        let input = "<a>\n  <b>\n</a>";
        let diagnostic = Diagnostic::at_offset(input, 6, "here");
        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.column, 3);
    }

    #[test]
    fn offset_past_end_is_clamped() {
        let diagnostic = Diagnostic::at_offset("abc", 99, "eof");
        assert_eq!((diagnostic.line, diagnostic.column), (1, 4));
    }

    #[test]
    fn invalid_document_summarizes_count() {
        let err = InvalidDocumentError::new(vec![
            Diagnostic::new(1, 1, "first"),
            Diagnostic::new(2, 1, "second"),
            Diagnostic::new(3, 1, "third"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("1:1: first"));
        assert!(msg.contains("and 2 more"));
        assert_eq!(err.messages().len(), 3);
    }

    #[test]
    fn unknown_pipeline_lists_known_names() {
        let err = ConversionError::UnknownPipeline {
            name: "print".to_string(),
            known: "edit, input, output".to_string(),
        };
        assert!(err.to_string().contains("edit, input, output"));
    }

    #[test]
    fn diagnostics_become_validation_messages() {
        let error: ValidationError = Diagnostic::new(4, 2, "unexpected end tag").into();
        assert_eq!(error.message, "4:2: unexpected end tag");
    }
}
