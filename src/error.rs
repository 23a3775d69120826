//! Error types for layout construction and flattening

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range inside a key path string
pub type Span = std::ops::Range<usize>;

/// Errors raised while building primitive/constraint trees or flattening them
///
/// Every variant is raised synchronously, before any residual is evaluated.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A path segment does not exist in the tree being walked
    #[error("key '{key}' does not resolve: missing segment '{segment}'")]
    KeyResolution {
        key: String,
        segment: String,
        span: Span,
    },

    /// A primitive or parameter does not match the declared signature
    #[error("schema mismatch for {context}: expected {expected}, found {found}")]
    SchemaMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// The constraint, argument-key and parameter trees diverged
    #[error("internal error: constraint trees diverge at '{path}': {reason}")]
    StructuralCongruence { path: String, reason: String },

    /// An invalid constant was given to a constraint or primitive
    #[error("invalid {what}: {reason}")]
    Construction { what: String, reason: String },

    /// A child key is already occupied
    #[error("key '{key}' is already occupied")]
    DuplicateKey { key: String },

    /// A flat node listing cannot be rebuilt into a tree
    #[error("malformed flat tree at entry {index}: {reason}")]
    MalformedFlatTree { index: usize, reason: String },

    /// Failed to read a configuration file
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Failed to parse a configuration file
    #[error("failed to parse config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl LayoutError {
    /// Create a key resolution error for one segment of `key`
    pub fn missing_segment(key: impl Into<String>, segment: impl Into<String>, span: Span) -> Self {
        Self::KeyResolution {
            key: key.into(),
            segment: segment.into(),
            span,
        }
    }

    /// Create a schema mismatch error
    pub fn mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a structural congruence error
    pub fn diverged(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StructuralCongruence {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a construction error
    pub fn construction(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate key error
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Create a malformed flat tree error
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedFlatTree {
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a bug in the orchestrator rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::StructuralCongruence { .. })
    }

    /// Get the span of the failing key segment if available
    pub fn span(&self) -> Option<&Span> {
        match self {
            Self::KeyResolution { span, .. } => Some(span),
            _ => None,
        }
    }

    /// Format the error with the offending key path underlined using ariadne
    ///
    /// Errors that do not point into a key path are rendered as their plain message.
    pub fn format(&self, source_name: &str) -> String {
        let (key, span, segment) = match self {
            Self::KeyResolution { key, segment, span } => (key, span, segment),
            _ => return self.to_string(),
        };

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, source_name, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((source_name, span.clone()))
                    .with_message(format!("no child named '{}'", segment))
                    .with_color(Color::Red),
            )
            .finish()
            .write((source_name, Source::from(key.as_str())), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}
