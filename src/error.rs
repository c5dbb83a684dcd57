//! Structured error types for the lamina pipeline.
//!
//! Layout overflow and asset failures never show up here: the flow engine
//! splits oversized content and the asset store degrades to placeholders.
//! What remains are input parsing, font loading, rasterization and I/O.

use thiserror::Error;

/// The unified error type returned by all public lamina API functions.
#[derive(Debug, Error)]
pub enum LaminaError {
    /// JSON input (report or configuration) failed to parse.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// A font could not be loaded or parsed.
    #[error("Font error: {0}")]
    Font(String),

    /// An image could not be fetched or decoded.
    #[error("Image error: {0}")]
    Image(String),

    /// Capturing a page to a bitmap failed. Aborts the whole export.
    #[error("Rasterization failed on page {page}: {reason}")]
    Raster { page: usize, reason: String },

    /// PDF assembly failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// A second export was requested while one is still running.
    #[error("An export is already in progress")]
    ExportInProgress,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LaminaError {
    /// Wrap a serde_json error with a hint about what probably went wrong.
    pub fn parse(what: &'static str, e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => format!(
                "The JSON is valid but doesn't match the {} schema. Check field names, types and the reportType tag.",
                what
            ),
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        LaminaError::Parse {
            what,
            source: e,
            hint,
        }
    }

    /// The hint attached to a parse error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            LaminaError::Parse { hint, .. } if !hint.is_empty() => Some(hint),
            _ => None,
        }
    }
}
