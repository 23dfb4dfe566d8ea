//! Error types for docweave.
//!
//! Every failure that crosses the pipeline boundary is a [`DocweaveError`]. Stage-local
//! failures (a decoder error, a panicking plugin, a timed-out OCR call) are reclassified into
//! one of the variants below before they reach the caller, and [`DocweaveError::kind`]
//! collapses the variants onto the seven kinds callers branch on.
//!
//! - `Io` errors from `std::io::Error` bubble up unchanged.
//! - `Validation` carries the structured [`ValidationError`] of the validator that rejected
//!   the result, when there is one.
//! - `Plugin` names the plugin that failed and, if it panicked, the captured
//!   [`PanicContext`].
//!
//! # Example
//!
//! ```rust
//! use docweave::{DocweaveError, ErrorKind, Result};
//!
//! fn require_content(content: &str) -> Result<()> {
//!     if content.is_empty() {
//!         return Err(DocweaveError::validation("content must not be empty"));
//!     }
//!     Ok(())
//! }
//!
//! let err = require_content("").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! ```
use crate::panic_context::PanicContext;
use crate::plugins::validator::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocweaveError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The error kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Parsing,
    Ocr,
    Io,
    Plugin,
    MissingDependency,
    UnsupportedFormat,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Parsing => "parsing",
            ErrorKind::Ocr => "ocr",
            ErrorKind::Io => "io",
            ErrorKind::Plugin => "plugin",
            ErrorKind::MissingDependency => "missing_dependency",
            ErrorKind::UnsupportedFormat => "unsupported_format",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DocweaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Invalid JSON: {message}")]
    InvalidJson {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("OCR error in '{backend}': {message}")]
    Ocr {
        message: String,
        backend: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<Box<ValidationError>>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin {
        message: String,
        plugin_name: String,
        panic: Option<Box<PanicContext>>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<serde_json::Error> for DocweaveError {
    fn from(err: serde_json::Error) -> Self {
        DocweaveError::InvalidJson {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<ValidationError> for DocweaveError {
    fn from(err: ValidationError) -> Self {
        let message = match err.details.validator.as_deref() {
            Some(validator) => format!("{} (validator '{}')", err.message, validator),
            None => err.message.clone(),
        };
        DocweaveError::Validation {
            message,
            details: Some(Box::new(err)),
            source: None,
        }
    }
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for DocweaveError {
    fn from(err: lopdf::Error) -> Self {
        DocweaveError::Parsing {
            message: format!("Failed to read PDF: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl DocweaveError {
    error_constructor!(parsing, Parsing);
    error_constructor!(invalid_json, InvalidJson);

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn validation_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn ocr<S: Into<String>, B: Into<String>>(backend: B, message: S) -> Self {
        Self::Ocr {
            message: message.into(),
            backend: backend.into(),
            source: None,
        }
    }

    pub fn plugin<S: Into<String>, N: Into<String>>(plugin_name: N, message: S) -> Self {
        Self::Plugin {
            message: message.into(),
            plugin_name: plugin_name.into(),
            panic: None,
        }
    }

    pub fn plugin_panic<N: Into<String>>(plugin_name: N, context: PanicContext) -> Self {
        Self::Plugin {
            message: format!("panicked: {}", context.message),
            plugin_name: plugin_name.into(),
            panic: Some(Box::new(context)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DocweaveError::Io(_) => ErrorKind::Io,
            DocweaveError::Parsing { .. } | DocweaveError::InvalidJson { .. } => ErrorKind::Parsing,
            DocweaveError::Ocr { .. } => ErrorKind::Ocr,
            DocweaveError::Validation { .. } => ErrorKind::Validation,
            DocweaveError::MissingDependency(_) => ErrorKind::MissingDependency,
            DocweaveError::Plugin { .. } => ErrorKind::Plugin,
            DocweaveError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
        }
    }

    /// Structured details of the validator that rejected a result.
    pub fn validation_details(&self) -> Option<&ValidationError> {
        match self {
            DocweaveError::Validation { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    /// Name of the plugin (or OCR backend) the error is attributed to.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            DocweaveError::Plugin { plugin_name, .. } => Some(plugin_name),
            DocweaveError::Ocr { backend, .. } => Some(backend),
            DocweaveError::Validation { details, .. } => details.as_ref().and_then(|d| d.details.validator.as_deref()),
            _ => None,
        }
    }

    pub fn panic_context(&self) -> Option<&PanicContext> {
        match self {
            DocweaveError::Plugin { panic, .. } => panic.as_deref(),
            _ => None,
        }
    }
}
