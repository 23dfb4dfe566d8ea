//! Docweave - pluggable document extraction pipeline
//!
//! Docweave turns documents (PDF, HTML, Markdown, plain text, JSON/YAML/TOML, images) into
//! text, metadata and structure. Every stage is extensible: custom extractors take over a
//! MIME type, OCR backends recognize images, post-processors transform results and
//! validators accept or reject them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docweave::{extract_file_sync, ExtractionConfig};
//!
//! # fn main() -> docweave::Result<()> {
//! let config = ExtractionConfig::default();
//! let result = extract_file_sync("document.pdf", None, &config)?;
//! println!("Extracted: {}", result.content);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core** (`core`): entry points, the pipeline state machine, MIME detection, config
//! - **Plugins** (`plugins`): extractor, OCR backend, post-processor and validator registries
//! - **Extractors** (`extractors`): built-in format handlers
//! - **OCR** (`ocr`): backend dispatch and result caching
//! - **Assembly**: `chunking`, `embeddings`, `language_detection`, `keywords`, `text`
//!
//! # Features
//!
//! - `pdf`, `html`, `image`: built-in handlers for those formats
//! - `chunking`, `language-detection`, `keywords`: structural assembly steps
//! - `embeddings`: chunk embeddings through fastembed (needs ONNX Runtime)

#![deny(unsafe_code)]

pub mod core;
pub mod embeddings;
pub mod error;
pub mod extractors;
pub mod ocr;
pub mod panic_context;
pub mod plugins;
pub mod text;
pub mod types;

#[cfg(feature = "chunking")]
pub mod chunking;

#[cfg(feature = "language-detection")]
pub mod language_detection;

#[cfg(feature = "keywords")]
pub mod keywords;

pub use error::{DocweaveError, ErrorKind, Result};
pub use types::*;

pub use core::extractor::{BatchItem, batch_extract_bytes, batch_extract_file, extract_bytes, extract_file};
pub use core::extractor::{batch_extract_bytes_sync, batch_extract_file_sync, extract_bytes_sync, extract_file_sync};

pub use core::config::{
    CallPolicyConfig, ChunkerType, ChunkingConfig, EmbeddingConfig, EmbeddingModelType, ExtractionConfig, HtmlOptions,
    ImageExtractionConfig, JsonConfig, KeywordConfig, LanguageDetectionConfig, OcrConfig, OutputFormat, PageConfig,
    PdfConfig, PostProcessorConfig, ReductionMode, ResultFormat, TokenReductionConfig,
};

pub use core::mime::{
    HTML_MIME_TYPE, JSON_MIME_TYPE, MARKDOWN_MIME_TYPE, PDF_MIME_TYPE, PLAIN_TEXT_MIME_TYPE, detect_mime_type_from_bytes,
    detect_mime_type_from_path, get_extensions_for_mime, normalize_mime_hint,
};

pub use plugins::{PipelineContext, Plugin};

pub use embeddings::{EMBEDDING_PRESETS, EmbeddingPreset, get_preset, list_presets};
