//! Extraction orchestration.
//!
//! - **Entry points** ([`extractor`]): `extract_file`, `extract_bytes` and their batch and
//!   synchronous variants
//! - **Pipeline** ([`pipeline`]): the per-request state machine
//! - **MIME detection** ([`mime`]): content sniffing, extension lookup, hint normalization
//! - **Configuration** ([`config`]): `ExtractionConfig` and its sections, file discovery
//! - **I/O** ([`io`]): file reading helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use docweave::core::extractor::extract_file;
//! use docweave::core::config::ExtractionConfig;
//!
//! # async fn example() -> docweave::Result<()> {
//! let config = ExtractionConfig::default();
//! let result = extract_file("document.pdf", None, &config).await?;
//! println!("Extracted content: {}", result.content);
//! # Ok(())
//! # }
//! ```

pub(crate) mod call;
pub mod config;
pub mod extractor;
pub mod io;
pub mod mime;
pub(crate) mod pipeline;

pub use config::{
    ChunkingConfig, ExtractionConfig, ImageExtractionConfig, JsonConfig, LanguageDetectionConfig, OcrConfig,
    PdfConfig, TokenReductionConfig,
};
pub use extractor::{BatchItem, batch_extract_bytes, batch_extract_file, extract_bytes, extract_file};
