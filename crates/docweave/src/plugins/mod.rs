//! Plugin system.
//!
//! Four extension points, each with its own registry:
//!
//! - [`DocumentExtractor`]: handles a MIME type; a custom extractor replaces built-in
//!   handling of that type
//! - [`OcrBackend`]: recognizes text in images, selected by `ocr.backend`
//! - [`PostProcessor`]: transforms results, run in registration order
//! - [`Validator`]: accepts or rejects results, all must pass
//!
//! Every plugin also implements the [`Plugin`] base trait. Registries live in a
//! [`PipelineContext`]; the free `register_*` / `list_*` functions act on the global one.
//!
//! # Example
//!
//! ```rust
//! use docweave::plugins::PipelineContext;
//! use docweave::ExtractionResult;
//!
//! let ctx = PipelineContext::new();
//! ctx.extractors()
//!     .register_fn("application/x-note", |bytes, mime| {
//!         Ok(ExtractionResult::new(String::from_utf8_lossy(bytes), mime))
//!     })?;
//! ctx.post_processors().register("trim", |mut result| {
//!     result.content = result.content.trim().to_string();
//!     Ok(result)
//! })?;
//!
//! assert!(ctx.extractors().has("application/x-note"));
//! assert_eq!(ctx.post_processors().list(), vec!["trim"]);
//! # Ok::<(), docweave::DocweaveError>(())
//! ```

mod context;
mod extractor;
mod ocr;
mod processor;
pub mod registry;
mod traits;
pub mod validator;

pub use context::PipelineContext;
pub use extractor::{
    DocumentExtractor, ExtractorRegistry, FnExtractor, PluginManifest, clear_extractors, list_extractors,
    register_extractor, unregister_extractor,
};
pub use ocr::{
    FnOcrBackend, OcrBackend, OcrBackendRegistry, clear_ocr_backends, list_ocr_backends, register_ocr_backend,
    unregister_ocr_backend,
};
pub use processor::{
    FnPostProcessor, PostProcessor, PostProcessorRegistry, clear_post_processors, list_post_processors,
    register_post_processor, unregister_post_processor,
};
pub use registry::{Registry, ScopedRegistration};
pub use traits::Plugin;
pub use validator::{
    FnValidator, ValidationDetails, ValidationError, ValidationErrorKind, ValidationResult, Validator,
    ValidatorRegistry, clear_validators, list_validators, register_validator, unregister_validator,
};
