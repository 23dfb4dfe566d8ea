//! Built-in document extractors.
//!
//! Built-ins are not stored in the extractor registry. The pipeline consults the registry
//! first and falls back to [`builtin_extractor_for`] only when no custom extractor is
//! registered for the MIME type.

use crate::plugins::DocumentExtractor;
use once_cell::sync::Lazy;
use std::sync::Arc;

#[cfg(feature = "html")]
pub mod html;
pub mod image;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod structured;
pub mod text;

#[cfg(feature = "html")]
pub use html::HtmlExtractor;
pub use image::ImageExtractor;
#[cfg(feature = "pdf")]
pub use pdf::PdfExtractor;
pub use structured::StructuredExtractor;
pub use text::{MarkdownExtractor, PlainTextExtractor};

static BUILTIN_EXTRACTORS: Lazy<Vec<Arc<dyn DocumentExtractor>>> = Lazy::new(|| {
    let mut extractors: Vec<Arc<dyn DocumentExtractor>> = vec![
        Arc::new(PlainTextExtractor),
        Arc::new(MarkdownExtractor),
        Arc::new(StructuredExtractor),
        Arc::new(ImageExtractor),
    ];
    #[cfg(feature = "html")]
    extractors.push(Arc::new(HtmlExtractor));
    #[cfg(feature = "pdf")]
    extractors.push(Arc::new(PdfExtractor));
    extractors
});

/// The built-in extractor handling `mime_type`, if any.
pub fn builtin_extractor_for(mime_type: &str) -> Option<Arc<dyn DocumentExtractor>> {
    BUILTIN_EXTRACTORS
        .iter()
        .find(|extractor| extractor.can_handle(mime_type))
        .cloned()
}

/// Every MIME type (or `family/*` pattern) with built-in handling.
pub fn builtin_mime_types() -> Vec<&'static str> {
    BUILTIN_EXTRACTORS
        .iter()
        .flat_map(|extractor| extractor.supported_mime_types().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::Plugin;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_extractor_for("text/plain").unwrap().name(), "plain-text-extractor");
        assert_eq!(builtin_extractor_for("image/tiff").unwrap().name(), "image-extractor");
        assert!(builtin_extractor_for("application/x-unknown").is_none());
    }

    #[cfg(all(feature = "html", feature = "pdf"))]
    #[test]
    fn test_feature_gated_builtins() {
        assert_eq!(builtin_extractor_for("text/html").unwrap().name(), "html-extractor");
        assert_eq!(builtin_extractor_for("application/pdf").unwrap().name(), "pdf-extractor");
        assert!(builtin_mime_types().contains(&"application/pdf"));
    }
}
