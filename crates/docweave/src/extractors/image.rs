//! Image extractor.
//!
//! Reads dimensions and format only. Text for image inputs comes from the OCR stage of
//! the pipeline, which runs for every image MIME type.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractionResult, ImageMetadata, Metadata};
use async_trait::async_trait;

#[derive(Default)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ImageExtractor {
    fn name(&self) -> &str {
        "image-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Reads image dimensions; text is produced by OCR"
    }
}

#[async_trait]
impl DocumentExtractor for ImageExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let metadata = Metadata {
            image: probe(content, mime_type)?,
            ..Default::default()
        };
        Ok(ExtractionResult {
            metadata,
            ..ExtractionResult::new(String::new(), mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["image/*"]
    }
}

#[cfg(feature = "image")]
fn probe(content: &[u8], _mime_type: &str) -> Result<Option<ImageMetadata>> {
    use crate::DocweaveError;

    let reader = image::ImageReader::new(std::io::Cursor::new(content)).with_guessed_format()?;
    let Some(format) = reader.format() else {
        return Ok(None);
    };
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DocweaveError::parsing_with_source("Failed to read image dimensions", e))?;

    Ok(Some(ImageMetadata {
        width,
        height,
        format: format!("{:?}", format).to_lowercase(),
    }))
}

/// Without an image decoder the dimensions are unknown, so no image metadata is reported.
#[cfg(not(feature = "image"))]
fn probe(_content: &[u8], mime_type: &str) -> Result<Option<ImageMetadata>> {
    tracing::debug!(mime_type, "image feature disabled, skipping dimension probe");
    Ok(None)
}
