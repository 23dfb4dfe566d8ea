//! PDF extractor backed by `lopdf`.
//!
//! Text is read page by page. Pages are joined with a blank line and their byte ranges are
//! recorded as page boundaries, so later stages can split pages and map chunks back to
//! them. Embedded JPEG and JPEG 2000 images are returned as-is when image extraction is
//! requested; other encodings are skipped.

use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{ExtractedImage, ExtractionResult, Metadata, PageBoundary, PageContent, PageStructure};
use crate::{DocweaveError, Result};
use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object};

const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PdfExtractor {
    fn name(&self) -> &str {
        "pdf-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Extracts text, metadata and embedded images from PDF documents"
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let doc = Document::load_mem(content)?;
        if doc.is_encrypted() {
            return Err(DocweaveError::parsing("Encrypted PDF documents are not supported"));
        }

        let mut text = String::new();
        let mut pages = Vec::new();
        let mut boundaries = Vec::new();
        for (idx, page_number) in doc.get_pages().keys().enumerate() {
            let page_text = match doc.extract_text(&[*page_number]) {
                Ok(page_text) => page_text.trim().to_string(),
                Err(e) => {
                    tracing::debug!(page = page_number, error = %e, "failed to extract page text");
                    String::new()
                }
            };

            if idx > 0 {
                text.push_str(PAGE_SEPARATOR);
            }
            let byte_start = text.len();
            text.push_str(&page_text);
            boundaries.push(PageBoundary {
                byte_start,
                byte_end: text.len(),
                page_number: idx + 1,
            });
            pages.push(PageContent {
                page_number: idx + 1,
                content: page_text,
                ..Default::default()
            });
        }

        let pdf_options = config.pdf_options.clone().unwrap_or_default();
        let mut metadata = if pdf_options.extract_metadata {
            read_info(&doc)
        } else {
            Metadata::default()
        };
        metadata.page_count = Some(pages.len());
        metadata.pages = Some(PageStructure {
            total_count: pages.len(),
            boundaries: Some(boundaries),
        });

        let images = config
            .images
            .as_ref()
            .filter(|images| images.extract_images)
            .map(|_| extract_images(&doc));

        tracing::debug!(pages = pages.len(), chars = text.len(), "PDF text extracted");

        Ok(ExtractionResult {
            metadata,
            pages: Some(pages),
            images,
            ..ExtractionResult::new(text, mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["application/pdf"]
    }
}

fn read_info(doc: &Document) -> Metadata {
    let info = doc
        .trailer
        .get(b"Info")
        .and_then(|obj| doc.dereference(obj))
        .and_then(|(_, obj)| obj.as_dict());
    let Ok(info) = info else {
        return Metadata::default();
    };

    Metadata {
        title: info_string(info, b"Title"),
        subject: info_string(info, b"Subject"),
        authors: info_string(info, b"Author").map(|author| vec![author]),
        keywords: info_string(info, b"Keywords").map(|keywords| {
            keywords
                .split([',', ';'])
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        }),
        producer: info_string(info, b"Producer"),
        created_at: info_string(info, b"CreationDate").map(|date| pdf_date_to_iso(&date)),
        modified_at: info_string(info, b"ModDate").map(|date| pdf_date_to_iso(&date)),
        ..Default::default()
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = info.get(key).ok()?.as_str().ok()?;
    let text = decode_pdf_string(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// PDF text strings are either UTF-16BE with a byte order mark or PDFDocEncoding, which is
/// read as Latin-1 here.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// `D:YYYYMMDDHHmmSS...` to `YYYY-MM-DDTHH:mm:SS`. Unrecognized dates are returned unchanged.
fn pdf_date_to_iso(date: &str) -> String {
    let raw = date.strip_prefix("D:").unwrap_or(date);
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() < 8 {
        return date.to_string();
    }
    let part = |range: std::ops::Range<usize>, fallback: &'static str| digits.get(range).unwrap_or(fallback).to_string();
    format!(
        "{}-{}-{}T{}:{}:{}",
        part(0..4, "0000"),
        part(4..6, "01"),
        part(6..8, "01"),
        part(8..10, "00"),
        part(10..12, "00"),
        part(12..14, "00"),
    )
}

fn extract_images(doc: &Document) -> Vec<ExtractedImage> {
    let mut images = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let page_images = match doc.get_page_images(page_id) {
            Ok(page_images) => page_images,
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "failed to read page images");
                continue;
            }
        };

        for pdf_image in page_images {
            let Some(filters) = pdf_image.filters.as_ref() else {
                continue;
            };
            let format = if filters.iter().any(|f| f == "DCTDecode") {
                "jpeg"
            } else if filters.iter().any(|f| f == "JPXDecode") {
                "jp2"
            } else {
                tracing::debug!(page = page_number, ?filters, "skipping image with unsupported filter");
                continue;
            };

            let mut image = ExtractedImage::new(pdf_image.content.to_vec(), format, images.len());
            image.page_number = Some(page_number as usize);
            image.width = u32::try_from(pdf_image.width).ok();
            image.height = u32::try_from(pdf_image.height).ok();
            image.colorspace = pdf_image.color_space.clone();
            image.bits_per_component = pdf_image.bits_per_component.and_then(|bpc| u32::try_from(bpc).ok());
            images.push(image);
        }
    }
    images
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ErrorKind;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, dictionary};

    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Annual Report"),
            "Author" => Object::string_literal("Finance Team"),
            "CreationDate" => Object::string_literal("D:20240315093000Z"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_pages_and_boundaries() {
        let pdf = build_pdf(&["First page", "Second page"]);
        let result = PdfExtractor::new()
            .extract_bytes(&pdf, "application/pdf", &ExtractionConfig::default())
            .await
            .unwrap();

        assert_eq!(result.metadata.page_count, Some(2));
        let pages = result.pages.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].content.contains("First"));
        assert!(pages[1].content.contains("Second"));

        let boundaries = result.metadata.pages.unwrap().boundaries.unwrap();
        assert_eq!(boundaries[1].page_number, 2);
        assert_eq!(&result.content[boundaries[1].byte_start..boundaries[1].byte_end], pages[1].content);
        assert!(result.images.is_none());
    }

    #[tokio::test]
    async fn test_info_dictionary_metadata() {
        let pdf = build_pdf(&["Body"]);
        let result = PdfExtractor::new()
            .extract_bytes(&pdf, "application/pdf", &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(result.metadata.title.as_deref(), Some("Annual Report"));
        assert_eq!(result.metadata.authors, Some(vec!["Finance Team".to_string()]));
        assert_eq!(result.metadata.created_at.as_deref(), Some("2024-03-15T09:30:00"));
    }

    #[tokio::test]
    async fn test_garbage_is_parsing_error() {
        let err = PdfExtractor::new()
            .extract_bytes(b"not a pdf", "application/pdf", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parsing);
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(pdf_date_to_iso("D:2023"), "D:2023");
    }
}
