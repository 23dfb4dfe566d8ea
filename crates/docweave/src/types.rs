use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// General extraction result used by the core extraction API.
///
/// Extractors and OCR backends return this shape too. The pipeline then fills in the
/// optional sections according to the configuration.
///
/// `tables` is always present. `chunks`, `images`, `pages` and `elements` stay `None` unless
/// the corresponding configuration section asked for them; `Some(vec![])` means "requested,
/// nothing found".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: String,
    pub mime_type: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_languages: Option<Vec<String>>,

    /// Text chunks when chunking is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,

    /// Extracted images from the document.
    ///
    /// Each image may carry a nested `ocr_result`. Nested results never carry images of
    /// their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ExtractedImage>>,

    /// Per-page content when page extraction is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageContent>>,

    /// Semantic elements when `result_format` is `element_based`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<Element>>,
}

impl ExtractionResult {
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Serialize into the plain JSON map handed to validators.
    pub fn to_map(&self) -> crate::Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(crate::DocweaveError::parsing(format!(
                "Extraction result serialized to non-object JSON: {}",
                other
            ))),
        }
    }
}

/// Extraction result metadata.
///
/// Common document properties as typed fields, plus a flattened `custom` map for anything
/// an extractor or post-processor adds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    /// Keywords declared by the document itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Primary language (ISO 639 code)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Creation timestamp (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Last modification timestamp (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,

    /// Page boundaries within `content`, used for chunk-to-page mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<PageStructure>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,

    /// Keywords scored from the content when keyword extraction is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_keywords: Option<Vec<Keyword>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<OcrMetadata>,

    /// Free-form fields from extractors and post-processors, merged at the root level
    /// during serialization.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<Vec<PageBoundary>>,
}

/// Byte range of one page within the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBoundary {
    pub byte_start: usize,
    pub byte_end: usize,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrMetadata {
    pub backend: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub score: f32,
}

/// Content for a single page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// 1-indexed
    pub page_number: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tables: Vec<Table>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<ExtractedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub cells: Vec<Vec<String>>,
    pub markdown: String,
    pub page_number: usize,
}

impl Table {
    /// Build a table from a cell grid, rendering the first row as the header.
    pub fn from_cells(cells: Vec<Vec<String>>, page_number: usize) -> Self {
        let markdown = cells_to_markdown(&cells);
        Self {
            cells,
            markdown,
            page_number,
        }
    }
}

fn cells_to_markdown(cells: &[Vec<String>]) -> String {
    let Some(header) = cells.first() else {
        return String::new();
    };
    let width = cells.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let render_row = |row: &[String]| {
        let mut line = String::from("|");
        for idx in 0..width {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            line.push(' ');
            line.push_str(&cell.replace('|', "\\|"));
            line.push_str(" |");
        }
        line
    };

    let mut markdown = render_row(header);
    markdown.push('\n');
    markdown.push('|');
    for _ in 0..width {
        markdown.push_str("------|");
    }
    for row in &cells[1..] {
        markdown.push('\n');
        markdown.push_str(&render_row(row));
    }
    markdown
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,

    /// Present only when embedding generation is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Byte offset of the chunk start within `content` (inclusive)
    pub byte_start: usize,

    /// Byte offset of the chunk end within `content` (exclusive)
    pub byte_end: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,

    pub chunk_index: usize,

    pub total_chunks: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<usize>,
}

/// An image found in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub data: Vec<u8>,

    /// Image format such as "png" or "jpeg"
    pub format: String,

    /// 0-indexed position of the image in the document
    pub image_index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits_per_component: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// OCR output for this image when `images.perform_ocr` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_result: Option<Box<ExtractionResult>>,
}

impl ExtractedImage {
    pub fn new(data: Vec<u8>, format: impl Into<String>, image_index: usize) -> Self {
        Self {
            data,
            format: format.into(),
            image_index,
            page_number: None,
            width: None,
            height: None,
            colorspace: None,
            bits_per_component: None,
            description: None,
            ocr_result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Heading,
    Paragraph,
    ListItem,
    CodeBlock,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub element_type: ElementType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sections_are_not_serialized() {
        let result = ExtractionResult::new("hello", "text/plain");
        let json = serde_json::to_value(&result).unwrap();
        let map = json.as_object().unwrap();

        assert_eq!(map["content"], "hello");
        assert!(map.contains_key("tables"));
        assert!(!map.contains_key("chunks"));
        assert!(!map.contains_key("images"));
        assert!(!map.contains_key("pages"));
        assert!(!map.contains_key("detected_languages"));
    }

    #[test]
    fn test_requested_but_empty_images_serialize_as_empty_list() {
        let mut result = ExtractionResult::new("", "text/plain");
        result.images = Some(Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["images"], serde_json::json!([]));
    }

    #[test]
    fn test_custom_metadata_is_flattened() {
        let mut metadata = Metadata {
            title: Some("Report".to_string()),
            ..Default::default()
        };
        metadata
            .custom
            .insert("word_count".to_string(), serde_json::json!(42));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["title"], "Report");
        assert_eq!(json["word_count"], 42);

        let back: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_table_markdown_rendering() {
        let table = Table::from_cells(
            vec![
                vec!["name".to_string(), "qty".to_string()],
                vec!["apple".to_string(), "3".to_string()],
            ],
            1,
        );
        assert_eq!(table.markdown, "| name | qty |\n|------|------|\n| apple | 3 |");
        assert!(Table::from_cells(Vec::new(), 1).markdown.is_empty());
    }

    #[test]
    fn test_to_map_exposes_content_and_metadata() {
        let mut result = ExtractionResult::new("body", "text/plain");
        result.metadata.title = Some("T".to_string());
        let map = result.to_map().unwrap();
        assert_eq!(map["content"], "body");
        assert_eq!(map["metadata"]["title"], "T");
    }
}
