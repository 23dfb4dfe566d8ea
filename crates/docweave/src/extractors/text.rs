//! Plain text and Markdown extractors.

use crate::Result;
use crate::core::config::{ExtractionConfig, OutputFormat};
use crate::plugins::{DocumentExtractor, Plugin};
use crate::text::markup::{extract_pipe_tables, strip_markdown};
use crate::types::{ExtractionResult, Metadata};
use async_trait::async_trait;
use serde_json::json;

fn decode_text(content: &[u8]) -> String {
    let text = String::from_utf8_lossy(content);
    text.trim_start_matches('\u{feff}')
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

fn text_metadata(text: &str) -> Metadata {
    let mut metadata = Metadata::default();
    metadata.custom.insert("line_count".to_string(), json!(text.lines().count()));
    metadata
        .custom
        .insert("word_count".to_string(), json!(text.split_whitespace().count()));
    metadata.custom.insert("character_count".to_string(), json!(text.chars().count()));
    metadata
}

/// Plain text, including delimiter-separated text such as CSV, which is kept verbatim.
#[derive(Default)]
pub struct PlainTextExtractor;

impl Plugin for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn description(&self) -> &str {
        "Extracts content from plain text files"
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        _config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let text = decode_text(content);
        Ok(ExtractionResult {
            metadata: text_metadata(&text),
            ..ExtractionResult::new(text, mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/plain", "text/csv", "text/tab-separated-values"]
    }
}

/// Markdown, kept as-is for markup output formats and stripped to words for plain output.
#[derive(Default)]
pub struct MarkdownExtractor;

impl Plugin for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown-extractor"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[async_trait]
impl DocumentExtractor for MarkdownExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let markdown = decode_text(content);
        let mut metadata = text_metadata(&markdown);
        metadata.title = markdown
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|title| title.trim().to_string());

        let tables = extract_pipe_tables(&markdown, 1);
        let content = match config.output_format {
            OutputFormat::Plain => strip_markdown(&markdown),
            _ => markdown,
        };

        Ok(ExtractionResult {
            metadata,
            tables,
            ..ExtractionResult::new(content, mime_type)
        })
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["text/markdown", "text/x-markdown"]
    }
}
