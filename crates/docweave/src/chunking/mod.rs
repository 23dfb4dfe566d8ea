//! Text chunking.
//!
//! Splits content with `text-splitter`, either as generic text or Markdown-aware, and
//! records each chunk's byte range. When page boundaries are known, every chunk is mapped
//! to the first and last page it touches.
//!
//! # Example
//!
//! ```rust
//! use docweave::chunking::chunk_text;
//! use docweave::core::config::ChunkingConfig;
//!
//! let config = ChunkingConfig {
//!     max_chars: 40,
//!     max_overlap: 10,
//!     ..Default::default()
//! };
//! let text = "First sentence here. Second sentence follows. A third one ends it.";
//! let chunks = chunk_text(text, &config, None)?;
//! assert!(chunks.len() > 1);
//! assert!(chunks.iter().all(|c| c.metadata.total_chunks == chunks.len()));
//! # Ok::<(), docweave::DocweaveError>(())
//! ```

use crate::core::config::{ChunkerType, ChunkingConfig};
use crate::types::{Chunk, ChunkMetadata, PageBoundary};
use crate::{DocweaveError, Result};
use text_splitter::{Characters, ChunkCapacity, ChunkConfig, MarkdownSplitter, TextSplitter};

fn build_chunk_config(config: &ChunkingConfig) -> Result<ChunkConfig<Characters>> {
    let max = config.max_chars;
    let capacity = if config.sentence_boundaries {
        // A range lets the splitter stop at the last sentence that fits instead of filling
        // up to `max` with partial sentences.
        let desired = (max * 3 / 4).max(config.max_overlap + 1).min(max);
        ChunkCapacity::new(desired)
            .with_max(max)
            .map_err(|e| DocweaveError::validation(format!("Invalid chunking configuration: {}", e)))?
    } else {
        ChunkCapacity::new(max)
    };

    ChunkConfig::new(capacity)
        .with_overlap(config.max_overlap)
        .map(|chunk_config| chunk_config.with_trim(true))
        .map_err(|e| DocweaveError::validation(format!("Invalid chunking configuration: {}", e)))
}

/// Split `text` into chunks with byte offsets and optional page ranges.
pub fn chunk_text(text: &str, config: &ChunkingConfig, boundaries: Option<&[PageBoundary]>) -> Result<Vec<Chunk>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_config = build_chunk_config(config)?;
    let pieces: Vec<(usize, &str)> = match config.chunker_type {
        ChunkerType::Text => TextSplitter::new(chunk_config).chunk_indices(text).collect(),
        ChunkerType::Markdown => MarkdownSplitter::new(chunk_config).chunk_indices(text).collect(),
    };

    let total_chunks = pieces.len();
    let chunks = pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (byte_start, content))| {
            let byte_end = byte_start + content.len();
            let (first_page, last_page) = boundaries
                .map(|b| page_range(b, byte_start, byte_end))
                .unwrap_or((None, None));
            Chunk {
                content: content.to_string(),
                embedding: None,
                metadata: ChunkMetadata {
                    byte_start,
                    byte_end,
                    token_count: None,
                    chunk_index,
                    total_chunks,
                    first_page,
                    last_page,
                },
            }
        })
        .collect();

    Ok(chunks)
}

fn page_range(boundaries: &[PageBoundary], byte_start: usize, byte_end: usize) -> (Option<usize>, Option<usize>) {
    let last_byte = byte_end.saturating_sub(1).max(byte_start);
    let page_at = |offset: usize| {
        boundaries
            .iter()
            .find(|b| offset >= b.byte_start && offset < b.byte_end)
            .or_else(|| boundaries.iter().rev().find(|b| b.byte_start <= offset))
            .map(|b| b.page_number)
    };
    (page_at(byte_start), page_at(last_byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, max_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            max_overlap,
            ..Default::default()
        }
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", &ChunkingConfig::default(), None).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_short_text_single_chunk() {
        let text = "This is a short text.";
        let chunks = chunk_text(text, &config(100, 10), None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].metadata.byte_start, 0);
        assert_eq!(chunks[0].metadata.byte_end, text.len());
        assert_eq!(chunks[0].metadata.total_chunks, 1);
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = chunk_text(text, &config(20, 5), None).unwrap();
        assert!(chunks.len() >= 2);
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, idx);
            assert!(chunk.content.chars().count() <= 20);
            assert_eq!(&text[chunk.metadata.byte_start..chunk.metadata.byte_end], chunk.content);
        }
    }

    #[test]
    fn test_markdown_chunker_keeps_headings() {
        let markdown = "# Title\n\nParagraph one.\n\n## Section\n\nParagraph two.";
        let chunks = chunk_text(
            markdown,
            &ChunkingConfig {
                chunker_type: ChunkerType::Markdown,
                ..config(50, 10)
            },
            None,
        )
        .unwrap();
        assert!(chunks.iter().any(|chunk| chunk.content.contains("# Title")));
    }

    #[test]
    fn test_invalid_overlap_is_validation_error() {
        let err = chunk_text("some text", &config(10, 10), None).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_page_ranges() {
        let text = "page one text\n\npage two text";
        let boundaries = [
            PageBoundary {
                byte_start: 0,
                byte_end: 13,
                page_number: 1,
            },
            PageBoundary {
                byte_start: 15,
                byte_end: text.len(),
                page_number: 2,
            },
        ];

        let whole = chunk_text(text, &config(100, 0), Some(&boundaries)).unwrap();
        assert_eq!(whole[0].metadata.first_page, Some(1));
        assert_eq!(whole[0].metadata.last_page, Some(2));

        let split = chunk_text(text, &config(13, 0), Some(&boundaries)).unwrap();
        assert_eq!(split.first().unwrap().metadata.first_page, Some(1));
        assert_eq!(split.last().unwrap().metadata.last_page, Some(2));
    }
}
