//! Lightweight Markdown helpers: plain-text rendering, pipe-table recovery and block
//! classification for element-based results.

use crate::types::{Element, ElementType, Table};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+").expect("Heading regex is valid"));
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\*\*|__|\*|_|~~)([^*_~\n]+)(\*\*|__|\*|_|~~)").expect("Emphasis regex is valid"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("Inline code regex is valid"));
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("Image regex is valid"));
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("Link regex is valid"));
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+").expect("List marker regex is valid"));
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>[ \t]?").expect("Blockquote regex is valid"));
static TABLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?$").expect("Table separator regex is valid"));

/// Render Markdown as plain text by removing markup while keeping the words.
pub fn strip_markdown(markdown: &str) -> String {
    let text = markdown
        .lines()
        .filter(|line| !line.trim_start().starts_with("```") && !TABLE_SEPARATOR.is_match(line.trim()))
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with('|') && trimmed.ends_with('|') {
                split_row(trimmed).join(" ")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "$2");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    text.trim().to_string()
}

/// Recover pipe tables (`| a | b |` rows with a `|---|---|` separator) from Markdown.
pub fn extract_pipe_tables(markdown: &str, page_number: usize) -> Vec<Table> {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();
    let mut tables = Vec::new();
    let mut idx = 0;

    while idx + 1 < lines.len() {
        let is_header = lines[idx].starts_with('|') && lines[idx].ends_with('|');
        if !(is_header && TABLE_SEPARATOR.is_match(lines[idx + 1])) {
            idx += 1;
            continue;
        }

        let mut cells = vec![split_row(lines[idx])];
        let mut row = idx + 2;
        while row < lines.len() && lines[row].starts_with('|') && lines[row].ends_with('|') {
            cells.push(split_row(lines[row]));
            row += 1;
        }
        tables.push(Table::from_cells(cells, page_number));
        idx = row;
    }

    tables
}

fn split_row(row: &str) -> Vec<String> {
    row.trim_matches('|').split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Split content into blank-line separated blocks and classify each one.
pub fn split_elements(content: &str, page_number: Option<usize>) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut in_code = false;

    let mut flush = |block: &mut Vec<&str>, code: bool| {
        let text = block.join("\n").trim().to_string();
        block.clear();
        if text.is_empty() {
            return;
        }
        let element_type = if code { ElementType::CodeBlock } else { classify(&text) };
        elements.push(Element {
            element_type,
            text,
            page_number,
        });
    };

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            flush(&mut block, in_code);
            in_code = !in_code;
            continue;
        }
        if !in_code && line.trim().is_empty() {
            flush(&mut block, false);
            continue;
        }
        block.push(line);
    }
    flush(&mut block, in_code);

    elements
}

fn classify(block: &str) -> ElementType {
    let first = block.lines().next().unwrap_or_default().trim_start();
    if first.starts_with('#') {
        ElementType::Heading
    } else if first.starts_with('|') {
        ElementType::Table
    } else if LIST_MARKER.is_match(first) {
        ElementType::ListItem
    } else {
        ElementType::Paragraph
    }
}
