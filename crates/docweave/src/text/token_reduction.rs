//! Token reduction.
//!
//! `light` normalizes whitespace and collapses repeated punctuation. `moderate` additionally
//! drops English stopwords. Fenced code blocks are left untouched at every level.

use crate::core::config::{ReductionMode, TokenReductionConfig};
use crate::text::stopwords::is_stopword;
use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("Whitespace regex is valid"));
static REPEATED_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([!?,;:])[!?,;:]+").expect("Repeated punctuation regex is valid"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("Blank line regex is valid"));

/// Reduce `text` according to `config.mode`.
pub fn reduce_tokens(text: &str, config: &TokenReductionConfig) -> String {
    if config.mode == ReductionMode::Off {
        return text.to_string();
    }

    let mut out = Vec::new();
    let mut in_code = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            out.push(line.to_string());
            continue;
        }
        if in_code {
            out.push(line.to_string());
            continue;
        }

        let light = HORIZONTAL_WS.replace_all(line.trim(), " ");
        let light = REPEATED_PUNCT.replace_all(&light, "$1");

        let reduced = match config.mode {
            ReductionMode::Moderate => drop_stopwords(&light, config.preserve_important_words),
            _ => light.into_owned(),
        };
        out.push(reduced);
    }

    BLANK_RUNS.replace_all(out.join("\n").trim(), "\n\n").into_owned()
}

fn drop_stopwords(line: &str, preserve_important: bool) -> String {
    line.split(' ')
        .filter(|word| {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
            if bare.is_empty() {
                return !word.is_empty();
            }
            if preserve_important && is_important(bare) {
                return true;
            }
            !is_stopword(bare)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Acronyms, numbers and negations carry meaning even when they look like filler.
fn is_important(word: &str) -> bool {
    let is_acronym = word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase());
    let has_digit = word.chars().any(|c| c.is_ascii_digit());
    let is_negation = matches!(word.to_lowercase().as_str(), "no" | "not" | "nor");
    is_acronym || has_digit || is_negation
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionStats {
    pub char_reduction: f64,
    pub token_reduction: f64,
    pub original_tokens: usize,
    pub reduced_tokens: usize,
}

pub fn get_reduction_statistics(original: &str, reduced: &str) -> ReductionStats {
    let ratio = |before: usize, after: usize| {
        if before == 0 {
            0.0
        } else {
            1.0 - after as f64 / before as f64
        }
    };
    let original_tokens = original.split_whitespace().count();
    let reduced_tokens = reduced.split_whitespace().count();

    ReductionStats {
        char_reduction: ratio(original.chars().count(), reduced.chars().count()),
        token_reduction: ratio(original_tokens, reduced_tokens),
        original_tokens,
        reduced_tokens,
    }
}
