//! Heuristic text quality scoring.
//!
//! The score starts at 1.0 and is reduced by the share of OCR artifacts, script/style
//! residue and navigation boilerplate in the text, then raised by signs of prose structure
//! and by the presence of document metadata. Always within `0.0..=1.0`.

use crate::types::Metadata;
use once_cell::sync::Lazy;
use regex::Regex;

const OCR_PENALTY_WEIGHT: f64 = 0.3;
const SCRIPT_PENALTY_WEIGHT: f64 = 0.2;
const NAV_PENALTY_WEIGHT: f64 = 0.1;
const STRUCTURE_BONUS_WEIGHT: f64 = 0.2;
const METADATA_BONUS_WEIGHT: f64 = 0.1;

const MIN_TEXT_LENGTH: usize = 10;
const LARGE_TEXT_LENGTH: usize = 1000;
const MIN_SENTENCE_WORDS: f64 = 10.0;
const MAX_SENTENCE_WORDS: f64 = 30.0;
const MIN_PARAGRAPH_WORDS: f64 = 50.0;
const MAX_PARAGRAPH_WORDS: f64 = 300.0;

static SCATTERED_CHARS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z]\s{2,}[a-zA-Z]\s{2,}[a-zA-Z]\b").expect("Scattered chars regex pattern is valid")
});
static REPEATED_PUNCT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.]{3,}|[_]{3,}").expect("Repeated punctuation regex pattern is valid"));
static ISOLATED_PUNCT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s[.,;:!?]\s").expect("Isolated punctuation regex pattern is valid"));
static MALFORMED_WORDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z]+[0-9]+[a-zA-Z]+[a-zA-Z0-9]*\b").expect("Malformed words regex pattern is valid")
});
static EXCESSIVE_WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{3,}").expect("Excessive whitespace regex pattern is valid"));

static JS_FUNCTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)function\s+\w+\s*\([^)]*\)\s*\{[^}]*\}").expect("JavaScript function regex pattern is valid")
});
static CSS_RULES_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.[a-zA-Z][\w-]*\s*\{[^}]*\}").expect("CSS rules regex pattern is valid"));
static SCRIPT_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Script tag regex pattern is valid"));
static STYLE_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("Style tag regex pattern is valid"));

static NAV_WORDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Skip to main content|Back to top|Main navigation|Site navigation)\b")
        .expect("Navigation words regex pattern is valid")
});
static PAGINATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Page \d+ of \d+|Previous page|Next page)\b").expect("Pagination regex pattern is valid")
});

static SENTENCE_DETECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+[A-Z]").expect("Sentence detection regex pattern is valid"));

fn sum_match_lengths(text: &str, pattern: &Regex) -> usize {
    pattern.find_iter(text).map(|m| m.len()).sum()
}

pub fn calculate_quality_score(text: &str, metadata: &Metadata) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    if text.len() < MIN_TEXT_LENGTH {
        return 0.1;
    }

    let total_chars = text.len() as f64;
    let mut score = 1.0;

    score -= ocr_penalty(text, total_chars) * OCR_PENALTY_WEIGHT;
    if text.len() > LARGE_TEXT_LENGTH {
        score -= script_penalty(text, total_chars) * SCRIPT_PENALTY_WEIGHT;
        score -= navigation_penalty(text, total_chars) * NAV_PENALTY_WEIGHT;
    }
    score += structure_bonus(text) * STRUCTURE_BONUS_WEIGHT;
    score += metadata_bonus(metadata) * METADATA_BONUS_WEIGHT;

    score.clamp(0.0, 1.0)
}

fn ocr_penalty(text: &str, total_chars: f64) -> f64 {
    let artifact_chars = sum_match_lengths(text, &SCATTERED_CHARS_PATTERN)
        + sum_match_lengths(text, &REPEATED_PUNCT_PATTERN)
        + sum_match_lengths(text, &ISOLATED_PUNCT_PATTERN)
        + sum_match_lengths(text, &MALFORMED_WORDS_PATTERN)
        + sum_match_lengths(text, &EXCESSIVE_WHITESPACE_PATTERN);

    (artifact_chars as f64 / total_chars).min(1.0)
}

fn script_penalty(text: &str, total_chars: f64) -> f64 {
    if !text.contains("function") && !text.contains("<script") && !text.contains("<style") {
        return 0.0;
    }

    let script_chars = sum_match_lengths(text, &JS_FUNCTION_PATTERN)
        + sum_match_lengths(text, &CSS_RULES_PATTERN)
        + sum_match_lengths(text, &SCRIPT_TAG_PATTERN)
        + sum_match_lengths(text, &STYLE_TAG_PATTERN);

    (script_chars as f64 / total_chars).min(1.0)
}

fn navigation_penalty(text: &str, total_chars: f64) -> f64 {
    let nav_chars = sum_match_lengths(text, &NAV_WORDS_PATTERN) + sum_match_lengths(text, &PAGINATION_PATTERN);
    (nav_chars as f64 / total_chars).min(1.0)
}

fn structure_bonus(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    if words == 0.0 {
        return 0.0;
    }

    let sentence_count = SENTENCE_DETECT.find_iter(text).count() as f64;
    let paragraph_count = text.matches("\n\n").count() as f64 + 1.0;
    let avg_words_per_sentence = words / sentence_count.max(1.0);
    let avg_words_per_paragraph = words / paragraph_count;

    let mut bonus: f64 = 0.0;
    if (MIN_SENTENCE_WORDS..=MAX_SENTENCE_WORDS).contains(&avg_words_per_sentence) {
        bonus += 0.3;
    }
    if (MIN_PARAGRAPH_WORDS..=MAX_PARAGRAPH_WORDS).contains(&avg_words_per_paragraph) {
        bonus += 0.3;
    }
    if paragraph_count > 1.0 {
        bonus += 0.2;
    }
    if text.contains(['.', '!', '?']) {
        bonus += 0.2;
    }
    bonus.min(1.0)
}

fn metadata_bonus(metadata: &Metadata) -> f64 {
    let present = [
        metadata.title.is_some(),
        metadata.authors.is_some(),
        metadata.subject.is_some(),
        metadata.keywords.is_some(),
        metadata.custom.contains_key("description"),
    ];
    present.iter().filter(|p| **p).count() as f64 / present.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_short_text() {
        let metadata = Metadata::default();
        assert_eq!(calculate_quality_score("", &metadata), 0.0);
        assert_eq!(calculate_quality_score("   \n ", &metadata), 0.0);
        assert_eq!(calculate_quality_score("short", &metadata), 0.1);
    }

    #[test]
    fn test_clean_prose_scores_higher_than_ocr_noise() {
        let metadata = Metadata::default();
        let prose = "The quarterly report covers revenue, costs and hiring. Revenue grew by a modest \
                     margin across every region we operate in. Costs stayed flat.\n\nHiring slowed \
                     in the second half of the year as planned.";
        let noisy = "T  h  e   q u a r t e r l y ..... r3p0rt   ,   c0v3rs ____ r e v e n u e   ;   ";

        let clean = calculate_quality_score(prose, &metadata);
        let garbled = calculate_quality_score(noisy, &metadata);
        assert!(clean > garbled, "{} <= {}", clean, garbled);
        assert!((0.0..=1.0).contains(&clean));
        assert!((0.0..=1.0).contains(&garbled));
    }

    #[test]
    fn test_metadata_adds_bonus() {
        let text = "Plain sentence without much structure but long enough";
        let bare = calculate_quality_score(text, &Metadata::default());
        let rich = calculate_quality_score(
            text,
            &Metadata {
                title: Some("Title".to_string()),
                authors: Some(vec!["A. Author".to_string()]),
                ..Default::default()
            },
        );
        assert!(rich >= bare);
    }
}
