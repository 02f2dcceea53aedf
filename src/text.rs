//! Whitespace normalisation shared by the splitter, the section extractor and
//! the LLM request builder.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());
static RE_ANY_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise raw page text as extracted from the PDF.
///
/// Line endings become `\n`, every run of two or more whitespace characters
/// becomes a single space, and the result is trimmed. A lone `\n` survives,
/// so callers can still work line by line.
pub fn normalize_page_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    RE_WHITESPACE_RUN
        .replace_all(&unified, " ")
        .trim()
        .to_string()
}

/// Collapse every whitespace run (including single newlines) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    RE_ANY_WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Join normalised page texts into one document, one page per line block.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .map(normalize_page_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of whitespace-separated words.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}
