//! Per-document lexical index construction.
//!
//! [`build_index`] is pure and infallible: a document that reached this
//! stage already has valid text, and indexing never touches I/O. The
//! index is built once at load time so query-time scoring works entirely
//! on pre-lowered strings and a precomputed token frequency table.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::models::DocumentIndex;

/// Normalize and tokenize free text.
///
/// Lower-cases, applies Unicode NFC normalization, replaces every
/// character that is not a letter or digit (any script) with a space,
/// splits on whitespace runs, and discards tokens of one character or
/// less. The same rules apply to document content at index time and to
/// queries at search time, so tokens compare exactly.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.to_lowercase().nfc().collect();
    let cleaned: String = normalized
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .map(str::to_owned)
        .collect()
}

/// Build the immutable [`DocumentIndex`] for a document.
pub fn build_index(filename: &str, title: &str, content: &str) -> DocumentIndex {
    let mut word_frequency: HashMap<String, u32> = HashMap::new();
    for token in tokenize(content) {
        *word_frequency.entry(token).or_insert(0) += 1;
    }

    DocumentIndex {
        content_lower: content.to_lowercase(),
        title_lower: title.to_lowercase(),
        filename_lower: filename.to_lowercase(),
        word_frequency,
    }
}
