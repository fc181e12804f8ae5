//! Two-stage lexical search and context assembly.
//!
//! The search algorithm is a pure function of `(query, corpus)`:
//!
//! 1. Normalize and tokenize the query, dropping stop-words.
//! 2. Score every document against the query tokens using the
//!    precomputed [`DocumentIndex`]; keep the top positive scorers.
//! 3. Split the surviving documents into overlapping chunks and score
//!    each chunk by literal token occurrences.
//! 4. Greedily pack the best chunks into a character-bounded excerpt.
//!
//! An empty result is a distinguished outcome, not an error: it tells
//! the caller there is no grounding context for this question.
//!
//! [`DocumentIndex`]: crate::models::DocumentIndex

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::corpus::Corpus;
use crate::index::tokenize;
use crate::models::{Chunk, Document, DocumentIndex};

/// Score added per query token found in the document title.
const TITLE_BONUS: u32 = 10;
/// Score added per query token found in the file name.
const FILENAME_BONUS: u32 = 10;
/// Frequency contribution cap, so long documents cannot dominate on length.
const FREQUENCY_CAP: u32 = 5;
/// Bonus when the full query appears verbatim in the document content.
const DOC_PHRASE_BONUS: u32 = 20;
/// Bonus when the full query appears verbatim in a chunk.
const CHUNK_PHRASE_BONUS: u32 = 15;

/// Separator between excerpt entries, visually distinct for the generator.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// High-frequency Vietnamese function words and discourse particles,
/// removed from queries before scoring.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "là", "và", "của", "có", "cho", "này", "với", "các", "được", "trong",
        "không", "những", "một", "đã", "để", "từ", "theo", "về", "khi", "đến",
        "như", "hay", "hoặc", "nhưng", "vì", "nếu", "thì", "mà", "do", "bị",
        "ở", "ra", "lên", "xuống", "vào", "tôi", "em", "anh", "chị", "ạ",
        "nhé", "nha", "rồi", "rất", "lắm", "quá", "hơn", "nhất", "cũng",
        "sẽ", "đang", "vẫn", "còn", "bao", "giờ", "nào", "gì", "ai", "đâu",
        "sao", "thế", "vậy", "bao nhiêu", "mấy", "xin", "hỏi",
        "biết", "muốn", "cần", "phải", "nên", "thể", "bạn", "tớ",
    ]
    .into_iter()
    .collect()
});

/// Sizing knobs for chunking and context assembly, decoupled from the
/// application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Target chunk length in characters.
    pub chunk_chars: usize,
    /// Characters shared between consecutive chunks.
    pub overlap_chars: usize,
    /// Total character budget for the assembled context.
    pub max_context_chars: usize,
    /// Maximum number of documents surviving the document stage.
    pub max_documents: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            chunk_chars: 500,
            overlap_chars: 50,
            max_context_chars: 3000,
            max_documents: 3,
        }
    }
}

/// Tokenize a query with the index rules, then drop stop-words.
///
/// An empty result means the query carries no lexical content to search
/// on (a greeting, filler, or punctuation-only input).
pub fn tokenize_query(query: &str) -> Vec<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .collect()
}

/// Select and assemble a relevance-ranked excerpt for `query`.
///
/// Returns the empty string when the query has no lexical content, no
/// document scores above zero, or no chunk scores above zero. Repeating
/// the same query against an unchanged corpus yields identical output.
pub fn search(query: &str, corpus: &Corpus, params: &SearchParams) -> String {
    if corpus.is_empty() {
        return String::new();
    }

    let query = query.trim();
    let query_tokens = tokenize_query(query);
    if query_tokens.is_empty() {
        return String::new();
    }
    let query_lower = query.to_lowercase();

    // Document stage: rank whole documents, keep the top positive scorers.
    let mut scored_docs: Vec<(&Document, u32)> = corpus
        .documents()
        .iter()
        .map(|doc| (doc, score_document(&doc.index, &query_tokens, &query_lower)))
        .filter(|(_, score)| *score > 0)
        .collect();
    scored_docs.sort_by(|a, b| b.1.cmp(&a.1));
    scored_docs.truncate(params.max_documents);
    if scored_docs.is_empty() {
        return String::new();
    }

    // Chunk stage: re-rank at sub-document granularity within the survivors.
    let mut scored_chunks: Vec<(Chunk, u32)> = Vec::new();
    for (doc, _) in &scored_docs {
        for text in split_into_chunks(&doc.content, params.chunk_chars, params.overlap_chars) {
            let score = score_chunk(&text, &query_tokens, &query_lower);
            if score > 0 {
                scored_chunks.push((
                    Chunk {
                        title: doc.title.clone(),
                        text,
                    },
                    score,
                ));
            }
        }
    }
    scored_chunks.sort_by(|a, b| b.1.cmp(&a.1));

    build_context(&scored_chunks, params.max_context_chars)
}

/// Additive document score against the query tokens.
///
/// Per token: title and file-name substring hits are worth a flat bonus
/// each, and the content contributes its capped token frequency. An
/// exact-phrase hit of the whole query in the content is rewarded over
/// bag-of-tokens hits.
fn score_document(index: &DocumentIndex, query_tokens: &[String], query_lower: &str) -> u32 {
    let mut score = 0;

    for token in query_tokens {
        if index.title_lower.contains(token.as_str()) {
            score += TITLE_BONUS;
        }
        if index.filename_lower.contains(token.as_str()) {
            score += FILENAME_BONUS;
        }
        if let Some(freq) = index.word_frequency.get(token.as_str()) {
            score += (*freq).min(FREQUENCY_CAP);
        }
    }

    if index.content_lower.contains(query_lower) {
        score += DOC_PHRASE_BONUS;
    }

    score
}

/// Literal-occurrence score of one chunk. Chunks carry no file name, so
/// there is no title/filename bonus at this stage.
fn score_chunk(chunk_text: &str, query_tokens: &[String], query_lower: &str) -> u32 {
    let chunk_lower = chunk_text.to_lowercase();
    let mut score = 0;

    for token in query_tokens {
        score += chunk_lower.matches(token.as_str()).count() as u32;
    }

    if chunk_lower.contains(query_lower) {
        score += CHUNK_PHRASE_BONUS;
    }

    score
}

/// Split content into overlapping chunks of roughly `chunk_chars`
/// characters.
///
/// Prefers cutting just after the newline or sentence-terminating period
/// nearest the target boundary, searching backward within the chunk but
/// never into its first 30%. With no such boundary the cut happens at
/// the raw target length. All cuts land on `char` boundaries; a
/// multi-char grapheme cluster can still be severed by a raw cut.
fn split_into_chunks(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = char_starts.len();
    if total_chars <= chunk_chars {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let byte_at = |char_idx: usize| {
        if char_idx >= total_chars {
            text.len()
        } else {
            char_starts[char_idx]
        }
    };
    let min_break = (chunk_chars * 3) / 10;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total_chars {
        let mut end = (start + chunk_chars).min(total_chars);

        if end < total_chars {
            let window = &text[byte_at(start)..byte_at(end)];
            let break_byte = match (window.rfind('\n'), window.rfind(". ")) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            if let Some(break_byte) = break_byte {
                let break_char = start + window[..break_byte].chars().count();
                if break_char > start + min_break {
                    end = break_char + 1;
                }
            }
        }

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= total_chars {
            break;
        }
        start = end.saturating_sub(overlap_chars);
    }

    chunks
}

/// Greedily pack `[<title>]\n<text>` entries into the character budget.
///
/// Entries arrive sorted by descending chunk score. The joining
/// separator counts against the budget, so the assembled context never
/// exceeds it; if the very first entry alone is over budget it is
/// truncated to exactly the budget rather than emitting nothing.
fn build_context(scored_chunks: &[(Chunk, u32)], max_context_chars: usize) -> String {
    let separator_chars = CONTEXT_SEPARATOR.chars().count();
    let mut selected: Vec<String> = Vec::new();
    let mut total_chars = 0;

    for (chunk, _) in scored_chunks {
        let entry = format!("[{}]\n{}", chunk.title, chunk.text);
        let entry_chars = entry.chars().count();
        let cost = if selected.is_empty() {
            entry_chars
        } else {
            entry_chars + separator_chars
        };

        if total_chars + cost > max_context_chars {
            if selected.is_empty() {
                selected.push(truncate_chars(&entry, max_context_chars));
            }
            break;
        }

        total_chars += cost;
        selected.push(entry);
    }

    selected.join(CONTEXT_SEPARATOR)
}

/// Truncate to at most `max_chars` characters, on a `char` boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}
