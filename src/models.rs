//! Core data models used throughout kinderchat.
//!
//! These types represent the documents, per-document indexes, and chat
//! messages that flow through the load and retrieval pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A loaded document with its precomputed lexical index.
///
/// Only documents with non-empty `content` survive into the corpus;
/// files that fail extraction are dropped by the loader.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name within its source directory (e.g. `hoc-phi.docx`).
    pub filename: String,
    /// Display title derived from the file name: extension stripped,
    /// dashes replaced with spaces, each word capitalized.
    pub title: String,
    /// Trimmed plain text extracted from the file.
    pub content: String,
    /// Lexical index, built once at load time.
    pub index: DocumentIndex,
}

/// Per-document lexical index, built once at load time and immutable.
///
/// Holds pre-lowered copies of the searchable strings so query-time
/// scoring never re-lowercases document text, plus a token frequency
/// table over the content.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    pub content_lower: String,
    pub title_lower: String,
    pub filename_lower: String,
    /// Normalized token → occurrence count within `content`.
    pub word_frequency: HashMap<String, u32>,
}

/// A transient excerpt of a document's content, the finest-grained
/// ranking unit. Recomputed per query, never cached.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Title of the parent document.
    pub title: String,
    pub text: String,
}

/// One turn of the chat history sent by the frontend.
///
/// `role` is `"user"` or `"bot"`; the generator maps these onto the
/// upstream API's role names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
