//! # kinderchat
//!
//! A document-grounded chat assistant for kindergarten parents.
//!
//! Parent questions are answered by a language model whose reply is
//! grounded in a small, fixed corpus of office documents (tuition
//! sheets, weekly menus, notices) maintained by the school. The heart
//! of the crate is the retrieval pipeline: load and index the corpus
//! once, then per question select a bounded, relevance-ranked excerpt
//! to hand to the generator.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌────────────┐   ┌──────────────┐
//! │  Loader       │──▶│  Indexer   │──▶│ CorpusProvider│
//! │ .doc/.docx/   │   │ word freq  │   │ (single-flight│
//! │ .xlsx dirs    │   │ tables     │   │  memoized)   │
//! └───────────────┘   └────────────┘   └──────┬───────┘
//!                                             │
//!                         question ──▶ search ┤
//!                                             ▼
//!                                   ┌──────────────────┐
//!                                   │ context excerpt  │──▶ Gemini
//!                                   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction (`.doc`, `.docx`, `.xlsx`) |
//! | [`loader`] | Directory scan + concurrent extraction |
//! | [`index`] | Lexical index construction |
//! | [`corpus`] | Single-flight corpus cache |
//! | [`search`] | Two-stage ranking and context assembly |
//! | [`generate`] | Gemini answer generation |
//! | [`tts`] | Text-to-speech proxying |
//! | [`server`] | Chat HTTP server |

pub mod config;
pub mod corpus;
pub mod extract;
pub mod generate;
pub mod index;
pub mod loader;
pub mod models;
pub mod search;
pub mod server;
pub mod tts;
