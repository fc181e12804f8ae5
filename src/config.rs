//! TOML configuration parsing and validation.
//!
//! All settings live in one file selected by the global `--config` flag.
//! API keys are deliberately *not* part of the file: the config names
//! the environment variables that hold them, and the clients resolve
//! those at call time.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::DocFormat;
use crate::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Document source directories, scanned once at corpus load.
    pub docs: Vec<DocsDirConfig>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub tts: TtsConfig,
}

/// One source directory with its accepted file extensions.
#[derive(Debug, Deserialize, Clone)]
pub struct DocsDirConfig {
    pub dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["doc".to_string(), "docx".to_string(), "xlsx".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Total character budget for the assembled context.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// How many documents survive the document-scoring stage.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            max_documents: default_max_documents(),
        }
    }
}

fn default_max_context_chars() -> usize {
    3000
}
fn default_max_documents() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the Gemini API key.
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
    /// Override for the Gemini API base URL (tests point this at a mock).
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_gemini_key_env(),
            endpoint: default_gemini_endpoint(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// Environment variable holding the Google TTS API key.
    #[serde(default = "default_tts_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            language_code: default_language_code(),
            api_key_env: default_tts_key_env(),
            endpoint: default_tts_endpoint(),
        }
    }
}

fn default_voice() -> String {
    "vi-VN-Neural2-A".to_string()
}
fn default_language_code() -> String {
    "vi-VN".to_string()
}
fn default_tts_key_env() -> String {
    "GOOGLE_TTS_API_KEY".to_string()
}
fn default_tts_endpoint() -> String {
    "https://texttospeech.googleapis.com".to_string()
}

impl Config {
    /// Minimal config over a single document directory with defaults
    /// everywhere else. Used by tests and the integration suite.
    pub fn for_docs_dir(dir: PathBuf) -> Self {
        Self {
            docs: vec![DocsDirConfig {
                dir,
                extensions: default_extensions(),
            }],
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
            generator: GeneratorConfig::default(),
            tts: TtsConfig::default(),
        }
    }

    /// Sizing knobs for the search pipeline.
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            chunk_chars: self.chunking.chunk_chars,
            overlap_chars: self.chunking.overlap_chars,
            max_context_chars: self.retrieval.max_context_chars,
            max_documents: self.retrieval.max_documents,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.docs.is_empty() {
        anyhow::bail!("at least one [[docs]] directory must be configured");
    }

    for source in &config.docs {
        for ext in &source.extensions {
            if DocFormat::from_extension(ext).is_none() {
                anyhow::bail!(
                    "Unsupported extension '{}' for {} — supported: doc, docx, xlsx",
                    ext,
                    source.dir.display()
                );
            }
        }
    }

    if config.chunking.chunk_chars == 0 {
        anyhow::bail!("chunking.chunk_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.chunk_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.chunk_chars");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }
    if config.retrieval.max_documents == 0 {
        anyhow::bail!("retrieval.max_documents must be > 0");
    }

    Ok(config)
}
