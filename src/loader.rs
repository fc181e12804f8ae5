//! Document loading pipeline.
//!
//! Scans the configured directories, dispatches each accepted file to
//! its format extractor, and builds the lexical index for every
//! surviving document. Extraction tasks run concurrently; a file that
//! fails to parse is logged and dropped, never aborting the load.
//! Directories that do not exist contribute zero files.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract::{self, DocFormat};
use crate::index::build_index;
use crate::models::Document;

/// Load and index every parseable document under the configured roots.
///
/// The result is sorted by file name so corpus order — and therefore
/// tie-breaking between equally scored documents — is deterministic
/// regardless of task completion order.
pub async fn load_documents(config: &Config) -> Result<Vec<Document>> {
    let mut tasks: JoinSet<Option<Document>> = JoinSet::new();

    for source in &config.docs {
        if !source.dir.exists() {
            debug!(dir = %source.dir.display(), "document directory missing, skipping");
            continue;
        }
        let accepted: Vec<DocFormat> = source
            .extensions
            .iter()
            .filter_map(|e| DocFormat::from_extension(e))
            .collect();

        for entry in WalkDir::new(&source.dir).max_depth(1) {
            let entry = entry
                .with_context(|| format!("failed to enumerate {}", source.dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            // Office lock files left behind by open editors.
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("~$"))
            {
                continue;
            }
            let Some(format) = DocFormat::from_path(&path) else {
                continue;
            };
            if !accepted.contains(&format) {
                continue;
            }
            tasks.spawn(load_one(path, format));
        }
    }

    let mut documents = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "document load task failed to join"),
        }
    }

    documents.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(documents)
}

async fn load_one(path: PathBuf, format: DocFormat) -> Option<Document> {
    match read_and_extract(path.clone(), format).await {
        Ok(doc) => {
            debug!(file = %path.display(), chars = doc.content.chars().count(), "loaded document");
            Some(doc)
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "dropping unreadable document");
            None
        }
    }
}

async fn read_and_extract(path: PathBuf, format: DocFormat) -> Result<Document> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("non-UTF-8 file name"))?;

    let bytes = tokio::fs::read(&path).await?;
    // Extraction is CPU-bound XML/binary parsing; keep it off the
    // async executor.
    let text = tokio::task::spawn_blocking(move || extract::extract_text(&bytes, format)).await??;

    let content = text.trim().to_string();
    if content.is_empty() {
        anyhow::bail!("no extractable text");
    }

    let title = derive_title(&filename);
    let index = build_index(&filename, &title, &content);
    Ok(Document {
        filename,
        title,
        content,
        index,
    })
}

/// Derive a display title from a file name: extension stripped, dashes
/// replaced with spaces, the first letter of each word uppercased.
pub fn derive_title(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);

    let mut title = String::with_capacity(stem.len());
    let mut at_word_start = true;
    for c in stem.chars() {
        let c = if c == '-' { ' ' } else { c };
        if c.is_whitespace() {
            at_word_start = true;
            title.push(c);
        } else if at_word_start {
            title.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            title.push(c);
        }
    }
    title
}
