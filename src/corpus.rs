//! Process-wide corpus with single-flight loading.
//!
//! [`CorpusProvider`] wraps the expensive load + index pipeline behind a
//! memoized cell: the first caller triggers the load, concurrent callers
//! await the same in-flight result, and a successful corpus is retained
//! for the process lifetime. A failed load leaves the cell unset so a
//! later call can retry — there is no poisoned in-flight state.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;
use crate::loader;
use crate::models::Document;

/// The full in-memory set of loaded, indexed documents.
///
/// Built at most once per process, immutable afterwards, shared by all
/// concurrent queries without locking.
#[derive(Debug)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Injectable accessor guaranteeing the load pipeline runs at most once.
pub struct CorpusProvider {
    config: Arc<Config>,
    cell: OnceCell<Arc<Corpus>>,
}

impl CorpusProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Return the corpus, loading it on first use.
    ///
    /// Callers arriving while a load is in flight await the same result
    /// rather than triggering a second load.
    pub async fn get(&self) -> Result<Arc<Corpus>> {
        self.cell
            .get_or_try_init(|| async {
                let started = Instant::now();
                let documents = loader::load_documents(&self.config).await?;
                info!(
                    documents = documents.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "corpus loaded"
                );
                Ok(Arc::new(Corpus::new(documents)))
            })
            .await
            .cloned()
    }

    /// Eagerly load the corpus, e.g. at server startup.
    pub async fn warm(&self) -> Result<()> {
        self.get().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config(dir: &std::path::Path) -> Arc<Config> {
        Arc::new(Config::for_docs_dir(dir.to_path_buf()))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = CorpusProvider::new(empty_config(tmp.path()));

        let (a, b, c) = tokio::join!(provider.get(), provider.get(), provider.get());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn missing_directory_yields_empty_corpus_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let provider = CorpusProvider::new(empty_config(&missing));

        let corpus = provider.get().await.unwrap();
        assert!(corpus.is_empty());
    }
}
