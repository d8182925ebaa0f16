//! ast-core-engine — Tree-sitter based parsing core
//!
//! This crate provides high-performance implementations for:
//! - Grammar acquisition and verification (download, hash, cache)
//! - Tree-sitter parsing across a native and a portable (WASM) runtime
//! - Node classification, significance scoring, and metadata extraction
//! - Batch processing of many files with bounded concurrency
//!
//! `Engine` is the composition root: it owns the shared language
//! registry, parser pool, and grammar manager that every file-processing
//! call needs, and exposes the three public operations named in this
//! crate's interface: [`Engine::process_file`], [`Engine::process_batch`],
//! and [`Engine::process_directory`].

pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod grammar;
pub mod language;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod node_id;
pub mod pipeline;
pub mod runtime;
pub mod serializer;
pub mod significance;
pub mod types;
pub mod utils;
pub mod walker;

#[cfg(test)]
mod tests;

pub use error::{EngineError, EngineResult, ErrorKind};
pub use types::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::EngineConfig;
use grammar::GrammarManager;
use language::LanguageRegistry;
use pipeline::Pipeline;
use runtime::ParserPool;

/// `ast-core-engine v<cargo-version>`.
pub fn engine_version() -> String {
    format!("ast-core-engine v{}", env!("CARGO_PKG_VERSION"))
}

/// Owns the registries and pools shared across every file this process
/// parses: the language registry, the parser pool, and the grammar
/// manager. Construct one per process (or per test) and reuse it.
pub struct Engine {
    languages: Arc<LanguageRegistry>,
    parsers: Arc<ParserPool>,
    grammars: Arc<GrammarManager>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let max_parsers_per_language = config.batch.concurrency.max(1);
        Self {
            languages: Arc::new(LanguageRegistry::new()),
            parsers: Arc::new(ParserPool::new(max_parsers_per_language)),
            grammars: Arc::new(GrammarManager::new(config.grammar.clone())),
            config,
        }
    }

    /// Build an engine from environment-variable configuration.
    pub fn with_defaults() -> Self {
        Self::new(config::load_config())
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.languages),
            Arc::clone(&self.parsers),
            Arc::clone(&self.grammars),
            self.config.pipeline.clone(),
        )
    }

    /// Run one file through the per-file pipeline (C10).
    pub async fn process_file(&self, path: impl AsRef<Path>) -> EngineResult<FileResult> {
        self.pipeline().process_file(path.as_ref()).await
    }

    /// Run an explicit list of files through the batch processor (C11).
    pub async fn process_batch(&self, paths: Vec<PathBuf>) -> batch::BatchResult {
        let processor = batch::BatchProcessor::new(Arc::new(self.pipeline()), self.config.batch.clone());
        processor.process_files(paths, None).await
    }

    /// Recursively discover every regular file under `root` and run them
    /// all through the batch processor.
    pub async fn process_directory(
        &self,
        root: impl AsRef<Path>,
    ) -> EngineResult<batch::BatchResult> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(crate::error::io_error(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
            ));
        }

        let paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().to_path_buf())
            .collect();

        Ok(self.process_batch(paths).await)
    }
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[tokio::test]
    async fn process_directory_walks_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("a.rs"), "fn a() {}\n").await.unwrap();
        tokio::fs::write(tmp.path().join("b.rs"), "fn b() {}\n").await.unwrap();

        let engine = Engine::new(EngineConfig::default());
        let batch = engine.process_directory(tmp.path()).await.unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.summary.total_files, 2);
    }

    #[test]
    fn engine_version_includes_the_cargo_version() {
        assert!(engine_version().contains(env!("CARGO_PKG_VERSION")));
    }
}
