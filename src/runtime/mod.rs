//! Runtime Detector & Bindings (C3)
//!
//! A pool of `tree_sitter::Parser` instances per language (`DashMap<language,
//! Vec<Parser>>`, FIFO reuse). `checkout` prefers a statically-linked
//! module and falls back to loading a `.wasm` artifact (produced by
//! [`crate::grammar::GrammarManager`]) through tree-sitter's WASM engine
//! when no native module is compiled in.

use std::path::Path;

use dashmap::DashMap;
use tree_sitter::{Parser, WasmStore};
use wasmtime::Engine as WasmEngine;

use crate::error::{EngineError, EngineResult};

/// Maps a language name to its statically-linked grammar, when one of the
/// `tree-sitter-*` crates in this workspace's dependency table covers it.
fn native_language(name: &str) -> Option<tree_sitter::Language> {
    match name {
        "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        "cpp" => Some(tree_sitter_cpp::LANGUAGE.into()),
        "c" => Some(tree_sitter_c::LANGUAGE.into()),
        "c_sharp" => Some(tree_sitter_c_sharp::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

/// `true` if `language` has a statically-linked grammar in this binary.
pub fn has_native_module(language: &str) -> bool {
    native_language(language).is_some()
}

/// Per-language pool of ready-to-use parsers, reused across files.
pub struct ParserPool {
    pooled: DashMap<String, Vec<Parser>>,
    max_pool_size: usize,
}

impl ParserPool {
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            pooled: DashMap::new(),
            max_pool_size,
        }
    }

    /// Borrow a parser for `language`, building one if the pool is empty.
    /// `wasm_artifact` is consulted only when no native module covers the
    /// language.
    pub fn checkout(&self, language: &str, wasm_artifact: Option<&Path>) -> EngineResult<Parser> {
        if let Some(mut bucket) = self.pooled.get_mut(language) {
            if let Some(parser) = bucket.pop() {
                return Ok(parser);
            }
        }
        self.build_parser(language, wasm_artifact)
    }

    /// Return a parser to the pool for reuse; dropped if the pool is full.
    pub fn checkin(&self, language: &str, parser: Parser) {
        let mut bucket = self.pooled.entry(language.to_string()).or_default();
        if bucket.len() < self.max_pool_size {
            bucket.push(parser);
        }
    }

    fn build_parser(&self, language: &str, wasm_artifact: Option<&Path>) -> EngineResult<Parser> {
        let mut parser = Parser::new();

        if let Some(lang) = native_language(language) {
            parser
                .set_language(&lang)
                .map_err(|e| parser_load_error(language, Some(e.to_string()), None, None))?;
            return Ok(parser);
        }

        let path = wasm_artifact.ok_or_else(|| {
            parser_load_error(
                language,
                None,
                Some("no native module and no portable artifact configured".to_string()),
                None,
            )
        })?;

        let artifact_path = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| crate::error::io_error(path, e))?;

        let engine = WasmEngine::default();
        let mut store = WasmStore::new(engine).map_err(|e| {
            parser_load_error(language, None, Some(e.to_string()), Some(artifact_path.clone()))
        })?;
        let lang = store.load_language(language, &bytes).map_err(|e| {
            parser_load_error(language, None, Some(e.to_string()), Some(artifact_path.clone()))
        })?;
        parser.set_wasm_store(store).map_err(|e| {
            parser_load_error(language, None, Some(e.to_string()), Some(artifact_path.clone()))
        })?;
        parser
            .set_language(&lang)
            .map_err(|e| parser_load_error(language, None, Some(e.to_string()), Some(artifact_path)))?;

        Ok(parser)
    }
}

fn parser_load_error(
    language: &str,
    native_cause: Option<String>,
    portable_cause: Option<String>,
    artifact_path: Option<String>,
) -> EngineError {
    EngineError::ParserLoad {
        language: language.to_string(),
        native_cause,
        portable_cause,
        artifact_path,
    }
}
