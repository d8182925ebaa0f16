//! Per-File Pipeline (C10)
//!
//! admission → hash → parse → enrich (classify → metadata → significance
//! → ids) → validate → serialize → stats, each stage under its own
//! `tokio::time::timeout` deadline.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::instrument;

use crate::config::PipelineConfig;
use crate::error::{EngineError, EngineResult, ErrorLedger};
use crate::grammar::GrammarManager;
use crate::language::LanguageRegistry;
use crate::metadata::complexity::cyclomatic_complexity;
use crate::node_id::{self, Disambiguator};
use crate::runtime::ParserPool;
use crate::types::{AstNode, FileError, FileResult, NodeMetadata, Position, ProcessingStats};
use crate::{classify, metadata, serializer, significance, walker};

/// Everything a single `process_file` call needs: the language registry,
/// parser pool, and grammar manager are shared across every file in a
/// batch, so callers hold them behind `Arc` and clone the pipeline handle
/// cheaply per task.
pub struct Pipeline {
    languages: Arc<LanguageRegistry>,
    parsers: Arc<ParserPool>,
    grammars: Arc<GrammarManager>,
    config: PipelineConfig,
    error_ledger: Arc<ErrorLedger>,
}

impl Pipeline {
    pub fn new(
        languages: Arc<LanguageRegistry>,
        parsers: Arc<ParserPool>,
        grammars: Arc<GrammarManager>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            languages,
            parsers,
            grammars,
            config,
            error_ledger: ErrorLedger::global(),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> EngineResult<FileResult> {
        let start = Instant::now();
        let path_str = path.to_string_lossy().to_string();

        let result = self.process_file_inner(path, &path_str, start).await;
        if let Err(error) = &result {
            self.error_ledger.record(error);
        }
        result
    }

    async fn process_file_inner(
        &self,
        path: &Path,
        path_str: &str,
        start: Instant,
    ) -> EngineResult<FileResult> {
        let stage_timeout = Duration::from_millis(self.config.timeout_ms);

        // 1. admission
        let content = self
            .stage("admission", stage_timeout, path_str, self.admit(path, path_str))
            .await?;

        // 2. hash
        let file_hash = hash_source(&content);

        // 3. language detection
        let language = self
            .languages
            .detect_language(path_str, Some(&content))
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "could not determine a language for {path_str}"
                ))
            })?;

        // 4. parse
        let (nodes, had_syntax_error, error_position) = self
            .stage(
                "parse",
                stage_timeout,
                path_str,
                self.parse_and_enrich(path_str, &content, &language),
            )
            .await?;

        // 5. validate
        let mut result = FileResult {
            file_path: path_str.to_string(),
            language: language.clone(),
            success: !had_syntax_error,
            nodes,
            errors: Vec::new(),
            file_hash,
            processing_stats: ProcessingStats::default(),
            serialized_path: None,
        };

        if had_syntax_error {
            let position = error_position.unwrap_or((0, 0));
            let engine_error = EngineError::Syntax {
                file: path_str.to_string(),
                position: crate::error::ErrorPosition {
                    line: position.0 as u32 + 1,
                    column: position.1 as u32,
                },
                excerpt: content.lines().nth(position.0).unwrap_or("").to_string(),
            };
            result.errors.push(FileError::from_engine_error(&engine_error));
        }

        if self.config.validate_nodes {
            if let Err(e) = serializer::validate(&result) {
                result.errors.push(FileError::from_engine_error(&e));
            }
        }

        // 6. stats
        result.processing_stats = compute_stats(&result.nodes, start.elapsed());

        // 7. serialize
        if self.config.enable_serialization {
            let dest = path.with_extension("ast.json");
            self.stage(
                "serialize",
                stage_timeout,
                path_str,
                self.serialize(&result, &dest),
            )
            .await?;
            result.serialized_path = Some(dest.to_string_lossy().to_string());
        }

        Ok(result)
    }

    async fn stage<T>(
        &self,
        name: &str,
        budget: Duration,
        path_str: &str,
        fut: impl std::future::Future<Output = EngineResult<T>>,
    ) -> EngineResult<T> {
        match timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                file: path_str.to_string(),
                stage: name.to_string(),
                timeout_ms: budget.as_millis() as u64,
            }),
        }
    }

    /// The configured per-file size ceiling, consulted by the batch
    /// processor to pre-filter oversized files into `skipped` rather than
    /// running them through the full pipeline only to fail admission.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.config.max_file_size_bytes
    }

    /// The shared language registry, consulted by the batch processor to
    /// pre-filter files with no detectable language.
    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    async fn admit(&self, path: &Path, path_str: &str) -> EngineResult<String> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| crate::error::io_error(path, e))?;
        if metadata.len() > self.config.max_file_size_bytes {
            return Err(EngineError::SizeLimit {
                file: path_str.to_string(),
                actual: metadata.len(),
                limit: self.config.max_file_size_bytes,
            });
        }
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| crate::error::io_error(path, e))
    }

    async fn parse_and_enrich(
        &self,
        path_str: &str,
        content: &str,
        language: &str,
    ) -> EngineResult<(Vec<AstNode>, bool, Option<(usize, usize)>)> {
        let wasm_artifact = if crate::runtime::has_native_module(language) {
            None
        } else {
            if let Some(descriptor) = self.languages.describe(language) {
                if let Some(url) = descriptor.artifact_url.clone() {
                    let grammars = Arc::clone(&self.grammars);
                    let language = language.to_string();
                    tokio::task::spawn_blocking(move || grammars.acquire(&language, &url, None))
                        .await
                        .map_err(|e| EngineError::Runtime {
                            file: path_str.to_string(),
                            message: e.to_string(),
                        })??;
                }
            }
            Some(self.grammars.artifact_path_for(language))
        };

        let mut parser = self.parsers.checkout(language, wasm_artifact.as_deref())?;
        let tree = parser.parse(content, None).ok_or_else(|| EngineError::Runtime {
            file: path_str.to_string(),
            message: "tree-sitter returned no tree".to_string(),
        })?;

        let had_syntax_error = walker::has_syntax_error(&tree);
        let error_position = if had_syntax_error {
            walker::first_error_position(&tree)
        } else {
            None
        };

        let nodes = self.build_nodes(path_str, content, language, &tree);
        self.parsers.checkin(language, parser);

        Ok((nodes, had_syntax_error, error_position))
    }

    fn build_nodes(
        &self,
        path_str: &str,
        content: &str,
        language: &str,
        tree: &tree_sitter::Tree,
    ) -> Vec<AstNode> {
        let walked = walker::walk(tree);
        let mut nodes = Vec::with_capacity(walked.len());
        let mut scopes: Vec<Vec<String>> = Vec::with_capacity(walked.len());
        let mut disambiguator = Disambiguator::new();

        for (index, entry) in walked.iter().enumerate() {
            let raw_kind = entry.node.kind();
            let node_type = classify::classify(language, raw_kind)
                .unwrap_or(crate::types::NodeType::Statement);

            let start = entry.node.start_position();
            let end = entry.node.end_position();
            let start_pos = Position::new(start.row as u32 + 1, start.column as u32);
            let end_pos = Position::new(end.row as u32 + 1, end.column as u32);

            let text = entry
                .node
                .utf8_text(content.as_bytes())
                .unwrap_or("")
                .to_string();
            let name = extract_name(entry.node, content);

            let scope = match entry.parent_index {
                Some(parent_index) => {
                    let mut parent_scope = scopes[parent_index].clone();
                    if let Some(n) = &name {
                        parent_scope.push(n.clone());
                    }
                    parent_scope
                }
                None => Vec::new(),
            };
            scopes.push(scope.clone());

            let preceding_comment = preceding_comment_text(entry.node, content);

            let node_metadata = if self.config.extract_metadata {
                metadata::extract(
                    language,
                    node_type,
                    &text,
                    preceding_comment.as_deref(),
                    &scope,
                    raw_kind,
                )
            } else {
                NodeMetadata {
                    language: language.to_string(),
                    ..Default::default()
                }
            };

            let signature = if self.config.generate_signatures {
                Some(metadata::extract_signature(language, &text))
            } else {
                None
            };

            let significance = if self.config.calculate_significance {
                significance::calculate(node_type, &node_metadata.modifiers, node_metadata.docstring.is_some())
            } else {
                crate::types::Significance::Minimal
            };

            let complexity = if self.config.calculate_complexity {
                let descendants = collect_descendants(entry.node);
                let descendant_kinds: Vec<&str> = descendants.iter().map(|n| n.kind()).collect();
                let logical_operator_texts: Vec<String> = descendants
                    .iter()
                    .filter(|n| matches!(n.kind(), "binary_expression" | "binary_operator"))
                    .filter_map(|n| n.utf8_text(content.as_bytes()).ok())
                    .map(|s| s.to_string())
                    .collect();
                Some(cyclomatic_complexity(
                    descendant_kinds.into_iter(),
                    &logical_operator_texts,
                ))
            } else {
                None
            };

            let candidate_id = if self.config.generate_ids {
                node_id::compute(path_str, node_type, start_pos, end_pos, name.as_deref(), language)
            } else {
                index.to_string()
            };
            let id = disambiguator.resolve(candidate_id);

            nodes.push(AstNode {
                id,
                node_type,
                name,
                file_path: path_str.to_string(),
                start: start_pos,
                end: end_pos,
                parent: None,
                children: Vec::new(),
                metadata: node_metadata,
                source_text: if self.config.include_source_text {
                    Some(text)
                } else {
                    None
                },
                signature,
                significance,
                complexity,
            });
        }

        link_parents_and_children(&mut nodes, &walked);
        nodes
    }

    async fn serialize(&self, result: &FileResult, dest: &Path) -> EngineResult<()> {
        let dest = dest.to_path_buf();
        let result = result.clone();
        tokio::task::spawn_blocking(move || serializer::serialize_to_file(&result, &dest))
            .await
            .map_err(|e| EngineError::Runtime {
                file: dest_display(&dest),
                message: e.to_string(),
            })?
    }
}

fn dest_display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn link_parents_and_children(nodes: &mut [AstNode], walked: &[walker::WalkedNode]) {
    let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for (index, entry) in walked.iter().enumerate() {
        if let Some(parent_index) = entry.parent_index {
            let child_id = ids[index].clone();
            let parent_id = ids[parent_index].clone();
            nodes[index].parent = Some(parent_id);
            nodes[parent_index].children.push(child_id);
        }
    }
}

/// The text of `node`'s immediately preceding sibling, if that sibling is
/// a comment. Does not scan further back past a non-comment sibling.
fn preceding_comment_text(node: tree_sitter::Node, source: &str) -> Option<String> {
    let sibling = node.prev_sibling()?;
    if !matches!(sibling.kind(), "comment" | "line_comment" | "block_comment") {
        return None;
    }
    sibling.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

/// Every descendant of `node` (not including `node` itself), gathered via
/// an explicit stack so arbitrarily deep subtrees don't blow the call
/// stack.
fn collect_descendants(node: tree_sitter::Node) -> Vec<tree_sitter::Node> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    let mut stack: Vec<tree_sitter::Node> = node.children(&mut cursor).collect();
    while let Some(current) = stack.pop() {
        let mut child_cursor = current.walk();
        stack.extend(current.children(&mut child_cursor));
        out.push(current);
    }
    out
}

fn extract_name(node: tree_sitter::Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
}

fn hash_source(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn compute_stats(nodes: &[AstNode], elapsed: Duration) -> ProcessingStats {
    let mut nodes_by_type = std::collections::HashMap::new();
    let mut nodes_by_significance = std::collections::HashMap::new();

    for node in nodes {
        *nodes_by_type.entry(node.node_type.as_str().to_string()).or_insert(0) += 1;
        *nodes_by_significance
            .entry(format!("{:?}", node.significance).to_uppercase())
            .or_insert(0) += 1;
    }

    let elapsed_ms = elapsed.as_millis() as u64;
    let nodes_per_second = if elapsed_ms > 0 {
        nodes.len() as f64 / (elapsed_ms as f64 / 1000.0)
    } else {
        nodes.len() as f64
    };

    ProcessingStats {
        total_nodes: nodes.len(),
        nodes_by_type,
        nodes_by_significance,
        elapsed_ms,
        peak_memory_delta_bytes: 0,
        nodes_per_second,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrammarPolicy;

    fn pipeline(tmp: &Path) -> Pipeline {
        Pipeline::new(
            Arc::new(LanguageRegistry::new()),
            Arc::new(ParserPool::new(4)),
            Arc::new(GrammarManager::new(GrammarPolicy {
                cache_dir: tmp.join("grammars").to_string_lossy().to_string(),
                max_download_attempts: 1,
                retry_base_delay_ms: 1,
            })),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn process_file_parses_a_small_rust_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("main.rs");
        tokio::fs::write(&path, "pub fn main() {\n    let x = 1;\n}\n")
            .await
            .unwrap();

        let result = pipeline(tmp.path()).process_file(&path).await.unwrap();
        assert_eq!(result.language, "rust");
        assert!(result.success);
        assert!(!result.nodes.is_empty());
        assert!(result.nodes.iter().any(|n| n.node_type == crate::types::NodeType::Function));
    }

    #[tokio::test]
    async fn process_file_reports_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.rs");
        tokio::fs::write(&path, "fn x() {}\n").await.unwrap();

        let mut pl = pipeline(tmp.path());
        pl.config.max_file_size_bytes = 1;
        let err = pl.process_file(&path).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SizeLimitError);
    }

    #[tokio::test]
    async fn process_file_flags_syntax_errors_without_failing_the_pipeline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.rs");
        tokio::fs::write(&path, "fn main( {\n").await.unwrap();

        let result = pipeline(tmp.path()).process_file(&path).await.unwrap();
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }
}
