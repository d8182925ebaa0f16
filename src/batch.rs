//! Batch Processor (C11)
//!
//! Concurrency-bounded processing of many files through [`crate::pipeline::Pipeline`]:
//! a `tokio::sync::Semaphore` caps concurrent files, a `CancellationToken`
//! lets callers stop early, and an `mpsc` channel reports progress as files
//! complete. A content-addressed `(path, hash)` LRU cache (`moka`) lets a
//! re-run skip unchanged files, errors aggregate per-kind into the returned
//! [`BatchResult`], and `max_memory_mb` gates permit acquisition behind a
//! soft memory back-pressure check.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::sync::{mpsc, Semaphore};

use crate::config::BatchConfig;
use crate::error::{ErrorKind, EngineError};
use crate::pipeline::Pipeline;
use crate::types::FileResult;

/// Progress snapshot emitted as files finish.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub cached_files: usize,
    pub current_file: Option<String>,
    pub elapsed: Duration,
}

impl BatchProgress {
    fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_files: 0,
            failed_files: 0,
            cached_files: 0,
            current_file: None,
            elapsed: Duration::from_secs(0),
        }
    }

    pub fn completion_percentage(&self) -> f64 {
        if self.total_files == 0 {
            return 100.0;
        }
        (self.processed_files as f64 / self.total_files as f64) * 100.0
    }
}

/// Cooperative cancellation flag shared across every in-flight file task.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The outcome of running one file through the pipeline, including
/// whether it was served from cache or skipped before the pipeline ran.
#[derive(Clone)]
pub struct BatchFileOutcome {
    pub path: PathBuf,
    pub result: Option<FileResult>,
    pub error: Option<EngineError>,
    pub from_cache: bool,
    pub skipped: bool,
}

/// Summary counters over one batch run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One error kind's aggregate across a batch run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorSummaryEntry {
    pub message_template: String,
    pub count: u64,
    pub sample_files: Vec<String>,
}

const MAX_SAMPLE_FILES_PER_KIND: usize = 5;

/// Memory usage sampled around a batch run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchMemoryStats {
    pub before_mb: u64,
    pub after_mb: u64,
    pub peak_delta_mb: i64,
}

/// Latency percentiles for one language within a batch run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LanguageStats {
    pub count: usize,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

/// Latency percentiles across a batch run, gated behind
/// `BatchConfig::collect_performance_metrics`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub by_language: HashMap<String, LanguageStats>,
    pub rate_history: Vec<f64>,
}

/// Content-addressed cache hit/miss counters, plus the cache's current
/// entry count.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// The aggregate result of one `process_files` call: every per-file
/// outcome, in the same order as the input paths, plus summary counters,
/// a per-kind error summary, memory stats, and (optionally) performance
/// percentiles.
pub struct BatchResult {
    pub results: Vec<BatchFileOutcome>,
    pub summary: BatchSummary,
    pub error_summary: HashMap<ErrorKind, ErrorSummaryEntry>,
    pub memory: BatchMemoryStats,
    pub performance: Option<PerformanceStats>,
}

/// Compute the cache key for `(path, hash)`. `dedupe_by_hash` extends the
/// key to the hash alone, letting distinct paths with identical content
/// share one cache entry; the key is otherwise always path-scoped, so the
/// cache is consulted unconditionally on the default `(path, hash)` key.
fn cache_key(path: &str, hash: &str, dedupe_by_hash: bool) -> String {
    if dedupe_by_hash {
        hash.to_string()
    } else {
        format!("{path}\u{0}{hash}")
    }
}

pub struct BatchProcessor {
    pipeline: Arc<Pipeline>,
    config: BatchConfig,
    cache: Cache<String, FileResult>,
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
    pub cancellation_token: CancellationToken,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<Pipeline>, config: BatchConfig) -> Self {
        let cache = Cache::builder().max_capacity(10_000).build();
        Self {
            pipeline,
            config,
            cache,
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Process every file in `paths`, honoring `config.concurrency`,
    /// `config.continue_on_error`, and `config.max_memory_mb`.
    /// `on_progress` is invoked after each file completes. Results
    /// preserve the input order regardless of completion order.
    pub async fn process_files(
        &self,
        paths: Vec<PathBuf>,
        on_progress: Option<Box<dyn Fn(BatchProgress) + Send + Sync>>,
    ) -> BatchResult {
        let total = paths.len();
        let memory_before_mb = sampled_memory_mb();

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, BatchFileOutcome)>();
        let start = Instant::now();
        let processed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let cached = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::with_capacity(total);
        for (index, path) in paths.into_iter().enumerate() {
            if self.cancellation_token.is_cancelled() {
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let cache = self.cache.clone();
            let cache_hits = Arc::clone(&self.cache_hits);
            let cache_misses = Arc::clone(&self.cache_misses);
            let cancellation = self.cancellation_token.clone();
            let continue_on_error = self.config.continue_on_error;
            let dedupe_by_hash = self.config.dedupe_by_hash;
            let max_memory_mb = self.config.max_memory_mb;
            let tx = tx.clone();

            let task = tokio::spawn(async move {
                wait_for_memory_headroom(max_memory_mb).await;
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                if cancellation.is_cancelled() {
                    return;
                }

                let outcome = process_one(
                    &pipeline,
                    &cache,
                    &cache_hits,
                    &cache_misses,
                    &path,
                    dedupe_by_hash,
                )
                .await;
                if outcome.error.is_some() && !outcome.skipped && !continue_on_error {
                    cancellation.cancel();
                }
                let _ = tx.send((index, outcome));
            });
            tasks.push(task);
        }
        drop(tx);

        let mut received = Vec::with_capacity(total);
        while let Some((index, outcome)) = rx.recv().await {
            if outcome.skipped {
                // neither processed nor failed
            } else if outcome.error.is_some() {
                failed.fetch_add(1, Ordering::SeqCst);
            } else {
                processed.fetch_add(1, Ordering::SeqCst);
            }
            if outcome.from_cache {
                cached.fetch_add(1, Ordering::SeqCst);
            }

            if let Some(callback) = &on_progress {
                callback(BatchProgress {
                    total_files: total,
                    processed_files: processed.load(Ordering::SeqCst),
                    failed_files: failed.load(Ordering::SeqCst),
                    cached_files: cached.load(Ordering::SeqCst),
                    current_file: Some(outcome.path.to_string_lossy().to_string()),
                    elapsed: start.elapsed(),
                });
            }
            received.push((index, outcome));
        }

        for task in tasks {
            let _ = task.await;
        }

        received.sort_by_key(|(index, _)| *index);
        let results: Vec<BatchFileOutcome> = received.into_iter().map(|(_, o)| o).collect();

        let summary = BatchSummary {
            total_files: total,
            successful: results.iter().filter(|o| !o.skipped && o.error.is_none()).count(),
            failed: results.iter().filter(|o| !o.skipped && o.error.is_some()).count(),
            skipped: results.iter().filter(|o| o.skipped).count(),
        };

        let error_summary = build_error_summary(&results);
        let memory_after_mb = sampled_memory_mb();
        let memory = BatchMemoryStats {
            before_mb: memory_before_mb,
            after_mb: memory_after_mb,
            peak_delta_mb: memory_after_mb as i64 - memory_before_mb as i64,
        };

        let performance = if self.config.collect_performance_metrics {
            Some(build_performance_stats(&results))
        } else {
            None
        };

        BatchResult {
            results,
            summary,
            error_summary,
            memory,
            performance,
        }
    }

    /// Cache hit/miss counters and current entry count.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.cache_hits.load(Ordering::SeqCst),
            misses: self.cache_misses.load(Ordering::SeqCst),
            entries: self.cache.entry_count(),
        }
    }

    /// Drop every cached result, forcing the next run to reprocess every
    /// file.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        self.cache_hits.store(0, Ordering::SeqCst);
        self.cache_misses.store(0, Ordering::SeqCst);
    }
}

fn build_error_summary(
    results: &[BatchFileOutcome],
) -> HashMap<ErrorKind, ErrorSummaryEntry> {
    let mut summary: HashMap<ErrorKind, ErrorSummaryEntry> = HashMap::new();
    for outcome in results {
        let Some(error) = &outcome.error else { continue };
        let entry = summary.entry(error.kind()).or_insert_with(|| ErrorSummaryEntry {
            message_template: error.to_string(),
            count: 0,
            sample_files: Vec::new(),
        });
        entry.count += 1;
        if entry.sample_files.len() < MAX_SAMPLE_FILES_PER_KIND {
            entry
                .sample_files
                .push(outcome.path.to_string_lossy().to_string());
        }
    }
    summary
}

fn build_performance_stats(results: &[BatchFileOutcome]) -> PerformanceStats {
    let mut all_elapsed: Vec<u64> = Vec::new();
    let mut by_language: HashMap<String, Vec<u64>> = HashMap::new();

    for outcome in results {
        if let Some(result) = &outcome.result {
            let elapsed = result.processing_stats.elapsed_ms;
            all_elapsed.push(elapsed);
            by_language
                .entry(result.language.clone())
                .or_default()
                .push(elapsed);
        }
    }

    all_elapsed.sort_unstable();
    let rate_history: Vec<f64> = results
        .iter()
        .filter_map(|o| o.result.as_ref())
        .map(|r| r.processing_stats.nodes_per_second)
        .collect();

    let by_language = by_language
        .into_iter()
        .map(|(language, mut elapsed)| {
            elapsed.sort_unstable();
            let stats = LanguageStats {
                count: elapsed.len(),
                p50_ms: percentile(&elapsed, 0.50),
                p95_ms: percentile(&elapsed, 0.95),
                p99_ms: percentile(&elapsed, 0.99),
            };
            (language, stats)
        })
        .collect();

    PerformanceStats {
        p50_ms: percentile(&all_elapsed, 0.50),
        p95_ms: percentile(&all_elapsed, 0.95),
        p99_ms: percentile(&all_elapsed, 0.99),
        by_language,
        rate_history,
    }
}

fn percentile(sorted: &[u64], pct: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (((sorted.len() - 1) as f64) * pct).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Whether `path` should be skipped before running the full pipeline:
/// oversized files and files with no detectable language never reach
/// `Pipeline::process_file`.
async fn precheck(pipeline: &Pipeline, path: &PathBuf, path_str: &str) -> Option<EngineError> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if metadata.len() > pipeline.max_file_size_bytes() {
        return Some(EngineError::SizeLimit {
            file: path_str.to_string(),
            actual: metadata.len(),
            limit: pipeline.max_file_size_bytes(),
        });
    }

    let content = tokio::fs::read_to_string(path).await.ok();
    if pipeline
        .languages()
        .detect_language(path_str, content.as_deref())
        .is_none()
    {
        return Some(EngineError::Config(format!(
            "unsupported file extension/content for {path_str}"
        )));
    }

    None
}

async fn process_one(
    pipeline: &Pipeline,
    cache: &Cache<String, FileResult>,
    cache_hits: &AtomicU64,
    cache_misses: &AtomicU64,
    path: &PathBuf,
    dedupe_by_hash: bool,
) -> BatchFileOutcome {
    let path_str = path.to_string_lossy().to_string();

    if let Some(error) = precheck(pipeline, path, &path_str).await {
        return BatchFileOutcome {
            path: path.clone(),
            result: None,
            error: Some(error),
            from_cache: false,
            skipped: true,
        };
    }

    if let Ok(content) = tokio::fs::read(path).await {
        let hash = quick_hash(&content);
        let key = cache_key(&path_str, &hash, dedupe_by_hash);
        if let Some(cached) = cache.get(&key) {
            cache_hits.fetch_add(1, Ordering::SeqCst);
            return BatchFileOutcome {
                path: path.clone(),
                result: Some(cached),
                error: None,
                from_cache: true,
                skipped: false,
            };
        }
        cache_misses.fetch_add(1, Ordering::SeqCst);
        let outcome = run(pipeline, path).await;
        if let Some(result) = &outcome.result {
            cache.insert(key, result.clone());
        }
        return outcome;
    }
    run(pipeline, path).await
}

async fn run(pipeline: &Pipeline, path: &PathBuf) -> BatchFileOutcome {
    match pipeline.process_file(path).await {
        Ok(result) => BatchFileOutcome {
            path: path.clone(),
            result: Some(result),
            error: None,
            from_cache: false,
            skipped: false,
        },
        Err(error) => BatchFileOutcome {
            path: path.clone(),
            result: None,
            error: Some(error),
            from_cache: false,
            skipped: false,
        },
    }
}

fn quick_hash(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

fn sampled_memory_mb() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.used_memory() / (1024 * 1024)
}

/// Soft back-pressure: if a memory ceiling is configured, poll system
/// memory usage and yield until there's headroom before acquiring a
/// semaphore permit. Grounded on `performance_monitor.rs`'s existing use
/// of `sysinfo` for memory sampling.
async fn wait_for_memory_headroom(max_memory_mb: Option<u64>) {
    let Some(limit_mb) = max_memory_mb else {
        return;
    };
    for _ in 0..50 {
        let used_mb = sampled_memory_mb();
        if used_mb < limit_mb {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GrammarPolicy, PipelineConfig};
    use crate::grammar::GrammarManager;
    use crate::language::LanguageRegistry;
    use crate::runtime::ParserPool;

    fn processor(tmp: &std::path::Path, config: BatchConfig) -> BatchProcessor {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(LanguageRegistry::new()),
            Arc::new(ParserPool::new(4)),
            Arc::new(GrammarManager::new(GrammarPolicy {
                cache_dir: tmp.join("grammars").to_string_lossy().to_string(),
                max_download_attempts: 1,
                retry_base_delay_ms: 1,
            })),
            PipelineConfig::default(),
        ));
        BatchProcessor::new(pipeline, config)
    }

    #[tokio::test]
    async fn processes_every_file_and_reports_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = tmp.path().join(format!("f{i}.rs"));
            tokio::fs::write(&path, "fn main() {}\n").await.unwrap();
            paths.push(path);
        }

        let processor = processor(tmp.path(), BatchConfig::default());
        let batch = processor.process_files(paths, None).await;
        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.summary.total_files, 3);
        assert_eq!(batch.summary.successful, 3);
        assert!(batch.results.iter().all(|o| o.error.is_none()));
    }

    #[tokio::test]
    async fn default_config_serves_the_second_run_from_the_path_hash_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.rs");
        tokio::fs::write(&path, "fn main() {}\n").await.unwrap();

        let processor = processor(tmp.path(), BatchConfig::default());

        let first = processor.process_files(vec![path.clone()], None).await;
        assert!(!first.results[0].from_cache);
        let second = processor.process_files(vec![path], None).await;
        assert!(second.results[0].from_cache);
    }

    #[tokio::test]
    async fn dedupe_by_hash_shares_a_cache_entry_across_distinct_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.rs");
        let b = tmp.path().join("b.rs");
        tokio::fs::write(&a, "fn main() {}\n").await.unwrap();
        tokio::fs::write(&b, "fn main() {}\n").await.unwrap();

        let mut config = BatchConfig::default();
        config.dedupe_by_hash = true;
        let processor = processor(tmp.path(), config);

        let first = processor.process_files(vec![a], None).await;
        assert!(!first.results[0].from_cache);
        let second = processor.process_files(vec![b], None).await;
        assert!(second.results[0].from_cache);
    }

    #[tokio::test]
    async fn continue_on_error_false_cancels_remaining_work() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.rs");
        let present = tmp.path().join("present.rs");
        tokio::fs::write(&present, "fn main() {}\n").await.unwrap();

        let mut config = BatchConfig::default();
        config.continue_on_error = false;
        config.concurrency = 1;
        let processor = processor(tmp.path(), config);

        let batch = processor
            .process_files(vec![missing, present], None)
            .await;
        assert!(batch.results.iter().any(|o| o.error.is_some()));
    }

    #[tokio::test]
    async fn oversized_and_unsupported_files_are_classified_as_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let oversized = tmp.path().join("big.rs");
        tokio::fs::write(&oversized, "x".repeat(64)).await.unwrap();
        let unsupported = tmp.path().join("notes.txt");
        tokio::fs::write(&unsupported, "just some text").await.unwrap();
        let fine = tmp.path().join("fine.rs");
        tokio::fs::write(&fine, "fn main() {}\n").await.unwrap();

        let mut pipeline_config = PipelineConfig::default();
        pipeline_config.max_file_size_bytes = 32;
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(LanguageRegistry::new()),
            Arc::new(ParserPool::new(4)),
            Arc::new(GrammarManager::new(GrammarPolicy {
                cache_dir: tmp.path().join("grammars").to_string_lossy().to_string(),
                max_download_attempts: 1,
                retry_base_delay_ms: 1,
            })),
            pipeline_config,
        ));
        let processor = BatchProcessor::new(pipeline, BatchConfig::default());

        let batch = processor
            .process_files(vec![oversized, unsupported, fine], None)
            .await;
        assert_eq!(batch.summary.skipped, 2);
        assert_eq!(batch.summary.successful, 1);
        assert_eq!(
            batch.error_summary.get(&crate::error::ErrorKind::SizeLimitError).unwrap().count,
            1
        );
    }

    #[tokio::test]
    async fn cache_stats_track_hits_and_misses_and_clear_resets_them() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.rs");
        tokio::fs::write(&path, "fn main() {}\n").await.unwrap();

        let processor = processor(tmp.path(), BatchConfig::default());
        processor.process_files(vec![path.clone()], None).await;
        processor.process_files(vec![path], None).await;

        let stats = processor.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        processor.clear_cache();
        let cleared = processor.cache_stats();
        assert_eq!(cleared.hits, 0);
        assert_eq!(cleared.misses, 0);
    }
}
