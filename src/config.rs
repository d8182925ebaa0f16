//! Engine configuration: grammar cache location, download/retry policy,
//! per-file limits, and batch concurrency defaults. Loaded with built-in
//! defaults and overridable via `AST_*` environment variables, matching
//! the shape of every other configuration struct in this crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Grammar download and verification policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrammarPolicy {
    /// Base directory for the on-disk grammar cache, default `.astdb/grammars`.
    pub cache_dir: String,
    /// Maximum download attempts before raising `DownloadError`.
    pub max_download_attempts: u32,
    /// Base backoff delay; doubles on each retry.
    pub retry_base_delay_ms: u64,
}

impl Default for GrammarPolicy {
    fn default() -> Self {
        Self {
            cache_dir: ".astdb/grammars".to_string(),
            max_download_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl GrammarPolicy {
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << attempt))
    }
}

/// Per-file pipeline defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub generate_ids: bool,
    pub classify_nodes: bool,
    pub calculate_significance: bool,
    pub extract_metadata: bool,
    pub enable_serialization: bool,
    pub timeout_ms: u64,
    pub max_file_size_bytes: u64,
    pub include_source_text: bool,
    pub generate_signatures: bool,
    pub calculate_complexity: bool,
    pub validate_nodes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate_ids: true,
            classify_nodes: true,
            calculate_significance: true,
            extract_metadata: true,
            enable_serialization: false,
            timeout_ms: 30_000,
            max_file_size_bytes: 10 * 1024 * 1024,
            include_source_text: true,
            generate_signatures: true,
            calculate_complexity: true,
            validate_nodes: false,
        }
    }
}

/// Preset pipeline profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineProfile {
    Minimal,
    Full,
    Performance,
}

impl PipelineProfile {
    pub fn build(self) -> PipelineConfig {
        match self {
            PipelineProfile::Minimal => PipelineConfig {
                classify_nodes: true,
                calculate_significance: false,
                extract_metadata: false,
                enable_serialization: false,
                include_source_text: false,
                generate_signatures: false,
                calculate_complexity: false,
                validate_nodes: false,
                ..PipelineConfig::default()
            },
            PipelineProfile::Full => PipelineConfig {
                enable_serialization: true,
                validate_nodes: true,
                ..PipelineConfig::default()
            },
            PipelineProfile::Performance => PipelineConfig {
                include_source_text: false,
                generate_signatures: false,
                calculate_complexity: false,
                validate_nodes: false,
                enable_serialization: false,
                ..PipelineConfig::default()
            },
        }
    }
}

/// Batch processor defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub continue_on_error: bool,
    pub max_memory_mb: Option<u64>,
    /// Extends the `(path, fileHash)` cache key to `fileHash` alone, so
    /// distinct paths with identical content share a cache entry. Off by
    /// default: the cache is still keyed by `(path, fileHash)` either way.
    pub dedupe_by_hash: bool,
    pub collect_performance_metrics: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get().min(8),
            continue_on_error: true,
            max_memory_mb: None,
            dedupe_by_hash: false,
            collect_performance_metrics: false,
        }
    }
}

/// Top-level engine configuration aggregating every component's policy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub grammar: GrammarPolicy,
    pub pipeline: PipelineConfig,
    pub batch: BatchConfig,
}

/// Load configuration from environment variables, falling back to
/// defaults for anything unset. Mirrors the env-var-override pattern used
/// across the crate's other configuration loaders.
pub fn load_config() -> EngineConfig {
    let mut config = EngineConfig::default();

    if let Ok(dir) = std::env::var("AST_GRAMMAR_CACHE_DIR") {
        config.grammar.cache_dir = dir;
    }
    if let Some(v) = env_parsed::<u32>("AST_GRAMMAR_MAX_ATTEMPTS") {
        config.grammar.max_download_attempts = v;
    }
    if let Some(v) = env_parsed::<u64>("AST_PIPELINE_TIMEOUT_MS") {
        config.pipeline.timeout_ms = v;
    }
    if let Some(v) = env_parsed::<u64>("AST_MAX_FILE_SIZE_BYTES") {
        config.pipeline.max_file_size_bytes = v;
    }
    if let Some(v) = env_parsed::<usize>("AST_BATCH_CONCURRENCY") {
        config.batch.concurrency = v;
    }
    if let Ok(v) = std::env::var("AST_CONTINUE_ON_ERROR") {
        config.batch.continue_on_error = v == "1" || v.eq_ignore_ascii_case("true");
    }

    config
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grammar_policy_matches_spec_defaults() {
        let policy = GrammarPolicy::default();
        assert_eq!(policy.cache_dir, ".astdb/grammars");
        assert_eq!(policy.max_download_attempts, 3);
        assert_eq!(policy.retry_base_delay_ms, 1000);
    }

    #[test]
    fn retry_delay_doubles_per_attempt() {
        let policy = GrammarPolicy::default();
        assert_eq!(policy.retry_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.retry_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.retry_delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn profiles_compose_from_defaults() {
        let minimal = PipelineProfile::Minimal.build();
        assert!(!minimal.calculate_significance);
        let full = PipelineProfile::Full.build();
        assert!(full.validate_nodes);
        let perf = PipelineProfile::Performance.build();
        assert!(!perf.include_source_text);
    }

    #[test]
    fn batch_default_concurrency_is_bounded() {
        let cfg = BatchConfig::default();
        assert!(cfg.concurrency >= 1 && cfg.concurrency <= 8);
    }
}
