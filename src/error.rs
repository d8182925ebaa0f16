//! Structured error taxonomy (C12)
//!
//! A closed set of error kinds shared by every component. Each variant
//! carries the structured fields callers need to report on without
//! re-scanning results, plus a process-wide ledger that tallies kinds and
//! retains a bounded sample of recent occurrences.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single position inside a source file, mirrored from `types::Position`
/// for errors that don't otherwise depend on the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPosition {
    pub line: u32,
    pub column: u32,
}

/// The core engine's closed error taxonomy.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file {file} exceeds the configured maximum size ({actual} > {limit} bytes)")]
    SizeLimit {
        file: String,
        actual: u64,
        limit: u64,
    },

    #[error("failed to download grammar for {language} from {url} after {attempts} attempt(s): {last_cause}")]
    Download {
        language: String,
        url: String,
        attempts: u32,
        last_cause: String,
        at: String,
    },

    #[error("grammar integrity check failed for {language}: expected {expected}, got {actual}")]
    Integrity {
        language: String,
        expected: String,
        actual: String,
    },

    #[error("failed to load parser for {language}: native={native_cause:?}, portable={portable_cause:?}")]
    ParserLoad {
        language: String,
        native_cause: Option<String>,
        portable_cause: Option<String>,
        artifact_path: Option<String>,
    },

    #[error("syntax error in {file} at {position:?}: {excerpt}")]
    Syntax {
        file: String,
        position: ErrorPosition,
        excerpt: String,
    },

    #[error("runtime error during parse of {file}: {message}")]
    Runtime { file: String, message: String },

    #[error("{stage} exceeded the configured timeout of {timeout_ms}ms for {file}")]
    Timeout {
        file: String,
        stage: String,
        timeout_ms: u64,
    },

    #[error("memory error processing {file}: {message}")]
    Memory { file: String, message: String },

    #[error("serialization validation failed: {offenders:?}")]
    SerializationValidation { offenders: Vec<String> },

    #[error("unsupported schema version: document is {found}, engine supports up to {supported}")]
    SchemaMigration { found: String, supported: String },

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("invariant warning: {0}")]
    InvariantWarning(String),
}

impl EngineError {
    /// The error's taxonomy kind, used as the ledger key and as the
    /// machine-readable discriminant external callers match on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Config(_) => ErrorKind::ConfigError,
            EngineError::SizeLimit { .. } => ErrorKind::SizeLimitError,
            EngineError::Download { .. } => ErrorKind::DownloadError,
            EngineError::Integrity { .. } => ErrorKind::IntegrityError,
            EngineError::ParserLoad { .. } => ErrorKind::ParserLoadError,
            EngineError::Syntax { .. } => ErrorKind::SyntaxError,
            EngineError::Runtime { .. } => ErrorKind::RuntimeError,
            EngineError::Timeout { .. } => ErrorKind::TimeoutError,
            EngineError::Memory { .. } => ErrorKind::MemoryError,
            EngineError::SerializationValidation { .. } => ErrorKind::SerializationValidationError,
            EngineError::SchemaMigration { .. } => ErrorKind::SchemaMigrationError,
            EngineError::Io { .. } => ErrorKind::IOError,
            EngineError::InvariantWarning(_) => ErrorKind::InvariantWarning,
        }
    }

    /// File path this error is attached to, when known.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            EngineError::SizeLimit { file, .. }
            | EngineError::Syntax { file, .. }
            | EngineError::Runtime { file, .. }
            | EngineError::Timeout { file, .. }
            | EngineError::Memory { file, .. }
            | EngineError::Io { path: file, .. } => Some(file),
            _ => None,
        }
    }

    /// Whether a batch run may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SyntaxError
                | ErrorKind::TimeoutError
                | ErrorKind::MemoryError
                | ErrorKind::IOError
                | ErrorKind::DownloadError
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io {
            path: String::new(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SchemaMigration {
            found: "unknown".to_string(),
            supported: e.to_string(),
        }
    }
}

/// Machine-readable discriminant for [`EngineError`]. Stable across
/// releases; used as the ledger key and serialized in error summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ConfigError,
    SizeLimitError,
    DownloadError,
    IntegrityError,
    ParserLoadError,
    SyntaxError,
    RuntimeError,
    TimeoutError,
    MemoryError,
    SerializationValidationError,
    SchemaMigrationError,
    IOError,
    InvariantWarning,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "config-error",
            ErrorKind::SizeLimitError => "size-limit",
            ErrorKind::DownloadError => "download-error",
            ErrorKind::IntegrityError => "integrity-error",
            ErrorKind::ParserLoadError => "parser-load-error",
            ErrorKind::SyntaxError => "syntax-error",
            ErrorKind::RuntimeError => "runtime-error",
            ErrorKind::TimeoutError => "timeout-error",
            ErrorKind::MemoryError => "memory-error",
            ErrorKind::SerializationValidationError => "serialization-validation-error",
            ErrorKind::SchemaMigrationError => "schema-migration-error",
            ErrorKind::IOError => "io-error",
            ErrorKind::InvariantWarning => "invariant-warning",
        }
    }
}

/// A single retained sample in the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorSample {
    pub message: String,
    pub file_path: Option<String>,
    pub recorded_at_epoch_ms: u128,
}

/// Running totals and a bounded sample list for one error kind.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorStats {
    pub count: u64,
    pub samples: Vec<ErrorSample>,
}

const MAX_SAMPLES_PER_KIND: usize = 10;

/// Process-wide mutable state: a mutex-guarded table of error counts and
/// samples per kind. Callers wanting isolation (tests) construct their own
/// `ErrorLedger` via `ErrorLedger::new()` instead of using the global.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    inner: Mutex<HashMap<ErrorKind, ErrorStats>>,
}

impl ErrorLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The single process-wide ledger.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ErrorLedger>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ErrorLedger::default()))
            .clone()
    }

    pub fn record(&self, error: &EngineError) {
        let kind = error.kind();
        let sample = ErrorSample {
            message: error.to_string(),
            file_path: error.file_path().map(|s| s.to_string()),
            recorded_at_epoch_ms: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
        };

        let mut table = self.inner.lock().expect("error ledger mutex poisoned");
        let stats = table.entry(kind).or_default();
        stats.count += 1;
        stats.samples.push(sample);
        if stats.samples.len() > MAX_SAMPLES_PER_KIND {
            stats.samples.remove(0);
        }
    }

    /// A point-in-time snapshot of counts and samples, keyed by kind.
    pub fn snapshot(&self) -> HashMap<ErrorKind, ErrorStats> {
        self.inner
            .lock()
            .expect("error ledger mutex poisoned")
            .clone()
    }

    pub fn clear_history(&self) {
        self.inner
            .lock()
            .expect("error ledger mutex poisoned")
            .clear();
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Helper used at module construction sites that need a file-qualified IO
/// error without repeating the boilerplate.
pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into().to_string_lossy().to_string(),
        message: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds_match_spec() {
        let recoverable = EngineError::Syntax {
            file: "a.js".into(),
            position: ErrorPosition { line: 1, column: 0 },
            excerpt: "x".into(),
        };
        assert!(recoverable.is_recoverable());

        let fatal = EngineError::Config("bad".into());
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn ledger_records_and_caps_samples() {
        let ledger = ErrorLedger::new();
        for i in 0..20 {
            ledger.record(&EngineError::Io {
                path: format!("f{i}.txt"),
                message: "boom".into(),
            });
        }
        let snap = ledger.snapshot();
        let stats = snap.get(&ErrorKind::IOError).unwrap();
        assert_eq!(stats.count, 20);
        assert_eq!(stats.samples.len(), MAX_SAMPLES_PER_KIND);
    }

    #[test]
    fn clear_history_resets() {
        let ledger = ErrorLedger::new();
        ledger.record(&EngineError::Config("x".into()));
        ledger.clear_history();
        assert!(ledger.snapshot().is_empty());
    }
}
