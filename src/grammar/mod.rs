//! Grammar Manager (C2)
//!
//! Acquires, verifies, and caches on-disk grammar artifacts for languages
//! whose parser isn't statically linked into this binary. Downloads are
//! retried with exponential backoff (`config::GrammarPolicy`), verified by
//! SHA-256, and trusted on first use when no expected hash is configured.

mod manager;

pub use manager::GrammarManager;
