use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Everything the rest of the engine needs to know about one language:
/// its canonical name, the extensions that route to it, an optional
/// shebang pattern used by the content heuristic, and which native
/// `tree-sitter-*` crate (if any) backs it (the runtime consults this to decide
/// native vs. portable runtime).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LanguageDescriptor {
    pub name: String,
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shebang_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_keywords: Vec<String>,
    pub native_module: Option<String>,
    /// Where to download a portable grammar artifact for this language when
    /// it has no `native_module`. Consulted by the pipeline before falling
    /// back to the WASM runtime; irrelevant for languages with a native module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
}

impl LanguageDescriptor {
    fn builtin(
        name: &str,
        extensions: &[&str],
        shebang_patterns: &[&str],
        content_keywords: &[&str],
        native_module: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|s| s.to_string()).collect(),
            shebang_patterns: shebang_patterns.iter().map(|s| s.to_string()).collect(),
            content_keywords: content_keywords.iter().map(|s| s.to_string()).collect(),
            native_module: native_module.map(|s| s.to_string()),
            artifact_url: None,
        }
    }
}

fn builtin_table() -> Vec<LanguageDescriptor> {
    vec![
        LanguageDescriptor::builtin(
            "javascript",
            &["js", "jsx", "mjs", "cjs"],
            &["node"],
            &["function", "const", "require(", "=>"],
            Some("javascript"),
        ),
        LanguageDescriptor::builtin(
            "typescript",
            &["ts", "tsx"],
            &[],
            &["interface ", ": string", ": number", "import type"],
            Some("typescript"),
        ),
        LanguageDescriptor::builtin(
            "python",
            &["py", "pyx", "pyi"],
            &["python", "python3"],
            &["def ", "import ", "self,", "elif "],
            Some("python"),
        ),
        LanguageDescriptor::builtin(
            "rust",
            &["rs"],
            &[],
            &["fn ", "let mut ", "impl ", "pub struct"],
            Some("rust"),
        ),
        LanguageDescriptor::builtin(
            "java",
            &["java"],
            &[],
            &["public class", "private ", "import java."],
            Some("java"),
        ),
        LanguageDescriptor::builtin(
            "cpp",
            &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "h++"],
            &[],
            &["#include <", "std::", "namespace "],
            Some("cpp"),
        ),
        LanguageDescriptor::builtin(
            "c",
            &["c", "h"],
            &[],
            &["#include <", "int main("],
            Some("c"),
        ),
        LanguageDescriptor::builtin(
            "c_sharp",
            &["cs"],
            &[],
            &["namespace ", "using System"],
            Some("c_sharp"),
        ),
        LanguageDescriptor::builtin(
            "go",
            &["go"],
            &[],
            &["package ", "func ", "import ("],
            Some("go"),
        ),
    ]
}

/// Mutable registry of known languages, keyed by lowercase name with a
/// parallel lowercase-extension index for O(1) lookup.
#[derive(Debug)]
pub struct LanguageRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_name: HashMap<String, LanguageDescriptor>,
    by_extension: HashMap<String, String>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let mut inner = Inner::default();
        for descriptor in builtin_table() {
            register_unchecked(&mut inner, descriptor);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }
}

fn register_unchecked(inner: &mut Inner, descriptor: LanguageDescriptor) {
    let name = descriptor.name.to_lowercase();
    for ext in &descriptor.extensions {
        inner.by_extension.insert(ext.to_lowercase(), name.clone());
    }
    inner.by_name.insert(name, descriptor);
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a registered language, matching case-insensitively.
    pub fn describe(&self, name: &str) -> Option<LanguageDescriptor> {
        self.inner
            .read()
            .expect("language registry poisoned")
            .by_name
            .get(&name.to_lowercase())
            .cloned()
    }

    /// All registered languages, sorted by name for deterministic output.
    pub fn list(&self) -> Vec<LanguageDescriptor> {
        let inner = self.inner.read().expect("language registry poisoned");
        let mut out: Vec<_> = inner.by_name.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Register a new language or replace an existing one with the same
    /// name. Rejects a registration whose extensions collide with a
    /// *different* language already holding them.
    pub fn add_language(&self, descriptor: LanguageDescriptor) -> EngineResult<()> {
        let name = descriptor.name.to_lowercase();
        let mut inner = self.inner.write().expect("language registry poisoned");

        for ext in &descriptor.extensions {
            let ext = ext.to_lowercase();
            if let Some(owner) = inner.by_extension.get(&ext) {
                if *owner != name {
                    return Err(EngineError::Config(format!(
                        "extension '.{ext}' is already registered to language '{owner}'"
                    )));
                }
            }
        }

        // Replacing a language drops its old extension claims first so a
        // shrunk extension list doesn't leave stale entries behind.
        if let Some(previous) = inner.by_name.get(&name).cloned() {
            for ext in &previous.extensions {
                inner.by_extension.remove(&ext.to_lowercase());
            }
        }

        register_unchecked(&mut inner, descriptor);
        Ok(())
    }

    /// Remove a language and release its extensions. Returns `true` if a
    /// language by that name existed.
    pub fn remove_language(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let mut inner = self.inner.write().expect("language registry poisoned");
        match inner.by_name.remove(&name) {
            Some(descriptor) => {
                for ext in &descriptor.extensions {
                    inner.by_extension.remove(&ext.to_lowercase());
                }
                true
            }
            None => false,
        }
    }

    /// Resolve a language for `path`, falling back to sniffing `content`
    /// when the extension is unknown or absent (content heuristic).
    pub fn detect_language(&self, path: &str, content: Option<&str>) -> Option<String> {
        if let Some(name) = self.detect_from_extension(path) {
            return Some(name);
        }
        content.and_then(|c| self.detect_from_content(c))
    }

    fn detect_from_extension(&self, path: &str) -> Option<String> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        self.inner
            .read()
            .expect("language registry poisoned")
            .by_extension
            .get(&ext)
            .cloned()
    }

    /// Shebang line first, then keyword-density scoring across every
    /// registered language; the highest-scoring non-zero match wins, ties
    /// broken by registration order (built-ins, then additions, by name).
    fn detect_from_content(&self, content: &str) -> Option<String> {
        let first_line = content.lines().next().unwrap_or("");
        if let Some(stripped) = first_line.strip_prefix("#!") {
            let inner = self.inner.read().expect("language registry poisoned");
            for descriptor in inner.by_name.values() {
                if descriptor
                    .shebang_patterns
                    .iter()
                    .any(|pattern| stripped.contains(pattern.as_str()))
                {
                    return Some(descriptor.name.clone());
                }
            }
        }

        let inner = self.inner.read().expect("language registry poisoned");
        let mut best: Option<(&str, usize)> = None;
        for descriptor in inner.by_name.values() {
            let score = descriptor
                .content_keywords
                .iter()
                .filter(|kw| content.contains(kw.as_str()))
                .count();
            if score == 0 {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((descriptor.name.as_str(), score)),
            }
        }
        best.map(|(name, _)| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_extensions_case_insensitively() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.detect_language("main.RS", None),
            Some("rust".to_string())
        );
        assert_eq!(
            registry.detect_language("app.tsx", None),
            Some("typescript".to_string())
        );
    }

    #[test]
    fn falls_back_to_shebang_when_extension_is_unknown() {
        let registry = LanguageRegistry::new();
        let content = "#!/usr/bin/env python3\nprint('hi')\n";
        assert_eq!(
            registry.detect_language("script", Some(content)),
            Some("python".to_string())
        );
    }

    #[test]
    fn falls_back_to_keyword_density_without_shebang() {
        let registry = LanguageRegistry::new();
        let content = "pub struct Foo;\nfn main() { let mut x = 1; impl Foo {} }";
        assert_eq!(
            registry.detect_language("noext", Some(content)),
            Some("rust".to_string())
        );
    }

    #[test]
    fn unknown_extension_and_content_returns_none() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect_language("data.bin", Some("\x00\x01\x02")), None);
    }

    #[test]
    fn add_language_rejects_extension_collision() {
        let registry = LanguageRegistry::new();
        let err = registry
            .add_language(LanguageDescriptor {
                name: "rusty".to_string(),
                extensions: vec!["rs".to_string()],
                shebang_patterns: vec![],
                content_keywords: vec![],
                native_module: None,
                artifact_url: None,
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }

    #[test]
    fn add_language_allows_reregistering_the_same_name() {
        let registry = LanguageRegistry::new();
        registry
            .add_language(LanguageDescriptor {
                name: "rust".to_string(),
                extensions: vec!["rs".to_string(), "rsx".to_string()],
                shebang_patterns: vec![],
                content_keywords: vec!["fn ".to_string()],
                native_module: Some("rust".to_string()),
                artifact_url: None,
            })
            .unwrap();
        assert_eq!(
            registry.detect_language("macro.rsx", None),
            Some("rust".to_string())
        );
    }

    #[test]
    fn remove_language_releases_its_extensions() {
        let registry = LanguageRegistry::new();
        assert!(registry.remove_language("go"));
        assert_eq!(registry.detect_language("main.go", None), None);
        assert!(!registry.remove_language("go"));
    }

    #[test]
    fn list_is_sorted_by_name() {
        let registry = LanguageRegistry::new();
        let names: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
