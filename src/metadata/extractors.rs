//! Per-language extraction logic. Each extractor scans a node's raw
//! source text for keyword patterns rather than re-querying the syntax
//! tree. Unsupported languages fall back to [`GenericExtractor`], which
//! only recognizes the keywords common across C-family languages.

/// Per-language text-pattern extraction.
pub trait LanguageExtractor: Send + Sync {
    fn extract_modifiers(&self, text: &str) -> Vec<String>;
    fn extract_docstring(&self, preceding_comment: Option<&str>, text: &str) -> Option<String>;
    fn extract_signature(&self, text: &str) -> String;
    fn extract_imports(&self, text: &str) -> Vec<String>;
    fn extract_exports(&self, text: &str) -> Vec<String>;
}

pub fn for_language(language: &str) -> Box<dyn LanguageExtractor> {
    match language {
        "typescript" => Box::new(TypeScriptExtractor),
        "javascript" => Box::new(JavaScriptExtractor),
        "python" => Box::new(PythonExtractor),
        "rust" => Box::new(RustExtractor),
        "java" | "c_sharp" => Box::new(JavaExtractor),
        _ => Box::new(GenericExtractor),
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

fn contains_any(text: &str, needles: &[&str]) -> Vec<String> {
    needles
        .iter()
        .filter(|n| text.contains(*n))
        .map(|n| n.trim().to_string())
        .collect()
}

fn name_after(text: &str, keyword: &str) -> Option<String> {
    let idx = text.find(keyword)?;
    let rest = &text[idx + keyword.len()..];
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub struct TypeScriptExtractor;

impl LanguageExtractor for TypeScriptExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        contains_any(
            text,
            &[
                "export", "default", "async", "static", "private", "protected", "public",
                "readonly", "abstract",
            ],
        )
    }

    fn extract_docstring(&self, preceding_comment: Option<&str>, _text: &str) -> Option<String> {
        preceding_comment.map(|c| clean_jsdoc(c))
    }

    fn extract_signature(&self, text: &str) -> String {
        first_line(text).trim_end_matches('{').trim().to_string()
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        extract_js_import_specifiers(text)
    }

    fn extract_exports(&self, text: &str) -> Vec<String> {
        for keyword in ["function ", "class ", "interface ", "const "] {
            if let Some(name) = name_after(text, keyword) {
                return vec![name];
            }
        }
        Vec::new()
    }
}

pub struct JavaScriptExtractor;

impl LanguageExtractor for JavaScriptExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        contains_any(text, &["export", "default", "async", "static"])
    }

    fn extract_docstring(&self, preceding_comment: Option<&str>, _text: &str) -> Option<String> {
        preceding_comment.map(|c| clean_jsdoc(c))
    }

    fn extract_signature(&self, text: &str) -> String {
        first_line(text).trim_end_matches('{').trim().to_string()
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        extract_js_import_specifiers(text)
    }

    fn extract_exports(&self, text: &str) -> Vec<String> {
        for keyword in ["function ", "class ", "const "] {
            if let Some(name) = name_after(text, keyword) {
                return vec![name];
            }
        }
        Vec::new()
    }
}

fn clean_jsdoc(comment: &str) -> String {
    comment
        .lines()
        .map(|l| l.trim().trim_start_matches("/**").trim_start_matches("*/").trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_js_import_specifiers(text: &str) -> Vec<String> {
    if let Some(from_idx) = text.find("from ") {
        let rest = &text[from_idx + 5..];
        let quote = rest.chars().find(|c| *c == '"' || *c == '\'');
        if let Some(q) = quote {
            if let Some(end) = rest[1..].find(q) {
                return vec![rest[1..1 + end].to_string()];
            }
        }
    }
    if let Some(paren) = text.find("require(") {
        let rest = &text[paren + 8..];
        let quote = rest.chars().find(|c| *c == '"' || *c == '\'');
        if let Some(q) = quote {
            if let Some(end) = rest[1..].find(q) {
                return vec![rest[1..1 + end].to_string()];
            }
        }
    }
    Vec::new()
}

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        let mut modifiers = Vec::new();
        if text.trim_start().starts_with("async ") {
            modifiers.push("async".to_string());
        }
        if let Some(name) = name_after(text, "def ") {
            if name.starts_with("__") && name.ends_with("__") {
                modifiers.push("dunder".to_string());
            } else if name.starts_with('_') {
                modifiers.push("private".to_string());
            } else {
                modifiers.push("public".to_string());
            }
        }
        if text.contains("@staticmethod") {
            modifiers.push("static".to_string());
        }
        if text.contains("@classmethod") {
            modifiers.push("classmethod".to_string());
        }
        modifiers
    }

    fn extract_docstring(&self, _preceding_comment: Option<&str>, text: &str) -> Option<String> {
        let body_start = text.find(':')? + 1;
        let body = text[body_start..].trim_start();
        for quote in ["\"\"\"", "'''"] {
            if let Some(rest) = body.strip_prefix(quote) {
                if let Some(end) = rest.find(quote) {
                    return Some(rest[..end].trim().to_string());
                }
            }
        }
        None
    }

    fn extract_signature(&self, text: &str) -> String {
        first_line(text).trim_end_matches(':').trim().to_string()
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let line = first_line(text);
        if let Some(name) = name_after(&line, "import ") {
            return vec![name];
        }
        if let Some(name) = name_after(&line, "from ") {
            return vec![name];
        }
        Vec::new()
    }

    fn extract_exports(&self, text: &str) -> Vec<String> {
        for keyword in ["def ", "class "] {
            if let Some(name) = name_after(text, keyword) {
                return vec![name];
            }
        }
        Vec::new()
    }
}

pub struct RustExtractor;

impl LanguageExtractor for RustExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        let mut modifiers = Vec::new();
        if text.trim_start().starts_with("pub ") || text.contains(" pub ") {
            modifiers.push("pub".to_string());
        } else {
            modifiers.push("private".to_string());
        }
        if text.contains("async fn") {
            modifiers.push("async".to_string());
        }
        if text.contains("unsafe fn") || text.trim_start().starts_with("unsafe ") {
            modifiers.push("unsafe".to_string());
        }
        modifiers
    }

    fn extract_docstring(&self, preceding_comment: Option<&str>, _text: &str) -> Option<String> {
        preceding_comment.map(|c| {
            c.lines()
                .map(|l| l.trim().trim_start_matches("///").trim_start_matches("//!").trim())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    fn extract_signature(&self, text: &str) -> String {
        let until_brace = text.split('{').next().unwrap_or(text);
        until_brace.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        if let Some(name) = name_after(text, "use ") {
            return vec![name];
        }
        Vec::new()
    }

    fn extract_exports(&self, text: &str) -> Vec<String> {
        for keyword in ["fn ", "struct ", "enum ", "trait "] {
            if text.contains("pub ") {
                if let Some(name) = name_after(text, keyword) {
                    return vec![name];
                }
            }
        }
        Vec::new()
    }
}

/// Shared by Java and C#, whose modifier vocabularies and declaration
/// shapes are close enough to reuse one extractor.
pub struct JavaExtractor;

impl LanguageExtractor for JavaExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        contains_any(
            text,
            &["public", "private", "protected", "static", "final", "abstract", "override"],
        )
    }

    fn extract_docstring(&self, preceding_comment: Option<&str>, _text: &str) -> Option<String> {
        preceding_comment.map(|c| {
            c.lines()
                .map(|l| l.trim().trim_start_matches("/**").trim_start_matches("*/").trim_start_matches('*').trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    fn extract_signature(&self, text: &str) -> String {
        first_line(text).trim_end_matches('{').trim().to_string()
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        for keyword in ["import ", "using "] {
            if let Some(name) = name_after(text, keyword) {
                return vec![name];
            }
        }
        Vec::new()
    }

    fn extract_exports(&self, text: &str) -> Vec<String> {
        for keyword in ["class ", "interface "] {
            if let Some(name) = name_after(text, keyword) {
                return vec![name];
            }
        }
        Vec::new()
    }
}

/// Fallback for languages (C, C++, Go, and anything user-registered) with
/// no dedicated extractor: recognizes only the keywords shared broadly
/// across C-family and Go declarations.
pub struct GenericExtractor;

impl LanguageExtractor for GenericExtractor {
    fn extract_modifiers(&self, text: &str) -> Vec<String> {
        contains_any(text, &["static", "const", "public", "private"])
    }

    fn extract_docstring(&self, preceding_comment: Option<&str>, _text: &str) -> Option<String> {
        preceding_comment.map(|c| c.trim().to_string())
    }

    fn extract_signature(&self, text: &str) -> String {
        first_line(text).trim_end_matches('{').trim().to_string()
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        for keyword in ["#include ", "import "] {
            if let Some(rest) = text.find(keyword).map(|i| &text[i + keyword.len()..]) {
                let name: String = rest
                    .trim_start_matches(['<', '"'])
                    .chars()
                    .take_while(|c| *c != '>' && *c != '"' && *c != '\n')
                    .collect();
                if !name.is_empty() {
                    return vec![name];
                }
            }
        }
        Vec::new()
    }

    fn extract_exports(&self, _text: &str) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_extractor_finds_c_include() {
        let extractor = GenericExtractor;
        assert_eq!(extractor.extract_imports("#include <stdio.h>"), vec!["stdio.h"]);
    }

    #[test]
    fn javascript_extractor_finds_named_import_source() {
        let extractor = JavaScriptExtractor;
        let text = "import { foo } from \"./bar.js\";";
        assert_eq!(extractor.extract_imports(text), vec!["./bar.js"]);
    }

    #[test]
    fn python_private_method_is_marked_private() {
        let extractor = PythonExtractor;
        let modifiers = extractor.extract_modifiers("def _helper(self):\n    pass");
        assert!(modifiers.contains(&"private".to_string()));
    }
}
