//! Metadata Extractor (C8)
//!
//! Derives [`NodeMetadata`] (scope, modifiers, imports/exports, docstring,
//! signature) and cyclomatic complexity for one node via a
//! `LanguageExtractor` dispatched per language (`TypeScriptExtractor`,
//! `JavaScriptExtractor`, `PythonExtractor`, `RustExtractor`,
//! `JavaExtractor`, `GenericExtractor`).

pub mod complexity;
pub mod extractors;

use crate::types::{NodeMetadata, NodeType};
use extractors::LanguageExtractor;

/// Extract metadata for one node given its source slice and the scope
/// chain of enclosing named nodes (outermost first).
pub fn extract(
    language: &str,
    node_type: NodeType,
    text: &str,
    preceding_comment: Option<&str>,
    scope: &[String],
    raw_kind: &str,
) -> NodeMetadata {
    let extractor = extractors::for_language(language);

    let modifiers = extractor.extract_modifiers(text);
    let imports = if matches!(node_type, NodeType::Import) {
        extractor.extract_imports(text)
    } else {
        Vec::new()
    };
    let exports = if matches!(node_type, NodeType::Export)
        || modifiers.iter().any(|m| m == "export" || m == "pub")
    {
        extractor.extract_exports(text)
    } else {
        Vec::new()
    };
    let docstring = extractor.extract_docstring(preceding_comment, text);

    let mut language_specific = std::collections::HashMap::new();
    language_specific.insert(
        "rawKind".to_string(),
        serde_json::Value::String(raw_kind.to_string()),
    );

    NodeMetadata {
        language: language.to_string(),
        scope: scope.to_vec(),
        modifiers,
        imports,
        exports,
        docstring,
        annotations: Vec::new(),
        language_specific,
    }
}

/// Derive a one-line signature for `node_type` from its source text.
pub fn extract_signature(language: &str, text: &str) -> String {
    extractors::for_language(language).extract_signature(text)
}
