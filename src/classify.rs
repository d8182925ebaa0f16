//! Classifier (C6)
//!
//! Maps a grammar's raw node kind (e.g. `function_declaration`,
//! `function_definition`) to the closed [`NodeType`] set, via one lookup
//! table per language: the same raw kind name means different things
//! across grammars (`"class"` in Python vs. Ruby, `"function"` in Go vs.
//! JavaScript), so a single shared allow-list would misclassify.

use crate::types::NodeType;

/// Classify `raw_kind` for `language`, falling back to the
/// language-agnostic table, then to `None` if nothing matches (callers
/// treat an unclassified named node as structurally uninteresting and
/// fold it into its nearest classified ancestor).
pub fn classify(language: &str, raw_kind: &str) -> Option<NodeType> {
    language_table(language)
        .iter()
        .find(|(kind, _)| *kind == raw_kind)
        .map(|(_, node_type)| *node_type)
        .or_else(|| {
            COMMON
                .iter()
                .find(|(kind, _)| *kind == raw_kind)
                .map(|(_, node_type)| *node_type)
        })
}

const COMMON: &[(&str, NodeType)] = &[
    ("comment", NodeType::Comment),
    ("line_comment", NodeType::Comment),
    ("block_comment", NodeType::Comment),
    ("ERROR", NodeType::Error),
];

fn language_table(language: &str) -> &'static [(&'static str, NodeType)] {
    match language {
        "javascript" => JAVASCRIPT,
        "typescript" => TYPESCRIPT,
        "python" => PYTHON,
        "rust" => RUST,
        "java" => JAVA,
        "cpp" => CPP,
        "c" => C,
        "c_sharp" => C_SHARP,
        "go" => GO,
        _ => &[],
    }
}

const JAVASCRIPT: &[(&str, NodeType)] = &[
    ("program", NodeType::File),
    ("import_statement", NodeType::Import),
    ("export_statement", NodeType::Export),
    ("class_declaration", NodeType::Class),
    ("function_declaration", NodeType::Function),
    ("function", NodeType::Function),
    ("arrow_function", NodeType::Function),
    ("method_definition", NodeType::Method),
    ("variable_declarator", NodeType::Variable),
    ("lexical_declaration", NodeType::Variable),
    ("formal_parameters", NodeType::Parameter),
    ("statement_block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("try_statement", NodeType::Statement),
    ("expression_statement", NodeType::Expression),
    ("call_expression", NodeType::Expression),
];

const TYPESCRIPT: &[(&str, NodeType)] = &[
    ("program", NodeType::File),
    ("import_statement", NodeType::Import),
    ("export_statement", NodeType::Export),
    ("interface_declaration", NodeType::Interface),
    ("class_declaration", NodeType::Class),
    ("function_declaration", NodeType::Function),
    ("method_definition", NodeType::Method),
    ("property_signature", NodeType::Property),
    ("public_field_definition", NodeType::Property),
    ("variable_declarator", NodeType::Variable),
    ("required_parameter", NodeType::Parameter),
    ("optional_parameter", NodeType::Parameter),
    ("statement_block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("expression_statement", NodeType::Expression),
];

const PYTHON: &[(&str, NodeType)] = &[
    ("module", NodeType::File),
    ("import_statement", NodeType::Import),
    ("import_from_statement", NodeType::Import),
    ("class_definition", NodeType::Class),
    ("function_definition", NodeType::Function),
    ("decorated_definition", NodeType::Function),
    ("assignment", NodeType::Variable),
    ("parameters", NodeType::Parameter),
    ("block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("try_statement", NodeType::Statement),
    ("call", NodeType::Expression),
];

const RUST: &[(&str, NodeType)] = &[
    ("source_file", NodeType::File),
    ("mod_item", NodeType::Module),
    ("use_declaration", NodeType::Import),
    ("struct_item", NodeType::Class),
    ("enum_item", NodeType::Class),
    ("trait_item", NodeType::Interface),
    ("impl_item", NodeType::Class),
    ("function_item", NodeType::Function),
    ("closure_expression", NodeType::Function),
    ("field_declaration", NodeType::Property),
    ("let_declaration", NodeType::Variable),
    ("parameters", NodeType::Parameter),
    ("block", NodeType::Block),
    ("if_expression", NodeType::Statement),
    ("for_expression", NodeType::Statement),
    ("while_expression", NodeType::Statement),
    ("match_expression", NodeType::Statement),
    ("call_expression", NodeType::Expression),
];

const JAVA: &[(&str, NodeType)] = &[
    ("program", NodeType::File),
    ("package_declaration", NodeType::Namespace),
    ("import_declaration", NodeType::Import),
    ("class_declaration", NodeType::Class),
    ("interface_declaration", NodeType::Interface),
    ("constructor_declaration", NodeType::Constructor),
    ("method_declaration", NodeType::Method),
    ("field_declaration", NodeType::Property),
    ("local_variable_declaration", NodeType::Variable),
    ("formal_parameters", NodeType::Parameter),
    ("block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("try_statement", NodeType::Statement),
    ("method_invocation", NodeType::Expression),
];

const CPP: &[(&str, NodeType)] = &[
    ("translation_unit", NodeType::File),
    ("namespace_definition", NodeType::Namespace),
    ("preproc_include", NodeType::Import),
    ("class_specifier", NodeType::Class),
    ("struct_specifier", NodeType::Class),
    ("function_definition", NodeType::Function),
    ("field_declaration", NodeType::Property),
    ("declaration", NodeType::Variable),
    ("parameter_list", NodeType::Parameter),
    ("compound_statement", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("call_expression", NodeType::Expression),
];

const C: &[(&str, NodeType)] = &[
    ("translation_unit", NodeType::File),
    ("preproc_include", NodeType::Import),
    ("struct_specifier", NodeType::Class),
    ("function_definition", NodeType::Function),
    ("field_declaration", NodeType::Property),
    ("declaration", NodeType::Variable),
    ("parameter_list", NodeType::Parameter),
    ("compound_statement", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("call_expression", NodeType::Expression),
];

const C_SHARP: &[(&str, NodeType)] = &[
    ("compilation_unit", NodeType::File),
    ("namespace_declaration", NodeType::Namespace),
    ("using_directive", NodeType::Import),
    ("class_declaration", NodeType::Class),
    ("interface_declaration", NodeType::Interface),
    ("constructor_declaration", NodeType::Constructor),
    ("method_declaration", NodeType::Method),
    ("property_declaration", NodeType::Property),
    ("field_declaration", NodeType::Property),
    ("variable_declaration", NodeType::Variable),
    ("parameter_list", NodeType::Parameter),
    ("block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("while_statement", NodeType::Statement),
    ("invocation_expression", NodeType::Expression),
];

const GO: &[(&str, NodeType)] = &[
    ("source_file", NodeType::File),
    ("package_clause", NodeType::Namespace),
    ("import_declaration", NodeType::Import),
    ("type_declaration", NodeType::Class),
    ("interface_type", NodeType::Interface),
    ("function_declaration", NodeType::Function),
    ("method_declaration", NodeType::Method),
    ("field_declaration", NodeType::Property),
    ("var_declaration", NodeType::Variable),
    ("short_var_declaration", NodeType::Variable),
    ("parameter_list", NodeType::Parameter),
    ("block", NodeType::Block),
    ("if_statement", NodeType::Statement),
    ("for_statement", NodeType::Statement),
    ("call_expression", NodeType::Expression),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_language_specific_roots() {
        assert_eq!(classify("rust", "source_file"), Some(NodeType::File));
        assert_eq!(classify("python", "module"), Some(NodeType::File));
        assert_eq!(classify("javascript", "program"), Some(NodeType::File));
    }

    #[test]
    fn same_raw_kind_differs_by_language() {
        assert_eq!(classify("python", "class_definition"), Some(NodeType::Class));
        assert_eq!(classify("javascript", "class_declaration"), Some(NodeType::Class));
    }

    #[test]
    fn falls_back_to_common_table() {
        assert_eq!(classify("rust", "line_comment"), Some(NodeType::Comment));
        assert_eq!(classify("python", "comment"), Some(NodeType::Comment));
    }

    #[test]
    fn unknown_raw_kind_is_unclassified() {
        assert_eq!(classify("rust", "not_a_real_kind"), None);
    }

    #[test]
    fn unknown_language_only_gets_common_table() {
        assert_eq!(classify("cobol", "comment"), Some(NodeType::Comment));
        assert_eq!(classify("cobol", "paragraph"), None);
    }
}
