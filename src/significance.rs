//! Significance Calculator (C7)
//!
//! A total function from `(NodeType, modifiers, has_docstring)` to the
//! ordered [`Significance`] scale.

use crate::types::{NodeType, Significance};

fn is_exported(modifiers: &[String]) -> bool {
    modifiers
        .iter()
        .any(|m| matches!(m.as_str(), "export" | "exported" | "pub"))
}

/// Base significance per node type, given whether the node carries an
/// export/pub modifier. Exhaustive over the closed `NodeType` set as of
/// this version; unknown future variants (the enum is `#[non_exhaustive]`)
/// fall back to `Minimal`.
fn base_significance(node_type: NodeType, exported: bool) -> Significance {
    match node_type {
        NodeType::File
        | NodeType::Module
        | NodeType::Namespace
        | NodeType::Class
        | NodeType::Interface => {
            if exported {
                Significance::Critical
            } else {
                Significance::High
            }
        }
        NodeType::Function | NodeType::Method | NodeType::Constructor => Significance::High,
        NodeType::Property | NodeType::Variable => {
            if exported {
                Significance::Medium
            } else {
                Significance::Low
            }
        }
        NodeType::Import | NodeType::Export => Significance::Medium,
        NodeType::Parameter | NodeType::Block | NodeType::Statement => Significance::Low,
        NodeType::Expression | NodeType::Comment => Significance::Minimal,
        NodeType::Error => Significance::High,
        _ => Significance::Minimal,
    }
}

/// Compute the significance of one node. `modifiers` comes from the
/// node's already-extracted metadata; `has_docstring` is whether this
/// node carries one. A docstring raises significance by one level only
/// for node types whose base tier is MINIMAL or LOW; it never lifts an
/// already-HIGH-or-above node.
pub fn calculate(node_type: NodeType, modifiers: &[String], has_docstring: bool) -> Significance {
    let exported = is_exported(modifiers);
    let base = base_significance(node_type, exported);
    let mut significance = base;

    let is_private = modifiers
        .iter()
        .any(|m| matches!(m.as_str(), "private" | "internal"));
    if is_private {
        significance = significance.lower();
    }

    if has_docstring && matches!(base, Significance::Minimal | Significance::Low) {
        significance = significance.raise();
    }

    significance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_class_are_high_by_default_critical_when_exported() {
        assert_eq!(calculate(NodeType::File, &[], false), Significance::High);
        assert_eq!(calculate(NodeType::Class, &[], false), Significance::High);
        assert_eq!(
            calculate(NodeType::Class, &["export".to_string()], false),
            Significance::Critical
        );
    }

    #[test]
    fn function_is_high_regardless_of_export() {
        assert_eq!(calculate(NodeType::Function, &[], false), Significance::High);
        assert_eq!(
            calculate(NodeType::Function, &["pub".to_string()], false),
            Significance::High
        );
    }

    #[test]
    fn private_modifier_lowers_significance() {
        let modifiers = vec!["private".to_string()];
        assert_eq!(
            calculate(NodeType::Method, &modifiers, false),
            Significance::Medium
        );
    }

    #[test]
    fn variable_is_medium_when_exported_low_otherwise() {
        assert_eq!(calculate(NodeType::Variable, &[], false), Significance::Low);
        assert_eq!(
            calculate(NodeType::Variable, &["pub".to_string()], false),
            Significance::Medium
        );
    }

    #[test]
    fn import_and_export_are_medium() {
        assert_eq!(calculate(NodeType::Import, &[], false), Significance::Medium);
        assert_eq!(calculate(NodeType::Export, &[], false), Significance::Medium);
    }

    #[test]
    fn docstring_raises_low_tier_nodes_but_not_function() {
        assert_eq!(
            calculate(NodeType::Variable, &[], true),
            Significance::Medium
        );
        assert_eq!(
            calculate(NodeType::Function, &[], true),
            Significance::High
        );
    }

    #[test]
    fn expression_stays_minimal_without_modifiers() {
        assert_eq!(calculate(NodeType::Expression, &[], false), Significance::Minimal);
    }

    #[test]
    fn private_and_export_modifiers_together() {
        let modifiers = vec!["private".to_string(), "export".to_string()];
        assert_eq!(
            calculate(NodeType::Variable, &modifiers, false),
            Significance::Low
        );
    }
}
