//! Cyclomatic complexity over a node's descendant raw kinds: base 1 plus
//! one per decision point, spanning a raw-kind set common across every
//! grammar this crate supports.

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "if_expression",
    "elif_clause",
    "else_clause",
    "else_if_clause",
    "for_statement",
    "for_expression",
    "for_in_statement",
    "for_of_statement",
    "while_statement",
    "while_expression",
    "do_statement",
    "loop_expression",
    "switch_statement",
    "match_expression",
    "match_arm",
    "case_clause",
    "catch_clause",
    "except_clause",
    "conditional_expression",
    "binary_expression",
];

const LOGICAL_OPERATORS: &[&str] = &["&&", "||", "and", "or"];

/// `1 + one per decision-bearing descendant`. `logical_operator_texts` is
/// the source text of each `binary_expression`/`and`/`or` descendant,
/// used to avoid over-counting arithmetic binary expressions as branches.
pub fn cyclomatic_complexity<'a>(
    descendant_raw_kinds: impl Iterator<Item = &'a str>,
    logical_operator_texts: &[String],
) -> u32 {
    let mut complexity = 1;
    for kind in descendant_raw_kinds {
        if kind == "binary_expression" {
            continue;
        }
        if DECISION_KINDS.contains(&kind) {
            complexity += 1;
        }
    }
    complexity += logical_operator_texts
        .iter()
        .filter(|text| LOGICAL_OPERATORS.iter().any(|op| text.contains(op)))
        .count() as u32;
    complexity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_complexity_is_one() {
        assert_eq!(cyclomatic_complexity(std::iter::empty(), &[]), 1);
    }

    #[test]
    fn one_if_adds_one() {
        assert_eq!(cyclomatic_complexity(["if_statement"].into_iter(), &[]), 2);
    }

    #[test]
    fn logical_operators_each_add_one() {
        let texts = vec!["a && b".to_string(), "c || d".to_string()];
        assert_eq!(cyclomatic_complexity(std::iter::empty(), &texts), 3);
    }

    #[test]
    fn plain_binary_expression_kind_does_not_inflate_complexity() {
        assert_eq!(
            cyclomatic_complexity(["binary_expression", "binary_expression"].into_iter(), &[]),
            1
        );
    }
}
