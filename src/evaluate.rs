use std::collections::HashSet;

use crate::types::Expr;

/// Evaluate an expression against the set of condition ids that currently
/// hold true. References to ids outside the set are false.
pub(crate) fn evaluate(expr: &Expr, truthy: &HashSet<&str>) -> bool {
    match expr {
        Expr::Ref(id) => truthy.contains(id.as_str()),
        Expr::And(a, b) => evaluate(a, truthy) && evaluate(b, truthy),
        Expr::Or(a, b) => evaluate(a, truthy) || evaluate(b, truthy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn eval(expression: &str, truthy: &[&str]) -> bool {
        let expr = parse(expression).unwrap();
        evaluate(&expr, &truthy.iter().copied().collect())
    }

    #[test]
    fn reference_looks_up_truth() {
        assert!(eval("1", &["1"]));
        assert!(!eval("1", &[]));
        assert!(!eval("1", &["2"]));
    }

    #[test]
    fn and_requires_both() {
        assert!(eval("1 AND 2", &["1", "2"]));
        assert!(!eval("1 AND 2", &["1"]));
        assert!(!eval("1 AND 2", &[]));
    }

    #[test]
    fn or_requires_either() {
        assert!(eval("1 OR 2", &["2"]));
        assert!(!eval("1 OR 2", &[]));
    }

    #[test]
    fn grouping_changes_result() {
        assert!(eval("1 OR (2 AND 3)", &["1"]));
        assert!(!eval("(1 OR 2) AND 3", &["1"]));
    }

    #[test]
    fn left_fold_without_parens() {
        // 1 OR 2 AND 3 evaluates as ((1 OR 2) AND 3).
        assert!(!eval("1 OR 2 AND 3", &["1"]));
        assert!(eval("1 OR 2 AND 3", &["1", "3"]));
    }
}
