use winnow::ascii::{digit1, Caseless};
use winnow::combinator::{alt, cut_err, delimited, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::types::Expr;

#[derive(Debug, Clone, Copy)]
enum LogicOp {
    And,
    Or,
}

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

fn condition_ref(input: &mut &str) -> ModalResult<Expr> {
    digit1
        .map(|id: &str| Expr::Ref(id.to_owned()))
        .parse_next(input)
}

fn operand(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((delimited('(', expr, (ws, cut_err(')'))), condition_ref))
        .context(StrContext::Expected(StrContextValue::Description(
            "filter reference or group",
        )))
        .parse_next(input)
}

fn logic_op(input: &mut &str) -> ModalResult<LogicOp> {
    ws.parse_next(input)?;
    alt((
        "&&".value(LogicOp::And),
        "||".value(LogicOp::Or),
        Caseless("AND").value(LogicOp::And),
        Caseless("OR").value(LogicOp::Or),
    ))
    .parse_next(input)
}

// Both operators live on a single precedence level and fold left; only
// parentheses change grouping.
fn expr(input: &mut &str) -> ModalResult<Expr> {
    let first = operand.parse_next(input)?;
    let rest: Vec<(LogicOp, Expr)> =
        repeat(0.., (logic_op, cut_err(operand))).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| match op {
        LogicOp::And => acc.and(rhs),
        LogicOp::Or => acc.or(rhs),
    }))
}

pub(super) fn expression(input: &mut &str) -> ModalResult<Expr> {
    let parsed = expr(input)?;
    ws.parse_next(input)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;
    use crate::types::Expr;

    fn cond(id: &str) -> Expr {
        Expr::Ref(id.to_owned())
    }

    #[test]
    fn parse_single_reference() {
        assert_eq!(parse("1").unwrap(), cond("1"));
    }

    #[test]
    fn parse_conjunction() {
        assert_eq!(parse("1 AND 2").unwrap(), cond("1").and(cond("2")));
    }

    #[test]
    fn parse_disjunction() {
        assert_eq!(parse("1 OR 2").unwrap(), cond("1").or(cond("2")));
    }

    #[test]
    fn parse_mixed_operators_fold_left() {
        // No precedence: 1 OR 2 AND 3 groups as ((1 OR 2) AND 3).
        assert_eq!(
            parse("1 OR 2 AND 3").unwrap(),
            cond("1").or(cond("2")).and(cond("3"))
        );
    }

    #[test]
    fn parse_parenthesized_grouping() {
        assert_eq!(
            parse("1 AND (2 OR 3)").unwrap(),
            cond("1").and(cond("2").or(cond("3")))
        );
    }

    #[test]
    fn parse_symbolic_operators() {
        assert_eq!(
            parse("1&&2||3").unwrap(),
            cond("1").and(cond("2")).or(cond("3"))
        );
    }

    #[test]
    fn parse_case_insensitive_keywords() {
        assert_eq!(parse("1 and 2").unwrap(), cond("1").and(cond("2")));
        assert_eq!(parse("1 Or 2").unwrap(), cond("1").or(cond("2")));
    }

    #[test]
    fn parse_nested_groups() {
        assert_eq!(
            parse("((1 OR 2) AND 3) OR 4").unwrap(),
            cond("1").or(cond("2")).and(cond("3")).or(cond("4"))
        );
    }

    #[test]
    fn parse_tolerates_irregular_whitespace() {
        assert_eq!(
            parse(" ( 1\tAND\n2 ) ").unwrap(),
            cond("1").and(cond("2"))
        );
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn parse_rejects_dangling_operator() {
        assert!(parse("1 AND").is_err());
    }

    #[test]
    fn parse_rejects_unbalanced_parens() {
        assert!(parse("(1 AND 2").is_err());
        assert!(parse("1)").is_err());
    }

    #[test]
    fn parse_rejects_unknown_tokens() {
        assert!(parse("1 AND foo").is_err());
        assert!(parse("x").is_err());
    }

    #[test]
    fn parse_rejects_adjacent_operands() {
        assert!(parse("1 2").is_err());
    }
}
