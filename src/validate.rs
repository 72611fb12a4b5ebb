use std::collections::HashSet;

use crate::token::is_condition_id;
use crate::types::ValidateError;

/// Validate a tokenized logic expression against the declared condition ids.
///
/// A single left-to-right scan tracks whether an operand is expected next and
/// counts open parentheses; there is no backtracking. After the scan the
/// expression must not end on an operator, parentheses must balance, and at
/// least one condition id must have been referenced. The first failure wins.
///
/// # Errors
///
/// Returns the first [`ValidateError`] encountered: an empty token list, an
/// out-of-place or unrecognized token, a reference to an undeclared id,
/// unbalanced parentheses, or a trailing operator.
pub fn validate_expression(
    tokens: &[String],
    valid_ids: &HashSet<&str>,
) -> Result<(), ValidateError> {
    if tokens.is_empty() {
        return Err(ValidateError::EmptyExpression);
    }

    let mut expecting_operand = true;
    let mut open_parens = 0_u32;
    let mut referenced = false;

    for (position, token) in tokens.iter().enumerate() {
        if expecting_operand {
            match token.as_str() {
                "(" => open_parens += 1,
                t if is_condition_id(t) => {
                    if !valid_ids.contains(t) {
                        return Err(ValidateError::UnknownFilterReference { id: t.to_owned() });
                    }
                    referenced = true;
                    expecting_operand = false;
                }
                _ => {
                    return Err(ValidateError::InvalidToken {
                        position,
                        token: token.clone(),
                    })
                }
            }
        } else {
            match token.as_str() {
                ")" => {
                    if open_parens == 0 {
                        return Err(ValidateError::UnbalancedParentheses);
                    }
                    open_parens -= 1;
                }
                "AND" | "OR" => expecting_operand = true,
                _ => {
                    return Err(ValidateError::InvalidToken {
                        position,
                        token: token.clone(),
                    })
                }
            }
        }
    }

    if expecting_operand {
        return Err(ValidateError::DanglingOperator);
    }
    if open_parens != 0 {
        return Err(ValidateError::UnbalancedParentheses);
    }
    if !referenced {
        return Err(ValidateError::NoFilterReferenced);
    }
    Ok(())
}
