mod error;
mod grammar;

pub use error::ParseError;

use crate::types::Expr;

/// Parse a logic expression string into an [`Expr`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    grammar::expression
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
