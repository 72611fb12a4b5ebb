use thiserror::Error;

use crate::parse::ParseError;
use crate::types::ValidateError;

/// Unified error type covering parsing, validation, and serialization.
///
/// Returned by convenience methods like [`Rule::evaluate()`](crate::Rule::evaluate)
/// and [`Rule::save_payload()`](crate::Rule::save_payload).
#[derive(Debug, Error)]
pub enum VisruleError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
