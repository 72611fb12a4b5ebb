use thiserror::Error;

/// Validation failures raised when checking a rule before save or
/// evaluation.
///
/// All variants are synchronous, user-facing messages. None are fatal: they
/// block the pending action and are shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("logic required")]
    EmptyExpression,

    #[error("invalid token at position {position}: {token}")]
    InvalidToken { position: usize, token: String },

    #[error("filter {id} does not exist")]
    UnknownFilterReference { id: String },

    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    #[error("expression ends with operator")]
    DanglingOperator,

    #[error("logic must reference at least one filter")]
    NoFilterReferenced,

    #[error("duplicate condition id {id}")]
    DuplicateConditionId { id: String },

    #[error("no template context loaded")]
    MissingTemplateContext,

    #[error("at least one condition is required")]
    NoConditionsDefined,
}
