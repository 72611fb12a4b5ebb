mod error;
mod evaluate;
mod parse;
mod schema;
mod token;
mod types;
mod validate;

pub use error::VisruleError;
pub use parse::{parse, ParseError};
pub use token::tokenize;
pub use types::{CompareOp, Condition, Context, Expr, LogicMode, Rule, RuleBuilder, ValidateError};
pub use validate::validate_expression;
