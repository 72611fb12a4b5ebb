mod condition;
mod context;
mod error;
mod expr;
mod rule;

pub use condition::{CompareOp, Condition};
pub use context::Context;
pub use error::ValidateError;
pub use expr::Expr;
pub use rule::{LogicMode, Rule, RuleBuilder};
