use std::collections::HashSet;
use std::fmt;

use crate::error::VisruleError;
use crate::token::tokenize;
use crate::validate::validate_expression;

use super::condition::{CompareOp, Condition};
use super::context::Context;
use super::error::ValidateError;

/// How a rule combines its conditions.
///
/// `All` and `Any` are derived shorthands (AND / OR of every condition);
/// `Custom` requires an explicit logic expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogicMode {
    #[default]
    All,
    Any,
    Custom,
}

impl fmt::Display for LogicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicMode::All => write!(f, "ALL"),
            LogicMode::Any => write!(f, "ANY"),
            LogicMode::Custom => write!(f, "CUSTOM"),
        }
    }
}

/// The visibility configuration for one UI element: a list of atomic
/// conditions plus the logic combining them.
///
/// Rules are built with [`RuleBuilder`] or hydrated from a persisted JSON
/// blob with [`Rule::from_json()`]. The `logic_expression` field is only
/// meaningful when `logic_mode` is [`LogicMode::Custom`]; the derived modes
/// synthesize their expression at save time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub logic_mode: LogicMode,
    pub logic_expression: String,
    pub conditions: Vec<Condition>,
}

impl Rule {
    /// Start building a rule.
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::new()
    }

    /// The expression persisted for this rule: `None` with zero conditions,
    /// the trimmed custom expression for `Custom`, otherwise every condition
    /// id joined with the mode's operator.
    #[must_use]
    pub fn effective_expression(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }
        let joiner = match self.logic_mode {
            LogicMode::Custom => return Some(self.logic_expression.trim().to_owned()),
            LogicMode::All => " AND ",
            LogicMode::Any => " OR ",
        };
        Some(
            self.conditions
                .iter()
                .map(Condition::id)
                .collect::<Vec<_>>()
                .join(joiner),
        )
    }

    /// Check this rule for saving or evaluation.
    ///
    /// Condition ids must be unique in every mode. The logic expression is
    /// only checked for `Custom`; the derived modes are well-formed by
    /// construction once at least one condition exists.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidateError`] found.
    pub fn validate(&self) -> Result<(), ValidateError> {
        if self.conditions.is_empty() {
            return Err(ValidateError::NoConditionsDefined);
        }
        let mut ids: HashSet<&str> = HashSet::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            if !ids.insert(condition.id()) {
                return Err(ValidateError::DuplicateConditionId {
                    id: condition.id().to_owned(),
                });
            }
        }
        if self.logic_mode == LogicMode::Custom {
            validate_expression(&tokenize(&self.logic_expression), &ids)?;
        }
        Ok(())
    }

    /// Decide whether the element guarded by this rule is visible for the
    /// given record context.
    ///
    /// ```
    /// use visrule::{Context, RuleBuilder};
    ///
    /// let rule = RuleBuilder::new()
    ///     .picklist("Status", "Approved")
    ///     .picklist("Stage", "Closed")
    ///     .custom("1 OR 2")
    ///     .build()
    ///     .unwrap();
    ///
    /// let ctx = Context::new().set("Status", "Approved");
    /// assert!(rule.evaluate(&ctx).unwrap());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`VisruleError`] if the rule fails validation or its custom
    /// expression does not parse.
    pub fn evaluate(&self, ctx: &Context) -> Result<bool, VisruleError> {
        self.validate()?;
        match self.logic_mode {
            LogicMode::All => Ok(self.conditions.iter().all(|c| c.matches(ctx))),
            LogicMode::Any => Ok(self.conditions.iter().any(|c| c.matches(ctx))),
            LogicMode::Custom => {
                let expr = crate::parse::parse(self.logic_expression.trim())?;
                let truthy: HashSet<&str> = self
                    .conditions
                    .iter()
                    .filter(|c| c.matches(ctx))
                    .map(Condition::id)
                    .collect();
                Ok(crate::evaluate::evaluate(&expr, &truthy))
            }
        }
    }

    /// Validate and serialize this rule for persistence against the owning
    /// template.
    ///
    /// The template id is the storage key held by the embedding application;
    /// a rule edited without a resolved template cannot be saved.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::MissingTemplateContext`] when no template id
    /// is available, any other [`ValidateError`] the rule fails with, or a
    /// serialization error.
    pub fn save_payload(&self, template_id: Option<&str>) -> Result<String, VisruleError> {
        match template_id {
            Some(id) if !id.trim().is_empty() => {}
            _ => return Err(ValidateError::MissingTemplateContext.into()),
        }
        self.validate()?;
        Ok(self.to_json()?)
    }

    /// Serialize to the persisted JSON schema (version 2).
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        crate::schema::encode(self)
    }

    /// Hydrate a rule from a persisted JSON blob, current or legacy.
    ///
    /// Never fails: malformed input degrades to an empty rule with a logged
    /// warning.
    #[must_use]
    pub fn from_json(raw: &str) -> Rule {
        crate::schema::decode(raw)
    }
}

/// Builder for constructing a [`Rule`].
///
/// Conditions are appended one at a time and receive consecutive numeric ids
/// starting at `"1"`, so the id invariants hold by construction.
///
/// # Example
///
/// ```
/// use visrule::RuleBuilder;
///
/// let rule = RuleBuilder::new()
///     .picklist("Status", "Approved")
///     .record_type("012A0000000AbCd", "Invoice")
///     .custom("1 AND 2")
///     .build()
///     .unwrap();
/// assert_eq!(rule.conditions.len(), 2);
/// ```
#[derive(Debug)]
pub struct RuleBuilder {
    logic_mode: LogicMode,
    logic_expression: String,
    conditions: Vec<Condition>,
    next_id: u32,
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self {
            logic_mode: LogicMode::All,
            logic_expression: String::new(),
            conditions: Vec::new(),
            next_id: 1,
        }
    }
}

impl RuleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }

    /// Add a picklist equality condition.
    #[must_use]
    pub fn picklist(mut self, field: &str, value: &str) -> Self {
        let id = self.mint_id();
        self.conditions.push(Condition::Picklist {
            id,
            field: field.to_owned(),
            op: CompareOp::Eq,
            value: value.to_owned(),
        });
        self
    }

    /// Add a picklist inequality condition.
    #[must_use]
    pub fn picklist_not(mut self, field: &str, value: &str) -> Self {
        let id = self.mint_id();
        self.conditions.push(Condition::Picklist {
            id,
            field: field.to_owned(),
            op: CompareOp::Neq,
            value: value.to_owned(),
        });
        self
    }

    /// Add a record type equality condition.
    #[must_use]
    pub fn record_type(mut self, record_type_id: &str, record_type_name: &str) -> Self {
        let id = self.mint_id();
        self.conditions.push(Condition::RecordType {
            id,
            op: CompareOp::Eq,
            record_type_id: record_type_id.to_owned(),
            record_type_name: record_type_name.to_owned(),
        });
        self
    }

    /// Add a record type inequality condition.
    #[must_use]
    pub fn record_type_not(mut self, record_type_id: &str, record_type_name: &str) -> Self {
        let id = self.mint_id();
        self.conditions.push(Condition::RecordType {
            id,
            op: CompareOp::Neq,
            record_type_id: record_type_id.to_owned(),
            record_type_name: record_type_name.to_owned(),
        });
        self
    }

    /// Require every condition to match.
    #[must_use]
    pub fn match_all(mut self) -> Self {
        self.logic_mode = LogicMode::All;
        self
    }

    /// Require any condition to match.
    #[must_use]
    pub fn match_any(mut self) -> Self {
        self.logic_mode = LogicMode::Any;
        self
    }

    /// Combine conditions with an explicit logic expression.
    #[must_use]
    pub fn custom(mut self, expression: &str) -> Self {
        self.logic_mode = LogicMode::Custom;
        self.logic_expression = expression.to_owned();
        self
    }

    /// Validate and produce the rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError`] if the rule is not well-formed.
    pub fn build(self) -> Result<Rule, ValidateError> {
        let rule = Rule {
            logic_mode: self.logic_mode,
            logic_expression: self.logic_expression,
            conditions: self.conditions,
        };
        rule.validate()?;
        Ok(rule)
    }
}
