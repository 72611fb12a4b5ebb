use std::fmt;

use super::Context;

/// Comparison operators for atomic conditions.
///
/// Normalized in-memory state only ever holds `Eq` or `Neq`. The persisted
/// `IN` encoding is a storage-level artifact that is expanded into sibling
/// `Eq` conditions when a rule is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "EQ"),
            CompareOp::Neq => write!(f, "NEQ"),
        }
    }
}

/// One atomic visibility test.
///
/// The `id` is a digit string, unique within a rule, that the logic
/// expression refers to as a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Tests a picklist field against a single value.
    Picklist {
        id: String,
        field: String,
        op: CompareOp,
        value: String,
    },
    /// Tests the record type of the record being displayed. The name is kept
    /// for display only and plays no part in matching.
    RecordType {
        id: String,
        op: CompareOp,
        record_type_id: String,
        record_type_name: String,
    },
}

impl Condition {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Condition::Picklist { id, .. } | Condition::RecordType { id, .. } => id,
        }
    }

    #[must_use]
    pub fn op(&self) -> CompareOp {
        match self {
            Condition::Picklist { op, .. } | Condition::RecordType { op, .. } => *op,
        }
    }

    /// Test this condition against a record context.
    ///
    /// An absent field or record type fails `Eq` and satisfies `Neq`.
    #[must_use]
    pub fn matches(&self, ctx: &Context) -> bool {
        let hit = match self {
            Condition::Picklist { field, value, .. } => ctx.field(field) == Some(value.as_str()),
            Condition::RecordType { record_type_id, .. } => {
                ctx.record_type_id() == Some(record_type_id.as_str())
            }
        };
        match self.op() {
            CompareOp::Eq => hit,
            CompareOp::Neq => !hit,
        }
    }
}
