use std::fmt;

/// Parsed logic expression over condition id tokens.
///
/// Produced by [`parse()`](crate::parse()). `AND` and `OR` share a single
/// precedence level and associate left; grouping is the only way to override
/// evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Reference to a condition by its id token.
    Ref(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Condition ids referenced by this expression, in first-appearance order
    /// without duplicates.
    #[must_use]
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Ref(id) => {
                if !out.contains(&id.as_str()) {
                    out.push(id);
                }
            }
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_references(out);
                b.collect_references(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ref(id) => write!(f, "{id}"),
            Expr::And(a, b) => write!(f, "({a} AND {b})"),
            Expr::Or(a, b) => write!(f, "({a} OR {b})"),
        }
    }
}
