//! Comparison operators accepted by WHERE and HAVING predicates.
//!
//! The set is closed: [`Operator::parse`] is the only way to get an operator from
//! caller text and it rejects anything outside the allow-list before any SQL is
//! rendered.

use crate::error::{OrmError, OrmResult};
use std::fmt;
use std::str::FromStr;

/// Allow-listed comparison operator.
///
/// # Example
/// ```
/// use pgmodel::Operator;
///
/// assert_eq!(Operator::parse("not like").unwrap(), Operator::NotLike);
/// assert!(Operator::parse("; DROP").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`, bound as a Postgres array
    In,
    /// `NOT IN`, bound as a Postgres array
    NotIn,
    /// `IS NULL`, binds nothing
    IsNull,
    /// `IS NOT NULL`, binds nothing
    IsNotNull,
}

impl Operator {
    /// Every allowed operator.
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Like,
        Operator::NotLike,
        Operator::In,
        Operator::NotIn,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// Parse operator text, case-insensitively.
    ///
    /// Surrounding whitespace is ignored; inner spacing must be a single space
    /// (`NOT LIKE`, `IS NOT NULL`).
    pub fn parse(op: &str) -> OrmResult<Self> {
        let normalized = op.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| OrmError::InvalidOperator(op.to_string()))
    }

    /// Canonical upper-case SQL text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the predicate consumes a bound value.
    pub fn binds_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Append `column <op> $n` to `out`.
    ///
    /// `IN`/`NOT IN` compare against an array parameter, and the null checks
    /// take no placeholder at all.
    pub(crate) fn write_predicate(&self, out: &mut String, column: &str, placeholder: usize) {
        use std::fmt::Write;

        let _ = match self {
            Operator::In => write!(out, "{column} = ANY(${placeholder})"),
            Operator::NotIn => write!(out, "{column} <> ALL(${placeholder})"),
            Operator::IsNull | Operator::IsNotNull => write!(out, "{column} {}", self.as_str()),
            _ => write!(out, "{column} {} ${placeholder}", self.as_str()),
        };
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Operator {
    type Error = OrmError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
