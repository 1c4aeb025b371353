//! Composable predicates over entity properties.
//!
//! A [`Predicate`] is a flat, ordered list of [`Term`]s. Each term carries the
//! [`Combinator`] that joins it to the term emitted before it, so
//! `eq(a).or_eq(b).eq(c)` reads left to right as `a OR b AND c`. The first
//! emitted term's combinator is ignored.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// How a term joins the term emitted before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    /// SQL separator for this combinator, padded with spaces.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

/// A non-empty ordered list of values for an `IN` comparison.
///
/// There is no way to build an empty set, so a compiled predicate can never
/// contain `IN ()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    /// Build a set, returning `None` when `values` is empty.
    pub fn new<I, V>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            None
        } else {
            Some(Self(values))
        }
    }

    /// Number of values (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate values in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Values as a slice.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl TryFrom<Vec<Value>> for ValueSet {
    type Error = Error;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        if values.is_empty() {
            Err(Error::EmptyValueSet)
        } else {
            Ok(Self(values))
        }
    }
}

impl From<ValueSet> for Vec<Value> {
    fn from(set: ValueSet) -> Self {
        set.0
    }
}

/// A single term of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// `property <op> value`.
    Comparison {
        combinator: Combinator,
        property: String,
        op: ComparisonOp,
        value: Value,
    },
    /// `property IN (values...)`.
    In {
        combinator: Combinator,
        property: String,
        values: ValueSet,
    },
    /// A parenthesized nested predicate.
    Compound {
        combinator: Combinator,
        nested: Predicate,
    },
}

impl Term {
    /// The combinator joining this term to the previous one.
    pub fn combinator(&self) -> Combinator {
        match self {
            Term::Comparison { combinator, .. }
            | Term::In { combinator, .. }
            | Term::Compound { combinator, .. } => *combinator,
        }
    }
}

/// An ordered list of terms compiled left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    terms: Vec<Term>,
}

impl Predicate {
    /// Create an empty predicate (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Terms in compilation order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Check if the predicate has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append an arbitrary term.
    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    fn compare(
        self,
        combinator: Combinator,
        property: impl Into<String>,
        op: ComparisonOp,
        value: impl Into<Value>,
    ) -> Self {
        self.with_term(Term::Comparison {
            combinator,
            property: property.into(),
            op,
            value: value.into(),
        })
    }

    /// `AND property = value`.
    pub fn eq(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Eq, value)
    }

    /// `OR property = value`.
    pub fn or_eq(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Eq, value)
    }

    /// `AND property <> value`.
    pub fn not_eq(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Ne, value)
    }

    /// `OR property <> value`.
    pub fn or_not_eq(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Ne, value)
    }

    /// `AND property < value`.
    pub fn lt(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Lt, value)
    }

    /// `OR property < value`.
    pub fn or_lt(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Lt, value)
    }

    /// `AND property <= value`.
    pub fn lte(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Le, value)
    }

    /// `OR property <= value`.
    pub fn or_lte(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Le, value)
    }

    /// `AND property > value`.
    pub fn gt(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Gt, value)
    }

    /// `OR property > value`.
    pub fn or_gt(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Gt, value)
    }

    /// `AND property >= value`.
    pub fn gte(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::And, property, ComparisonOp::Ge, value)
    }

    /// `OR property >= value`.
    pub fn or_gte(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(Combinator::Or, property, ComparisonOp::Ge, value)
    }

    fn set(
        self,
        combinator: Combinator,
        property: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        match ValueSet::new(values) {
            Some(values) => self.with_term(Term::In {
                combinator,
                property: property.into(),
                values,
            }),
            // An empty list constrains nothing; the term is left out.
            None => self,
        }
    }

    /// `AND property IN (values...)`. Skipped when `values` is empty.
    pub fn is_in(
        self,
        property: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        self.set(Combinator::And, property, values)
    }

    /// `OR property IN (values...)`. Skipped when `values` is empty.
    pub fn or_in(
        self,
        property: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        self.set(Combinator::Or, property, values)
    }

    /// `AND (nested)`.
    pub fn and(self, nested: Predicate) -> Self {
        self.with_term(Term::Compound {
            combinator: Combinator::And,
            nested,
        })
    }

    /// `OR (nested)`.
    pub fn or(self, nested: Predicate) -> Self {
        self.with_term(Term::Compound {
            combinator: Combinator::Or,
            nested,
        })
    }
}
