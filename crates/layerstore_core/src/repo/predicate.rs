//! Declarative conjunctive predicates over entity fields.
//!
//! # Responsibility
//! - Describe read filters without tying them to one store's query language.
//! - Evaluate predicates in memory for stores without a query engine.
//!
//! # Invariants
//! - A predicate is a conjunction; `and` only ever adds clauses.
//! - An empty predicate matches every record.
//! - A clause over a field the entity does not expose never matches.

use crate::model::entity::{Entity, FieldValue};
use std::cmp::Ordering;

/// Comparison operator of one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring match on text fields.
    Contains,
}

/// `field <comparison> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub comparison: Comparison,
    pub value: FieldValue,
}

impl Clause {
    /// Evaluates this clause against one field value read from an entity.
    pub fn matches(&self, actual: Option<&FieldValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.comparison {
            Comparison::Eq => actual == &self.value,
            Comparison::Ne => actual != &self.value,
            Comparison::Contains => match (actual, &self.value) {
                (FieldValue::Text(haystack), FieldValue::Text(needle)) => {
                    haystack.contains(needle.as_str())
                }
                _ => false,
            },
            Comparison::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Comparison::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparison::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Comparison::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Predicate matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn compare(
        field: impl Into<String>,
        comparison: Comparison,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self::all().and_compare(field, comparison, value)
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// Adds one clause to this conjunction.
    pub fn and_compare(
        mut self,
        field: impl Into<String>,
        comparison: Comparison,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            comparison,
            value: value.into(),
        });
        self
    }

    /// Conjoins `other` with this predicate, keeping every clause of both.
    pub fn and(mut self, other: &Predicate) -> Self {
        self.clauses.extend(other.clauses.iter().cloned());
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches<T: Entity>(&self, entity: &T) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.matches(entity.field(clause.field.as_str()).as_ref()))
    }
}

fn compare(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
    match (left, right) {
        (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
        (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
        (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
