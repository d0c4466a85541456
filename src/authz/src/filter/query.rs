//! Minimal query model for the filter rewriter

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean filter predicate over model fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Predicate {
    /// `field == value`
    Eq { field: String, value: Value },

    /// `field IN (values)`
    In { field: String, values: Vec<Value> },

    /// Every clause holds
    And { clauses: Vec<Predicate> },

    /// Any clause holds
    Or { clauses: Vec<Predicate> },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(clauses: Vec<Predicate>) -> Self {
        Self::And { clauses }
    }

    /// Value `field` is pinned to, looking through conjunctions only
    pub fn pinned_value(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Eq { field: f, value } if f == field && !value.is_null() => Some(value),
            Self::And { clauses } => clauses.iter().find_map(|c| c.pinned_value(field)),
            _ => None,
        }
    }
}

/// A read query as seen by the filter rewriter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Predicate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Value the existing filter pins `field` to, if any
    pub fn pinned_value(&self, field: &str) -> Option<&Value> {
        self.filter.as_ref()?.pinned_value(field)
    }

    /// AND `restriction` onto the existing filter, never replacing it
    pub fn restrict(&mut self, restriction: Predicate) {
        self.filter = Some(match self.filter.take() {
            None => restriction,
            Some(existing) => Predicate::and(vec![existing, restriction]),
        });
    }
}
