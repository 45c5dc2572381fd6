//! Adapter queries
//!
//! A query names the model it reads, a condition tree, the fields to return,
//! a sort order, limit, offset and a uniqueness flag.

use crate::condition::Condition;
use crate::record::Model;
use crate::selection::SortSpec;

/// Aggregate functions accepted by [`SdbAdapter::aggregate`](super::SdbAdapter::aggregate).
///
/// Only [`Aggregate::Count`] is answered; the others are rejected as
/// unsupported queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Min(String),
    Max(String),
    Sum(String),
    Avg(String),
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Min(_) => "min",
            Aggregate::Max(_) => "max",
            Aggregate::Sum(_) => "sum",
            Aggregate::Avg(_) => "avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    model: Model,
    conditions: Condition,
    fields: Vec<String>,
    order: Vec<SortSpec>,
    limit: Option<usize>,
    offset: usize,
    unique: bool,
}

impl Query {
    /// A query for every record of `model`
    pub fn new(model: Model) -> Self {
        Self {
            model,
            conditions: Condition::always(),
            fields: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
            unique: false,
        }
    }

    /// Conjoins a condition onto the query
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions = self.conditions.and_with(condition);
        self
    }

    /// Restricts the returned fields; all model fields by default
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a sort key. Only the first is pushed to the store.
    pub fn order_by(mut self, sort: SortSpec) -> Self {
        self.order.push(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn conditions(&self) -> &Condition {
        &self.conditions
    }

    /// The fields to return: the requested ones, or every model field
    pub fn returned_fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            self.model.field_names()
        } else {
            self.fields.clone()
        }
    }

    pub fn order(&self) -> &[SortSpec] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> usize {
        self.offset
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Attributes a select must return to answer this query: the returned
    /// fields plus every field the conditions and sort keys mention.
    pub(crate) fn required_attributes(&self) -> Vec<String> {
        let mut names = self.returned_fields();
        let mentioned = self
            .conditions
            .comparisons()
            .into_iter()
            .map(|c| c.field.clone())
            .chain(self.order.iter().map(|s| s.field.clone()));
        for name in mentioned {
            if self.model.get_field(&name).is_some() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}
