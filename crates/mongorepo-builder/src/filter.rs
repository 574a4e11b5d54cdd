//! Filter document helpers
//!
//! The free functions cover the handful of shapes used everywhere
//! (case-insensitive regex, `$or` clause lists, `$exists`, `_id` lists).
//! [`FilterBuilder`] covers the rest.

use bson::{doc, oid::ObjectId, Bson, Document};

use crate::op::Op;

const CASE_INSENSITIVE: &str = "i";

const REGEX_OPTIONS: &str = "$options";

fn regex_condition(value: impl Into<Bson>) -> Document {
    let mut condition = Document::new();
    condition.insert(Op::Regex.as_str(), value.into());
    condition.insert(REGEX_OPTIONS, CASE_INSENSITIVE);
    condition
}

/// Adds a case-insensitive `$regex` condition on `key` to `filter` and returns it.
pub fn regex(mut filter: Document, key: &str, value: impl Into<Bson>) -> Document {
    filter.insert(key, regex_condition(value));
    filter
}

/// Creates a filter holding a single case-insensitive `$regex` condition.
pub fn regex_to(key: &str, value: impl Into<Bson>) -> Document {
    regex(Document::new(), key, value)
}

/// Appends `{key: value}` to a list of `$or` clauses.
pub fn or_push(mut clauses: Vec<Document>, key: &str, value: impl Into<Bson>) -> Vec<Document> {
    let mut clause = Document::new();
    clause.insert(key, value.into());
    clauses.push(clause);
    clauses
}

/// Appends `{field: {$exists: exists}}` to `doc`.
pub fn append_exists(field: &str, exists: bool, mut doc: Document) -> Document {
    let mut condition = Document::new();
    condition.insert(Op::Exists.as_str(), exists);
    doc.insert(field, condition);
    doc
}

/// `{_id: {$in: [ids...]}}`
pub fn id_in<I>(ids: I) -> Document
where
    I: IntoIterator<Item = ObjectId>,
{
    let ids: Vec<Bson> = ids.into_iter().map(Bson::ObjectId).collect();
    let mut condition = Document::new();
    condition.insert(Op::In.as_str(), ids);
    doc! { "_id": condition }
}

/// Fluent builder for filter documents.
///
/// Operator conditions on the same field are merged:
///
/// ```
/// use mongorepo_builder::FilterBuilder;
/// use bson::doc;
///
/// let filter = FilterBuilder::new()
///     .gte("age", 18)
///     .lt("age", 65)
///     .eq("status", "active")
///     .build();
///
/// assert_eq!(filter, doc! { "age": { "$gte": 18, "$lt": 65 }, "status": "active" });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBuilder {
    doc: Document,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing filter.
    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    /// Plain equality, `{field: value}`.
    pub fn eq(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.doc.insert(field, value.into());
        self
    }

    pub fn ne(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, Op::Ne, value.into())
    }

    pub fn gt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, Op::Gt, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, Op::Gte, value.into())
    }

    pub fn lt(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, Op::Lt, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Bson>) -> Self {
        self.condition(field, Op::Lte, value.into())
    }

    /// `{field: {$in: [...]}}`
    pub fn in_list<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.condition(field, Op::In, Bson::Array(values))
    }

    /// `{field: {$nin: [...]}}`
    pub fn not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.condition(field, Op::Nin, Bson::Array(values))
    }

    pub fn exists(self, field: &str, exists: bool) -> Self {
        self.condition(field, Op::Exists, Bson::Boolean(exists))
    }

    /// Case-insensitive regular expression match.
    pub fn regex(mut self, field: &str, pattern: impl Into<Bson>) -> Self {
        self = self.condition(field, Op::Regex, pattern.into());
        self.condition_named(field, REGEX_OPTIONS, Bson::String(CASE_INSENSITIVE.to_string()))
    }

    pub fn elem_match(self, field: &str, criteria: Document) -> Self {
        self.condition(field, Op::ElemMatch, Bson::Document(criteria))
    }

    pub fn or(self, clauses: Vec<Document>) -> Self {
        self.logical(Op::Or, clauses)
    }

    pub fn and(self, clauses: Vec<Document>) -> Self {
        self.logical(Op::And, clauses)
    }

    pub fn nor(self, clauses: Vec<Document>) -> Self {
        self.logical(Op::Nor, clauses)
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    pub fn build(self) -> Document {
        self.doc
    }

    fn condition(self, field: &str, op: Op, value: Bson) -> Self {
        self.condition_named(field, op.as_str(), value)
    }

    fn condition_named(mut self, field: &str, op: &str, value: Bson) -> Self {
        if let Some(Bson::Document(existing)) = self.doc.get_mut(field) {
            // only merge into operator documents, never into a literal sub-document
            if !existing.is_empty() && existing.keys().all(|k| k.starts_with('$')) {
                existing.insert(op, value);
                return self;
            }
        }
        let mut condition = Document::new();
        condition.insert(op, value);
        self.doc.insert(field, condition);
        self
    }

    fn logical(mut self, op: Op, clauses: Vec<Document>) -> Self {
        let clauses = clauses.into_iter().map(Bson::Document);
        match self.doc.get_mut(op.as_str()) {
            Some(Bson::Array(existing)) => existing.extend(clauses),
            _ => {
                self.doc.insert(op.as_str(), Bson::Array(clauses.collect()));
            }
        }
        self
    }
}

impl From<FilterBuilder> for Document {
    fn from(builder: FilterBuilder) -> Self {
        builder.build()
    }
}
