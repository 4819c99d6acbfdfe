//! Builders for combined filters and partial updates
//!
//! [`CriteriaBuilder`] starts from the match-everything predicate and ANDs in
//! one clause per criterion that is present. [`UpdateBuilder`] emits one
//! `$set` entry per field that is present and leaves everything else alone.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{CriteriaBuilder, Field, FieldRegistry, FilterParams};
//! use mongodb::bson::doc;
//!
//! const FIELDS: &[Field] = &[Field::new("id"), Field::new("age")];
//! let fields = FieldRegistry::new("users", FIELDS).unwrap();
//!
//! let params = FilterParams::default().with_range(None, Some(50), Some(100));
//! let filter = CriteriaBuilder::new(&fields)
//!     .eq("name", None::<&str>)
//!     .from_to("age", &params)
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(filter, doc! { "$and": [{ "age": { "$gte": 50_i64, "$lt": 100_i64 } }] });
//! ```

use mongodb::bson::{doc, Bson, Document, Regex};

use super::error::RepositoryError;
use super::fields::{FieldRegistry, ID_FIELD, ID_KEY};
use super::filter::FilterParams;
use super::traits::RepositoryResult;

/// Conjunctive filter builder
#[derive(Debug, Clone)]
pub struct CriteriaBuilder<'a> {
    fields: &'a FieldRegistry,
    clauses: Vec<Document>,
}

impl<'a> CriteriaBuilder<'a> {
    /// Start from the match-everything predicate
    #[must_use]
    pub fn new(fields: &'a FieldRegistry) -> Self {
        Self {
            fields,
            clauses: Vec::new(),
        }
    }

    /// AND in a clause when one is given
    #[must_use]
    pub fn clause(mut self, clause: Option<Document>) -> Self {
        if let Some(clause) = clause {
            self.clauses.push(clause);
        }
        self
    }

    /// `{ key: value }` when the value is present
    #[must_use]
    pub fn eq<V: Into<Bson>>(self, key: &str, value: Option<V>) -> Self {
        self.clause(value.map(|v| single(key, v.into())))
    }

    /// `{ key: { $in: [...] } }` when the list is present
    #[must_use]
    pub fn one_of<V: Into<Bson>>(self, key: &str, values: Option<Vec<V>>) -> Self {
        self.clause(values.map(|vs| {
            let values: Vec<Bson> = vs.into_iter().map(Into::into).collect();
            single(key, doc! { "$in": values }.into())
        }))
    }

    /// Case-insensitive substring match when the text is present
    #[must_use]
    pub fn contains(self, key: &str, text: Option<&str>) -> Self {
        self.clause(text.map(|t| {
            let pattern = Regex {
                pattern: regex::escape(t),
                options: "i".to_string(),
            };
            single(key, Bson::RegularExpression(pattern))
        }))
    }

    /// AND in the `[from, to)` range clause described by `params`
    ///
    /// # Errors
    ///
    /// Returns a validation error when the range field is unknown.
    pub fn from_to(self, default_field: &str, params: &FilterParams) -> RepositoryResult<Self> {
        let clause = from_to_filter(default_field, params, self.fields)?;
        Ok(self.clause(clause))
    }

    /// Number of clauses collected so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether no clause has been added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Finish the combined filter; `{}` when no clause was added
    #[must_use]
    pub fn build(self) -> Document {
        if self.clauses.is_empty() {
            Document::new()
        } else {
            doc! { "$and": self.clauses }
        }
    }
}

/// Build the half-open range clause `{ field: { $gte: from, $lt: to } }`
///
/// `params.from_to_key` overrides `default_field`. The logical `id` field is
/// mapped to `_id`; any other name must be a registered field. The field is
/// checked even when neither bound is present, in which case `Ok(None)` is
/// returned.
///
/// # Errors
///
/// Returns a validation error (status 400) naming the field when it is not
/// registered for the model.
pub fn from_to_filter(
    default_field: &str,
    params: &FilterParams,
    fields: &FieldRegistry,
) -> RepositoryResult<Option<Document>> {
    let requested = params.from_to_key.as_deref().unwrap_or(default_field);
    let key = if requested == ID_FIELD {
        ID_KEY
    } else {
        fields.storage_key(requested).ok_or_else(|| {
            RepositoryError::validation_failed(format!(
                "Invalid fromToKey field: {}",
                requested
            ))
            .with_entity(fields.collection())
        })?
    };

    if !params.has_range() {
        return Ok(None);
    }

    let mut bounds = Document::new();
    if let Some(from) = params.from {
        bounds.insert("$gte", from);
    }
    if let Some(to) = params.to {
        bounds.insert("$lt", to);
    }

    Ok(Some(single(key, bounds.into())))
}

/// `$set`-only partial update builder
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    set: Document,
}

impl UpdateBuilder {
    /// Start an empty update
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` when the value is present
    #[must_use]
    pub fn set<V: Into<Bson>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.set.insert(key, value.into());
        }
        self
    }

    /// Whether no field will be set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Finish the update; `{}` when no field was set
    #[must_use]
    pub fn build(self) -> Document {
        if self.set.is_empty() {
            Document::new()
        } else {
            doc! { "$set": self.set }
        }
    }
}

fn single(key: &str, value: Bson) -> Document {
    let mut clause = Document::new();
    clause.insert(key, value);
    clause
}
