//! Repository trait definitions
//!
//! - [`Model`]: a stored entity type, its collection and its field registry
//! - [`QueryComposer`]: the per-entity strategy that turns typed filter and
//!   update objects into native MongoDB expressions
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{
//!     CriteriaBuilder, Field, FieldRegistry, Filter, FilterParams, Model, QueryComposer,
//!     RepositoryResult, UpdateBuilder,
//! };
//! use mongodb::bson::Document;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "_id")]
//!     id: i64,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Model for User {
//!     const COLLECTION: &'static str = "users";
//!     const FIELDS: &'static [Field] = &[Field::new("id"), Field::new("name"), Field::new("age")];
//! }
//!
//! #[derive(Default)]
//! struct UserFilter {
//!     name: Option<String>,
//!     params: FilterParams,
//! }
//!
//! impl Filter for UserFilter {
//!     fn params(&self) -> &FilterParams {
//!         &self.params
//!     }
//! }
//!
//! struct UserUpdate {
//!     name: Option<String>,
//!     age: Option<i64>,
//! }
//!
//! struct UserComposer;
//!
//! impl QueryComposer<User> for UserComposer {
//!     type Filter = UserFilter;
//!     type Update = UserUpdate;
//!
//!     fn compose_filter(
//!         &self,
//!         filter: &UserFilter,
//!         fields: &FieldRegistry,
//!     ) -> RepositoryResult<Document> {
//!         Ok(CriteriaBuilder::new(fields)
//!             .eq("name", filter.name.as_deref())
//!             .from_to("age", filter.params())?
//!             .build())
//!     }
//!
//!     fn compose_update(&self, update: &UserUpdate) -> RepositoryResult<Document> {
//!         Ok(UpdateBuilder::new()
//!             .set("name", update.name.as_deref())
//!             .set("age", update.age)
//!             .build())
//!     }
//! }
//! ```

use mongodb::bson::Document;
use serde::{de::DeserializeOwned, Serialize};

use super::error::RepositoryError;
use super::fields::Field;
use super::filter::Filter;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A stored entity type
///
/// The `id` field must appear in [`FIELDS`](Model::FIELDS) and is stored under
/// `_id`, so the struct field is typically annotated with
/// `#[serde(rename = "_id")]`.
pub trait Model: Serialize + DeserializeOwned + Unpin + Send + Sync + 'static {
    /// Collection the entity is stored in
    const COLLECTION: &'static str;

    /// Queryable fields, including `id`
    const FIELDS: &'static [Field];
}

/// Per-entity filter and update composition
///
/// Implementations are strategy objects handed to
/// [`MongoRepository`](super::MongoRepository) at construction.
///
/// # Contract
///
/// - [`compose_filter`](QueryComposer::compose_filter) starts from the empty
///   (match-everything) predicate and ANDs in one clause per criterion that is
///   present. A filter with every criterion absent must compose to `{}`.
/// - [`compose_update`](QueryComposer::compose_update) emits one `$set` entry
///   per field that is present. Absent fields are never cleared.
///
/// [`CriteriaBuilder`](super::CriteriaBuilder) and
/// [`UpdateBuilder`](super::UpdateBuilder) implement both halves of the
/// contract.
pub trait QueryComposer<M: Model>: Send + Sync {
    /// Typed filter accepted by the repository
    type Filter: Filter;

    /// Typed partial update accepted by the repository
    type Update: Send + Sync;

    /// Build the combined filter
    ///
    /// # Errors
    ///
    /// Returns a validation error (status 400) for invalid criteria, such as a
    /// range on an unknown field.
    fn compose_filter(
        &self,
        filter: &Self::Filter,
        fields: &super::fields::FieldRegistry,
    ) -> RepositoryResult<Document>;

    /// Build the update expression
    fn compose_update(&self, update: &Self::Update) -> RepositoryResult<Document>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{CriteriaBuilder, FieldRegistry, FilterParams, UpdateBuilder};
    use mongodb::bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Product {
        #[serde(rename = "_id")]
        id: i64,
        title: String,
        price: i64,
    }

    impl Model for Product {
        const COLLECTION: &'static str = "products";
        const FIELDS: &'static [Field] =
            &[Field::new("id"), Field::new("title"), Field::new("price")];
    }

    #[derive(Default)]
    struct ProductFilter {
        title: Option<String>,
        params: FilterParams,
    }

    impl Filter for ProductFilter {
        fn params(&self) -> &FilterParams {
            &self.params
        }
    }

    #[derive(Default)]
    struct ProductUpdate {
        title: Option<String>,
        price: Option<i64>,
    }

    struct ProductComposer;

    impl QueryComposer<Product> for ProductComposer {
        type Filter = ProductFilter;
        type Update = ProductUpdate;

        fn compose_filter(
            &self,
            filter: &ProductFilter,
            fields: &FieldRegistry,
        ) -> RepositoryResult<Document> {
            Ok(CriteriaBuilder::new(fields)
                .eq("title", filter.title.as_deref())
                .from_to("price", filter.params())?
                .build())
        }

        fn compose_update(&self, update: &ProductUpdate) -> RepositoryResult<Document> {
            Ok(UpdateBuilder::new()
                .set("title", update.title.as_deref())
                .set("price", update.price)
                .build())
        }
    }

    fn fields() -> FieldRegistry {
        FieldRegistry::new(Product::COLLECTION, Product::FIELDS).unwrap()
    }

    #[test]
    fn test_repository_result_type() {
        let ok_result: RepositoryResult<i32> = Ok(42);
        assert!(ok_result.is_ok());

        let err_result: RepositoryResult<i32> = Err(RepositoryError::validation_failed("bad"));
        assert!(err_result.is_err());
    }

    #[test]
    fn test_empty_filter_composes_to_match_all() {
        let filter = ProductComposer
            .compose_filter(&ProductFilter::default(), &fields())
            .unwrap();
        assert_eq!(filter, doc! {});
    }

    #[test]
    fn test_present_criteria_are_anded() {
        let filter = ProductFilter {
            title: Some("lamp".to_string()),
            params: FilterParams::default().with_range(None, Some(10), Some(20)),
        };
        let composed = ProductComposer.compose_filter(&filter, &fields()).unwrap();
        assert_eq!(
            composed,
            doc! { "$and": [
                { "title": "lamp" },
                { "price": { "$gte": 10_i64, "$lt": 20_i64 } },
            ] }
        );
    }

    #[test]
    fn test_update_sets_only_present_fields() {
        let update = ProductUpdate {
            price: Some(99),
            ..ProductUpdate::default()
        };
        let composed = ProductComposer.compose_update(&update).unwrap();
        assert_eq!(composed, doc! { "$set": { "price": 99_i64 } });
    }
}
