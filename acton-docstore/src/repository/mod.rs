//! Generic MongoDB repository
//!
//! This module provides a reusable query layer over a single MongoDB
//! collection. Entity types describe their fields once; per-entity composers
//! turn typed filter and update objects into native expressions; the
//! repository adds sorting, pagination, streaming, aggregation and error
//! translation on top.
//!
//! # Features
//!
//! - **Models**: [`Model`] with a construction-time [`FieldRegistry`]
//! - **Composition**: [`QueryComposer`] strategies built from [`CriteriaBuilder`] and [`UpdateBuilder`]
//! - **Sorting**: [`SortSpec`] resolved from opaque tokens such as `name-asc`
//! - **Pagination**: [`PaginationResult`] with [`MetaPagination`] page metadata
//! - **Streaming**: [`BatchStream`] over server-side cursors
//! - **Aggregation**: [`Aggregation`] pipelines with [`lookup_stages`] joins
//! - **Errors**: [`RepositoryError`] with protocol status codes; duplicate keys become 409
//!
//! # Example
//!
//! ```rust,no_run
//! use acton_docstore::repository::{
//!     CriteriaBuilder, Field, FieldRegistry, Filter, FilterParams, Model, MongoRepository,
//!     QueryComposer, RepositoryResult, UpdateBuilder,
//! };
//! use mongodb::bson::Document;
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Book {
//!     #[serde(rename = "_id")]
//!     id: i64,
//!     title: String,
//!     year: i64,
//! }
//!
//! impl Model for Book {
//!     const COLLECTION: &'static str = "books";
//!     const FIELDS: &'static [Field] = &[Field::new("id"), Field::new("title"), Field::new("year")];
//! }
//!
//! #[derive(Default)]
//! struct BookFilter {
//!     title: Option<String>,
//!     params: FilterParams,
//! }
//!
//! impl Filter for BookFilter {
//!     fn params(&self) -> &FilterParams {
//!         &self.params
//!     }
//! }
//!
//! struct BookUpdate {
//!     title: Option<String>,
//! }
//!
//! struct BookComposer;
//!
//! impl QueryComposer<Book> for BookComposer {
//!     type Filter = BookFilter;
//!     type Update = BookUpdate;
//!
//!     fn compose_filter(&self, filter: &BookFilter, fields: &FieldRegistry) -> RepositoryResult<Document> {
//!         Ok(CriteriaBuilder::new(fields)
//!             .contains("title", filter.title.as_deref())
//!             .from_to("year", filter.params())?
//!             .build())
//!     }
//!
//!     fn compose_update(&self, update: &BookUpdate) -> RepositoryResult<Document> {
//!         Ok(UpdateBuilder::new().set("title", update.title.as_deref()).build())
//!     }
//! }
//!
//! # async fn run(database: mongodb::Database) -> RepositoryResult<()> {
//! let books = MongoRepository::new(&database, BookComposer)?;
//! let cancel = CancellationToken::new();
//!
//! let filter = BookFilter {
//!     params: FilterParams::page(2, 20).with_sort("year-desc"),
//!     ..BookFilter::default()
//! };
//! let page = books.find_with_pagination(&filter, &cancel).await?;
//! println!("{}", page.meta.info);
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod compose;
mod error;
mod fields;
mod filter;
mod join;
mod mongo;
mod pagination;
mod sort;
mod stream;
mod traits;
mod translate;

// Re-export all public types
pub use aggregate::{Aggregation, PagedAggregation};
pub use compose::{from_to_filter, CriteriaBuilder, UpdateBuilder};
#[cfg(feature = "axum")]
pub use error::ErrorResponse;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use fields::{Field, FieldRegistry, ID_FIELD, ID_KEY};
pub use filter::{Filter, FilterParams, DEFAULT_PAGE_SIZE};
pub use join::lookup_stages;
pub use mongo::{DeleteOutcome, MongoRepository, UpdateOutcome};
pub use pagination::{MetaPagination, Pagination, PaginationResult};
pub use sort::{SortDirection, SortSpec};
pub use stream::BatchStream;
pub use traits::{Model, QueryComposer, RepositoryResult};
pub use translate::{
    duplicate_key_message, extract_duplicate_key, translate_write_error, DUPLICATE_KEY_CODE,
};
