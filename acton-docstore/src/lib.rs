//! # acton-docstore
//!
//! Generic repository layer over MongoDB collections.
//!
//! ## Features
//!
//! - **Typed repositories**: one [`MongoRepository`](repository::MongoRepository) per model type
//! - **Pluggable composition**: per-entity filter and update strategies
//! - **Pagination**: page metadata computed alongside a concurrent count
//! - **Streaming**: batched cursors released on exhaustion, drop or cancellation
//! - **Aggregation**: composable pipelines with cross-collection joins
//! - **Error translation**: duplicate keys surface as 409 conflicts
//! - **Configuration**: Figment layering of files and `ACTON_` environment variables
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_docstore::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let database = connect(&config.mongo).await?;
//!     ping(&database).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod repository;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{Config, MongoConfig, RepositoryConfig, ServiceConfig};
    pub use crate::database::{connect, ping};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::repository::{
        BatchStream, CriteriaBuilder, DeleteOutcome, Field, FieldRegistry, Filter, FilterParams,
        Model, MongoRepository, PaginationResult, QueryComposer, RepositoryError,
        RepositoryErrorKind, RepositoryResult, UpdateBuilder, UpdateOutcome,
    };

    pub use tokio_util::sync::CancellationToken;
}
