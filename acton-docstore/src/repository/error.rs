//! Repository error types
//!
//! [`RepositoryError`] is the domain error surfaced by every repository
//! operation. It carries the operation that failed, a category, a
//! human-readable message and a protocol status code that a caller-owned
//! transport layer can map directly onto a response.
//!
//! Storage failures other than duplicate keys are never re-interpreted: the
//! raw [`mongodb::error::Error`] is kept intact and exposed through
//! [`RepositoryError::storage_error`] and [`std::error::Error::source`].
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::validation_failed("Invalid fromToKey field: colour");
//! assert!(matches!(error.kind, RepositoryErrorKind::ValidationFailed));
//! assert_eq!(error.status_code().as_u16(), 400);
//! ```

use std::fmt;

use http::StatusCode;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Constructing a repository for a model type
    Construct,
    /// Composing a filter or update expression
    Compose,
    /// Checking whether any document matches a filter
    Exists,
    /// Counting documents matching a filter
    Count,
    /// Looking up a single document by identity
    FindById,
    /// Finding documents with a filter
    Find,
    /// Finding one page of documents
    FindPage,
    /// Running an aggregation pipeline
    Aggregate,
    /// Inserting a single document
    InsertOne,
    /// Inserting a batch of documents
    InsertMany,
    /// Updating documents
    Update,
    /// Atomically updating and returning a document
    FindOneAndUpdate,
    /// Deleting documents
    Delete,
    /// Atomically replacing a document
    Replace,
    /// Streaming documents through a cursor
    Stream,
    /// Projecting documents into another shape
    Project,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct => write!(f, "construct"),
            Self::Compose => write!(f, "compose"),
            Self::Exists => write!(f, "exists"),
            Self::Count => write!(f, "count"),
            Self::FindById => write!(f, "find_by_id"),
            Self::Find => write!(f, "find"),
            Self::FindPage => write!(f, "find_page"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::InsertOne => write!(f, "insert_one"),
            Self::InsertMany => write!(f, "insert_many"),
            Self::Update => write!(f, "update"),
            Self::FindOneAndUpdate => write!(f, "find_one_and_update"),
            Self::Delete => write!(f, "delete"),
            Self::Replace => write!(f, "replace"),
            Self::Stream => write!(f, "stream"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// The model type is misconfigured (e.g. it has no `id` field)
    Configuration,
    /// Input failed validation before reaching the database
    ValidationFailed,
    /// A uniqueness constraint was violated
    AlreadyExists,
    /// Any other failure reported by the storage engine
    Storage,
    /// A document could not be converted to or from BSON
    Serialization,
    /// The caller's cancellation token fired
    Cancelled,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::Storage => write!(f, "storage"),
            Self::Serialization => write!(f, "serialization"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RepositoryErrorKind {
    /// Protocol status code for this kind of error
    ///
    /// Cancellation maps to the non-standard 499 ("client closed request").
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            }
            Self::Configuration | Self::Storage | Self::Serialization => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use acton_docstore::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::already_exists("users", "{ email: 'a@example.com' }");
/// assert_eq!(error.status_code().as_u16(), 409);
/// assert_eq!(error.operation, RepositoryOperation::InsertOne);
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The collection involved, when known
    pub entity_type: Option<String>,
    source: Option<mongodb::error::Error>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            source: None,
        }
    }

    /// Create a configuration error, raised while constructing a repository
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Construct,
            RepositoryErrorKind::Configuration,
            message,
        )
    }

    /// Create a validation failed error (status 400)
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Compose,
            RepositoryErrorKind::ValidationFailed,
            message,
        )
    }

    /// Create a duplicate key error (status 409) embedding the conflicting key
    pub fn already_exists(entity_type: impl Into<String>, key: impl AsRef<str>) -> Self {
        Self {
            operation: RepositoryOperation::InsertOne,
            kind: RepositoryErrorKind::AlreadyExists,
            message: format!("Duplicate key {}", key.as_ref()),
            entity_type: Some(entity_type.into()),
            source: None,
        }
    }

    /// Wrap a storage failure without altering it
    pub fn storage(operation: RepositoryOperation, err: mongodb::error::Error) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::Storage,
            message: err.to_string(),
            entity_type: None,
            source: Some(err),
        }
    }

    /// Create a serialization error
    pub fn serialization(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Serialization, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled",
        )
    }

    /// Add the collection name to an existing error
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Protocol status code the transport layer should respond with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// The untranslated storage failure, if this error came from the database
    #[must_use]
    pub fn storage_error(&self) -> Option<&mongodb::error::Error> {
        self.source.as_ref()
    }

    /// Consume the error, returning the untranslated storage failure
    #[must_use]
    pub fn into_storage_error(self) -> Option<mongodb::error::Error> {
        self.source
    }

    /// Check if this error is retriable (transient storage errors)
    pub fn is_retriable(&self) -> bool {
        use mongodb::error::ErrorKind;

        self.source.as_ref().is_some_and(|e| {
            matches!(
                e.kind.as_ref(),
                ErrorKind::Io(_)
                    | ErrorKind::ServerSelection { .. }
                    | ErrorKind::ConnectionPoolCleared { .. }
            )
        })
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref entity_type) = self.entity_type {
            write!(f, " [{}]", entity_type)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<mongodb::bson::de::Error> for RepositoryError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::serialization(RepositoryOperation::Find, err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for RepositoryError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::serialization(RepositoryOperation::Compose, err.to_string())
    }
}

#[cfg(feature = "axum")]
mod response {
    use axum::{
        response::{IntoResponse, Response},
        Json,
    };
    use serde::{Deserialize, Serialize};

    use super::RepositoryError;

    /// Error response body
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorResponse {
        /// Error message
        pub error: String,

        /// Error code
        pub code: String,

        /// HTTP status code
        pub status: u16,
    }

    impl IntoResponse for RepositoryError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let body = ErrorResponse {
                error: self.message,
                code: self.kind.to_string().to_uppercase(),
                status: status.as_u16(),
            };
            (status, Json(body)).into_response()
        }
    }
}

#[cfg(feature = "axum")]
pub use response::ErrorResponse;
