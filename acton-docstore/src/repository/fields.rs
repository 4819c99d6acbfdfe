//! Field registry for model types
//!
//! Every [`Model`](super::Model) declares its queryable fields up front as a
//! `const` slice of [`Field`]s. The registry is validated once, when a
//! repository is constructed, and then answers name lookups for the sort
//! resolver and the range filter.
//!
//! The logical field `id` is always stored under MongoDB's reserved `_id` key.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{Field, FieldRegistry};
//!
//! const FIELDS: &[Field] = &[
//!     Field::new("id"),
//!     Field::new("name"),
//!     Field::with_key("createdAt", "created_at"),
//! ];
//!
//! let registry = FieldRegistry::new("users", FIELDS).unwrap();
//! assert_eq!(registry.storage_key("ID"), Some("_id"));
//! assert_eq!(registry.storage_key("createdat"), Some("created_at"));
//! assert_eq!(registry.storage_key("missing"), None);
//! ```

use super::error::RepositoryError;
use super::traits::RepositoryResult;

/// Logical name of the identity field every model must declare
pub const ID_FIELD: &str = "id";

/// Storage key MongoDB reserves for document identity
pub const ID_KEY: &str = "_id";

/// A queryable model field: its logical name and the key it is stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Name callers use in sort tokens and range filters
    pub name: &'static str,
    /// Key the field is stored under in the document
    pub key: &'static str,
}

impl Field {
    /// A field stored under its own name
    ///
    /// The identity field `id` is stored under `_id`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        if is_id(name) {
            Self { name, key: ID_KEY }
        } else {
            Self { name, key: name }
        }
    }

    /// A field stored under a different key (e.g. a serde rename)
    #[must_use]
    pub const fn with_key(name: &'static str, key: &'static str) -> Self {
        Self { name, key }
    }
}

const fn is_id(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 2 && bytes[0] == b'i' && bytes[1] == b'd'
}

/// Validated set of fields for one model type
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    collection: &'static str,
    fields: &'static [Field],
}

impl FieldRegistry {
    /// Validate a model's field list
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no field is named `id`.
    pub fn new(collection: &'static str, fields: &'static [Field]) -> RepositoryResult<Self> {
        if !fields.iter().any(|f| f.name == ID_FIELD) {
            return Err(RepositoryError::configuration(format!(
                "Model for collection '{}' must declare an '{}' field",
                collection, ID_FIELD
            ))
            .with_entity(collection));
        }

        Ok(Self { collection, fields })
    }

    /// Collection the model is stored in
    #[must_use]
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// All declared fields
    #[must_use]
    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Find a field by logical name, ignoring ASCII case
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&'static Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Storage key for a logical field name, ignoring ASCII case
    #[must_use]
    pub fn storage_key(&self, name: &str) -> Option<&'static str> {
        self.find(name).map(|f| f.key)
    }

    /// Storage key of the identity field
    #[must_use]
    pub fn id_key(&self) -> &'static str {
        self.storage_key(ID_FIELD).unwrap_or(ID_KEY)
    }
}
