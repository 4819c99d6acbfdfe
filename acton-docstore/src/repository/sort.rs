//! Sort token resolution
//!
//! A sort token names a field and a direction separated by exactly one of
//! `-`, `.` or `_`, e.g. `name-asc`, `age.desc` or `createdAt_ASC`. Tokens
//! that do not resolve against the model's [`FieldRegistry`] silently fall
//! back to descending identity order. Callers that need strict validation
//! must check the token themselves.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{Field, FieldRegistry, SortDirection, SortSpec};
//!
//! const FIELDS: &[Field] = &[Field::new("id"), Field::new("name")];
//! let registry = FieldRegistry::new("users", FIELDS).unwrap();
//!
//! let sort = SortSpec::resolve("name-asc", &registry);
//! assert_eq!(sort.key, "name");
//! assert_eq!(sort.direction, SortDirection::Ascending);
//!
//! let fallback = SortSpec::resolve("colour-asc", &registry);
//! assert_eq!(fallback, SortSpec::default_for(&registry));
//! ```

use std::fmt;

use mongodb::bson::Document;

use super::fields::FieldRegistry;

const SEPARATORS: [char; 3] = ['-', '.', '_'];

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Sort in ascending order (A-Z, 0-9)
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[default]
    Descending,
}

impl SortDirection {
    /// Parse `asc` / `desc`, ignoring ASCII case
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Ascending)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Descending)
        } else {
            None
        }
    }

    /// MongoDB sort order value
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// A resolved sort: storage key plus direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Storage key to sort on
    pub key: &'static str,
    /// Sort direction
    pub direction: SortDirection,
}

impl SortSpec {
    /// Descending by the identity field
    #[must_use]
    pub fn default_for(registry: &FieldRegistry) -> Self {
        Self {
            key: registry.id_key(),
            direction: SortDirection::Descending,
        }
    }

    /// Resolve a sort token against a model's fields
    ///
    /// Never fails: anything unrecognised yields [`SortSpec::default_for`].
    #[must_use]
    pub fn resolve(token: &str, registry: &FieldRegistry) -> Self {
        Self::try_resolve(token, registry).unwrap_or_else(|| Self::default_for(registry))
    }

    fn try_resolve(token: &str, registry: &FieldRegistry) -> Option<Self> {
        let parts: Vec<&str> = token.split(SEPARATORS).collect();
        let [field, direction] = parts.as_slice() else {
            return None;
        };

        let field = registry.find(field)?;
        let direction = SortDirection::parse(direction)?;

        Some(Self {
            key: field.key,
            direction,
        })
    }

    /// Resolve an optional token; `None` means "no sort requested"
    #[must_use]
    pub fn resolve_optional(token: Option<&str>, registry: &FieldRegistry) -> Option<Self> {
        token.map(|t| Self::resolve(t, registry))
    }

    /// Native sort document, e.g. `{ "name": 1 }`
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.key, self.direction.as_i32());
        sort
    }
}
