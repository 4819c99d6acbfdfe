//! Storage error translation
//!
//! Only uniqueness violations (server code 11000) are re-raised as domain
//! errors: [`RepositoryErrorKind::AlreadyExists`] with status 409 and the
//! conflicting key embedded in the message. Every other storage failure is
//! passed through untouched.
//!
//! [`RepositoryErrorKind::AlreadyExists`]: super::RepositoryErrorKind::AlreadyExists

use std::sync::LazyLock;

use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use regex::Regex;

use super::error::{RepositoryError, RepositoryOperation};

/// Server error code for a duplicate key
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Matches the `key: { ... }` payload of a duplicate key message
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"key: (\{.*\})").expect("duplicate key regex is valid"));

/// Translate a write failure
///
/// Duplicate keys become [`RepositoryError::already_exists`]; anything else
/// becomes [`RepositoryError::storage`] carrying the original error.
pub fn translate_write_error(
    operation: RepositoryOperation,
    collection: &str,
    err: MongoError,
) -> RepositoryError {
    match duplicate_key_message(&err) {
        Some(message) => {
            let key = extract_duplicate_key(&message).unwrap_or_else(|| "{}".to_string());
            tracing::warn!(
                "Duplicate key rejected on {} during {}: {}",
                collection,
                operation,
                key
            );
            RepositoryError::already_exists(collection, key).with_operation(operation)
        }
        None => RepositoryError::storage(operation, err).with_entity(collection),
    }
}

/// Server message of the first duplicate key failure carried by `err`
#[must_use]
pub fn duplicate_key_message(err: &MongoError) -> Option<String> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => {
            Some(e.message.clone())
        }
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()?
            .iter()
            .find(|w| w.code == DUPLICATE_KEY_CODE)
            .map(|w| w.message.clone()),
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => Some(e.message.clone()),
        _ => None,
    }
}

/// Pull the `{ field: value }` key payload out of a duplicate key message
///
/// Double quotes are normalised to single quotes so the payload can be
/// embedded in JSON error bodies without escaping.
///
/// # Example
///
/// ```rust
/// use acton_docstore::repository::extract_duplicate_key;
///
/// let message = r#"E11000 duplicate key error collection: app.users index: email_1 dup key: { email: "a@example.com" }"#;
/// assert_eq!(
///     extract_duplicate_key(message).as_deref(),
///     Some("{ email: 'a@example.com' }")
/// );
/// ```
#[must_use]
pub fn extract_duplicate_key(message: &str) -> Option<String> {
    KEY_PATTERN
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('"', "'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;
    use mongodb::bson::{doc, from_document};
    use mongodb::error::{InsertManyError, WriteError};

    const DUP_ID_7: &str =
        "E11000 duplicate key error collection: shop.users index: _id_ dup key: { _id: 7 }";

    #[test]
    fn test_extract_single_field_key() {
        let message = r#"E11000 duplicate key error collection: shop.users index: email_1 dup key: { email: "ada@example.com" }"#;
        assert_eq!(
            extract_duplicate_key(message).as_deref(),
            Some("{ email: 'ada@example.com' }")
        );
    }

    #[test]
    fn test_extract_compound_and_numeric_key() {
        let message = "E11000 duplicate key error collection: shop.users index: _id_ dup key: { _id: 21 }";
        assert_eq!(extract_duplicate_key(message).as_deref(), Some("{ _id: 21 }"));

        let message = r#"E11000 duplicate key error collection: shop.seats index: row_1_seat_1 dup key: { row: "B", seat: 4 }"#;
        assert_eq!(
            extract_duplicate_key(message).as_deref(),
            Some("{ row: 'B', seat: 4 }")
        );
    }

    #[test]
    fn test_extract_without_key_payload() {
        assert_eq!(extract_duplicate_key("E11000 duplicate key error"), None);
    }

    #[test]
    fn test_non_duplicate_errors_pass_through() {
        let raw = MongoError::custom("connection reset");
        let raw_message = raw.to_string();
        assert!(duplicate_key_message(&raw).is_none());

        let error = translate_write_error(RepositoryOperation::InsertOne, "users", raw);
        assert_eq!(error.kind, RepositoryErrorKind::Storage);
        assert_eq!(error.message, raw_message);
        assert!(error.storage_error().is_some());
        assert_eq!(error.entity_type.as_deref(), Some("users"));
    }

    #[test]
    fn test_duplicate_write_error_is_a_conflict() {
        let write_error: WriteError =
            from_document(doc! { "code": DUPLICATE_KEY_CODE, "errmsg": DUP_ID_7 }).unwrap();
        let raw = MongoError::from(ErrorKind::Write(WriteFailure::WriteError(write_error)));
        assert_eq!(duplicate_key_message(&raw).as_deref(), Some(DUP_ID_7));

        let error = translate_write_error(RepositoryOperation::InsertOne, "users", raw);
        assert_eq!(error.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(error.status_code().as_u16(), 409);
        assert!(error.message.contains("_id: 7"), "{}", error.message);
        assert_eq!(error.operation, RepositoryOperation::InsertOne);
    }

    #[test]
    fn test_duplicate_in_insert_many_is_a_conflict() {
        let failure: InsertManyError = from_document(doc! {
            "writeErrors": [
                { "index": 1, "code": DUPLICATE_KEY_CODE, "errmsg": DUP_ID_7 },
            ],
        })
        .unwrap();
        let raw = MongoError::from(ErrorKind::InsertMany(failure));

        let error = translate_write_error(RepositoryOperation::InsertMany, "users", raw);
        assert_eq!(error.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(error.status_code().as_u16(), 409);
        assert!(error.message.contains("_id: 7"), "{}", error.message);
    }

    #[test]
    fn test_other_write_error_codes_pass_through() {
        let write_error: WriteError =
            from_document(doc! { "code": 121, "errmsg": "Document failed validation" }).unwrap();
        let raw = MongoError::from(ErrorKind::Write(WriteFailure::WriteError(write_error)));

        let error = translate_write_error(RepositoryOperation::InsertOne, "users", raw);
        assert_eq!(error.kind, RepositoryErrorKind::Storage);
    }
}
