//! Cross-collection joins on top of an aggregation pipeline
//!
//! A join is three stages:
//!
//! 1. `$lookup` the foreign collection, matching `local_field` against
//!    `foreign_field` into the `as_field` array
//! 2. `$unwind` that array into a single joined value per row; rows without a
//!    match are dropped, so the result behaves like an inner join
//! 3. `$project` the original `local_field` out of the result
//!
//! The logical `id` field is mapped to `_id` on both sides.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::lookup_stages;
//! use mongodb::bson::doc;
//!
//! let stages = lookup_stages("users", "userId", "id", "user");
//! assert_eq!(stages[1], doc! {
//!     "$unwind": { "path": "$user", "preserveNullAndEmptyArrays": false }
//! });
//! ```

use mongodb::bson::{doc, Document};

use super::fields::{ID_FIELD, ID_KEY};

/// Stages joining `foreign_collection` into each row under `as_field`
#[must_use]
pub fn lookup_stages(
    foreign_collection: &str,
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
) -> [Document; 3] {
    let local_field = storage_key(local_field);
    let foreign_field = storage_key(foreign_field);

    let mut projection = Document::new();
    projection.insert(local_field, 0);

    [
        doc! {
            "$lookup": {
                "from": foreign_collection,
                "localField": local_field,
                "foreignField": foreign_field,
                "as": as_field,
            }
        },
        doc! {
            "$unwind": {
                "path": format!("${}", as_field),
                "preserveNullAndEmptyArrays": false,
            }
        },
        doc! { "$project": projection },
    ]
}

fn storage_key(field: &str) -> &str {
    if field == ID_FIELD {
        ID_KEY
    } else {
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_stage() {
        let [lookup, _, _] = lookup_stages("authors", "authorId", "id", "author");
        assert_eq!(
            lookup,
            doc! {
                "$lookup": {
                    "from": "authors",
                    "localField": "authorId",
                    "foreignField": "_id",
                    "as": "author",
                }
            }
        );
    }

    #[test]
    fn test_unwind_drops_unmatched_rows() {
        let [_, unwind, _] = lookup_stages("authors", "authorId", "id", "author");
        let options = unwind.get_document("$unwind").unwrap();
        assert_eq!(options.get_str("path").unwrap(), "$author");
        assert!(!options.get_bool("preserveNullAndEmptyArrays").unwrap());
    }

    #[test]
    fn test_local_field_is_projected_out() {
        let [_, _, project] = lookup_stages("authors", "authorId", "id", "author");
        assert_eq!(project, doc! { "$project": { "authorId": 0 } });

        let [_, _, project] = lookup_stages("reviews", "id", "bookId", "review");
        assert_eq!(project, doc! { "$project": { "_id": 0 } });
    }
}
