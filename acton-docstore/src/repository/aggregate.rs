//! Aggregation pipeline handles
//!
//! [`MongoRepository::aggregate`](super::MongoRepository::aggregate) opens an
//! [`Aggregation`] that already matches the combined filter (and sort, when
//! requested). Callers append further stages, such as joins and projections,
//! before materialising the result.
//!
//! [`PagedAggregation`] additionally skips and limits to one page and keeps a
//! separate `$count` pipeline over the same `$match`, run concurrently with
//! the page on [`execute`](PagedAggregation::execute).

use futures::StreamExt;
use mongodb::bson::{doc, from_document, Bson, Document};
use mongodb::Collection;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::error::{RepositoryError, RepositoryOperation};
use super::join::lookup_stages;
use super::mongo::guarded;
use super::pagination::PaginationResult;
use super::stream::BatchStream;
use super::traits::RepositoryResult;

const OPERATION: RepositoryOperation = RepositoryOperation::Aggregate;

/// An aggregation pipeline under construction
#[derive(Debug, Clone)]
pub struct Aggregation {
    collection: Collection<Document>,
    stages: Vec<Document>,
    batch_size: usize,
}

impl Aggregation {
    pub(crate) fn new(
        collection: Collection<Document>,
        stages: Vec<Document>,
        batch_size: usize,
    ) -> Self {
        Self {
            collection,
            stages,
            batch_size,
        }
    }

    /// Append a raw stage
    #[must_use]
    pub fn stage(mut self, stage: Document) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append a `$project` stage
    #[must_use]
    pub fn project(self, projection: Document) -> Self {
        self.stage(doc! { "$project": projection })
    }

    /// Join another collection into each row
    ///
    /// See [`lookup_stages`] for the exact stages; rows without a match are
    /// dropped.
    #[must_use]
    pub fn lookup(
        mut self,
        foreign_collection: &str,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
    ) -> Self {
        self.stages.extend(lookup_stages(
            foreign_collection,
            local_field,
            foreign_field,
            as_field,
        ));
        self
    }

    /// Stages accumulated so far
    #[must_use]
    pub fn pipeline(&self) -> &[Document] {
        &self.stages
    }

    /// Run the pipeline and stream the results in batches
    ///
    /// Errors, including those raised while streaming, carry the collection
    /// name as their entity type.
    pub async fn stream<T>(self, cancel: &CancellationToken) -> RepositoryResult<BatchStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let entity = self.collection.name().to_string();
        tracing::debug!(
            "Aggregating {} with {} stage(s)",
            entity,
            self.stages.len()
        );

        let batch_size = self.batch_size;
        let cursor = guarded(OPERATION, cancel, async {
            self.collection
                .aggregate(self.stages)
                .batch_size(u32::try_from(batch_size).unwrap_or(u32::MAX))
                .await
        })
        .await
        .map_err(|e| e.with_entity(&entity))?;

        let rows = cursor
            .map(move |item| {
                item.map_err(|e| RepositoryError::storage(OPERATION, e))
                    .and_then(|document| {
                        from_document::<T>(document)
                            .map_err(|e| RepositoryError::serialization(OPERATION, e.to_string()))
                    })
                    .map_err(|e| e.with_entity(&entity))
            })
            .boxed();

        Ok(BatchStream::new(rows, batch_size, OPERATION, cancel.clone()))
    }

    /// Run the pipeline and collect every result
    pub async fn to_vec<T>(self, cancel: &CancellationToken) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.stream(cancel).await?.flatten_all().await
    }
}

/// One page of an aggregation plus a count over the same match
#[derive(Debug, Clone)]
pub struct PagedAggregation {
    rows: Aggregation,
    count_pipeline: Vec<Document>,
    page_index: i64,
    page_size: i64,
}

impl PagedAggregation {
    pub(crate) fn new(
        rows: Aggregation,
        count_pipeline: Vec<Document>,
        page_index: i64,
        page_size: i64,
    ) -> Self {
        Self {
            rows,
            count_pipeline,
            page_index,
            page_size,
        }
    }

    /// Append a raw stage to the page pipeline
    #[must_use]
    pub fn stage(mut self, stage: Document) -> Self {
        self.rows = self.rows.stage(stage);
        self
    }

    /// Append a `$project` stage to the page pipeline
    #[must_use]
    pub fn project(mut self, projection: Document) -> Self {
        self.rows = self.rows.project(projection);
        self
    }

    /// Join another collection into each row of the page
    #[must_use]
    pub fn lookup(
        mut self,
        foreign_collection: &str,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
    ) -> Self {
        self.rows = self
            .rows
            .lookup(foreign_collection, local_field, foreign_field, as_field);
        self
    }

    /// Stages of the page pipeline
    #[must_use]
    pub fn pipeline(&self) -> &[Document] {
        self.rows.pipeline()
    }

    /// Stages of the count pipeline
    #[must_use]
    pub fn count_pipeline(&self) -> &[Document] {
        &self.count_pipeline
    }

    /// Run the page and the count concurrently
    pub async fn execute<T>(
        self,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PaginationResult<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let Self {
            rows,
            count_pipeline,
            page_index,
            page_size,
        } = self;
        let counter = rows.collection.clone();
        let entity = counter.name().to_string();

        let count = async {
            let mut cursor = guarded(OPERATION, cancel, async {
                counter.aggregate(count_pipeline).await
            })
            .await?;

            let first =
                guarded(OPERATION, cancel, async { cursor.next().await.transpose() }).await?;
            Ok::<_, RepositoryError>(first.as_ref().map_or(0, count_value))
        };

        let (rows, total) = tokio::try_join!(rows.to_vec::<T>(cancel), count)
            .map_err(|e| e.with_entity(&entity))?;

        Ok(PaginationResult::new(rows, page_index, page_size, total))
    }
}

fn count_value(document: &Document) -> u64 {
    match document.get("total") {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_value() {
        assert_eq!(count_value(&doc! { "total": 25 }), 25);
        assert_eq!(count_value(&doc! { "total": 25_i64 }), 25);
        assert_eq!(count_value(&doc! {}), 0);
    }
}
