//! MongoDB-backed repository
//!
//! [`MongoRepository`] combines a [`QueryComposer`]'s output with sorting and
//! pagination and runs it against one collection. Every operation takes the
//! caller's [`CancellationToken`]; when it fires, the in-flight network wait is
//! abandoned and the operation fails with
//! [`RepositoryErrorKind::Cancelled`](super::RepositoryErrorKind::Cancelled).
//!
//! Not-found is never an error: lookups and single deletes return `None`.

use std::future::Future;

use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::aggregate::{Aggregation, PagedAggregation};
use super::error::{RepositoryError, RepositoryOperation};
use super::fields::FieldRegistry;
use super::filter::Filter;
use super::pagination::PaginationResult;
use super::sort::SortSpec;
use super::stream::BatchStream;
use super::traits::{Model, QueryComposer, RepositoryResult};
use super::translate::translate_write_error;
use crate::config::RepositoryConfig;

/// Result of an update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter
    pub matched_count: u64,
    /// Documents actually changed
    pub modified_count: u64,
    /// Identity of the inserted document when an upsert inserted one
    pub upserted_id: Option<Bson>,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Documents removed
    pub deleted_count: u64,
}

/// Run a driver future unless `cancel` fires first
///
/// The driver future is dropped on cancellation, which releases any
/// connection or cursor it holds.
pub(crate) async fn guarded<T, F>(
    operation: RepositoryOperation,
    cancel: &CancellationToken,
    fut: F,
) -> RepositoryResult<T>
where
    F: Future<Output = mongodb::error::Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!("Repository {} cancelled", operation);
            Err(RepositoryError::cancelled(operation))
        }
        result = fut => result.map_err(|e| RepositoryError::storage(operation, e)),
    }
}

/// Repository over one collection of `M`
///
/// Construction validates the model's field registry; a model without an
/// `id` field is rejected before any database interaction.
pub struct MongoRepository<M: Model, C: QueryComposer<M>> {
    collection: Collection<M>,
    composer: C,
    fields: FieldRegistry,
    stream_batch_size: usize,
}

impl<M: Model, C: QueryComposer<M>> MongoRepository<M, C> {
    /// Create a repository for `M` in `database`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `M::FIELDS` has no `id` field.
    pub fn new(database: &Database, composer: C) -> RepositoryResult<Self> {
        let fields = FieldRegistry::new(M::COLLECTION, M::FIELDS)?;

        tracing::debug!(
            "Repository ready for collection {} with {} field(s)",
            M::COLLECTION,
            fields.fields().len()
        );

        Ok(Self {
            collection: database.collection::<M>(M::COLLECTION),
            composer,
            fields,
            stream_batch_size: RepositoryConfig::default().stream_batch_size,
        })
    }

    /// Apply repository settings
    #[must_use]
    pub fn with_config(mut self, config: &RepositoryConfig) -> Self {
        self.stream_batch_size = config.stream_batch_size.max(1);
        self
    }

    /// The underlying collection
    pub fn collection(&self) -> &Collection<M> {
        &self.collection
    }

    /// The validated field registry
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// The composer strategy
    pub fn composer(&self) -> &C {
        &self.composer
    }

    /// Batch size used by [`stream`](Self::stream)
    pub fn stream_batch_size(&self) -> usize {
        self.stream_batch_size
    }

    /// Combined filter for `filter`
    ///
    /// # Errors
    ///
    /// Returns the composer's validation error.
    pub fn combined_filter(&self, filter: &C::Filter) -> RepositoryResult<Document> {
        self.composer
            .compose_filter(filter, &self.fields)
            .map_err(|e| e.with_entity(M::COLLECTION))
    }

    /// Sort requested by `filter`, if it carries a token
    pub fn sort_for(&self, filter: &C::Filter) -> Option<Document> {
        SortSpec::resolve_optional(filter.params().sort.as_deref(), &self.fields)
            .map(|spec| spec.to_document())
    }

    fn update_document(&self, update: &C::Update) -> RepositoryResult<Document> {
        let update = self
            .composer
            .compose_update(update)
            .map_err(|e| e.with_entity(M::COLLECTION))?;
        if update.is_empty() {
            return Err(
                RepositoryError::validation_failed("Update sets no fields")
                    .with_operation(RepositoryOperation::Update)
                    .with_entity(M::COLLECTION),
            );
        }
        Ok(update)
    }

    fn fail(&self, err: RepositoryError) -> RepositoryError {
        err.with_entity(M::COLLECTION)
    }

    /// Whether any document matches
    pub async fn exists(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<bool> {
        let query = self.combined_filter(filter)?;
        tracing::debug!("Checking existence in {}", M::COLLECTION);

        let count = guarded(RepositoryOperation::Exists, cancel, async {
            self.collection.count_documents(query).limit(1).await
        })
        .await
        .map_err(|e| self.fail(e))?;

        Ok(count > 0)
    }

    /// Number of matching documents
    pub async fn count(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        let query = self.combined_filter(filter)?;
        self.count_matching(query, cancel).await
    }

    async fn count_matching(
        &self,
        query: Document,
        cancel: &CancellationToken,
    ) -> RepositoryResult<u64> {
        tracing::debug!("Counting documents in {}", M::COLLECTION);

        guarded(RepositoryOperation::Count, cancel, async {
            self.collection.count_documents(query).await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// Look up one document by identity
    ///
    /// `field` overrides the identity field. A registered field name is
    /// mapped to its storage key; any other name is used as given.
    pub async fn find_by_id(
        &self,
        id: impl Into<Bson>,
        field: Option<&str>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<M>> {
        let key = match field {
            Some(name) => self.fields.storage_key(name).unwrap_or(name),
            None => self.fields.id_key(),
        };
        let mut query = Document::new();
        query.insert(key, id.into());

        tracing::debug!("Finding {} by {}", M::COLLECTION, key);

        guarded(RepositoryOperation::FindById, cancel, async {
            self.collection.find_one(query).await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// First matching document in sort order
    pub async fn find_one(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<M>> {
        let query = self.combined_filter(filter)?;
        let sort = self.sort_for(filter);

        guarded(RepositoryOperation::Find, cancel, async {
            let mut action = self.collection.find_one(query);
            if let Some(sort) = sort {
                action = action.sort(sort);
            }
            action.await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// All matching documents, sorted when the filter carries a sort token
    pub async fn find(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<M>> {
        let query = self.combined_filter(filter)?;
        let sort = self.sort_for(filter);

        tracing::debug!("Finding documents in {}", M::COLLECTION);

        guarded(RepositoryOperation::Find, cancel, async {
            let mut action = self.collection.find(query);
            if let Some(sort) = sort {
                action = action.sort(sort);
            }
            action.await?.try_collect::<Vec<M>>().await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// One page of matching documents plus page metadata
    ///
    /// The total is counted over the same filter, concurrently with the page
    /// fetch.
    pub async fn find_with_pagination(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PaginationResult<M>> {
        let query = self.combined_filter(filter)?;
        let sort = self.sort_for(filter);
        let params = filter.params();
        let page = params.pagination();

        tracing::debug!(
            "Finding page {} (size {}) in {}",
            params.page_number(),
            params.items_per_page(),
            M::COLLECTION
        );

        let count_query = query.clone();
        let rows = guarded(RepositoryOperation::FindPage, cancel, async {
            let mut action = self
                .collection
                .find(query)
                .skip(page.offset)
                .limit(page.limit);
            if let Some(sort) = sort {
                action = action.sort(sort);
            }
            action.await?.try_collect::<Vec<M>>().await
        });
        let rows = async { rows.await.map_err(|e| self.fail(e)) };

        let (rows, total) = tokio::try_join!(rows, self.count_matching(count_query, cancel))?;

        Ok(PaginationResult::new(
            rows,
            params.page_index,
            params.page_size,
            total,
        ))
    }

    /// Start an aggregation over the matching documents
    ///
    /// The pipeline begins with `$match` and, when the filter carries a sort
    /// token, `$sort`.
    pub fn aggregate(&self, filter: &C::Filter) -> RepositoryResult<Aggregation> {
        let query = self.combined_filter(filter)?;
        let mut stages = vec![doc! { "$match": query }];
        if let Some(sort) = self.sort_for(filter) {
            stages.push(doc! { "$sort": sort });
        }

        Ok(Aggregation::new(
            self.collection.clone_with_type::<Document>(),
            stages,
            self.stream_batch_size,
        ))
    }

    /// Start a paged aggregation over the matching documents
    ///
    /// Rows are matched, sorted, skipped and limited to the requested page
    /// before any stages the caller appends. The total comes from a separate
    /// `$match` + `$count` pipeline.
    pub fn aggregate_with_pagination(
        &self,
        filter: &C::Filter,
    ) -> RepositoryResult<PagedAggregation> {
        let query = self.combined_filter(filter)?;
        let params = filter.params();
        let page = params.pagination();

        let mut stages = vec![doc! { "$match": query.clone() }];
        if let Some(sort) = self.sort_for(filter) {
            stages.push(doc! { "$sort": sort });
        }
        let skip = i64::try_from(page.offset).unwrap_or(i64::MAX);
        let limit = page.limit;
        stages.push(doc! { "$skip": skip });
        stages.push(doc! { "$limit": limit });

        let count_pipeline = vec![doc! { "$match": query }, doc! { "$count": "total" }];

        let rows = Aggregation::new(
            self.collection.clone_with_type::<Document>(),
            stages,
            self.stream_batch_size,
        );

        Ok(PagedAggregation::new(
            rows,
            count_pipeline,
            params.page_index,
            params.page_size,
        ))
    }

    /// Insert one document, returning its identity
    ///
    /// # Errors
    ///
    /// A uniqueness violation is returned as an `AlreadyExists` error (409)
    /// embedding the conflicting key.
    pub async fn insert_one(
        &self,
        model: &M,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Bson> {
        tracing::debug!("Inserting into {}", M::COLLECTION);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(self.fail(RepositoryError::cancelled(RepositoryOperation::InsertOne)));
            }
            result = async { self.collection.insert_one(model).await } => result,
        };

        result.map(|r| r.inserted_id).map_err(|e| {
            translate_write_error(RepositoryOperation::InsertOne, M::COLLECTION, e)
        })
    }

    /// Insert a batch of documents, returning how many were inserted
    ///
    /// An empty batch is a no-op.
    pub async fn insert_many(
        &self,
        models: &[M],
        cancel: &CancellationToken,
    ) -> RepositoryResult<usize> {
        if models.is_empty() {
            return Ok(0);
        }

        tracing::debug!("Inserting {} document(s) into {}", models.len(), M::COLLECTION);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(self.fail(RepositoryError::cancelled(RepositoryOperation::InsertMany)));
            }
            result = async { self.collection.insert_many(models).await } => result,
        };

        result.map(|r| r.inserted_ids.len()).map_err(|e| {
            translate_write_error(RepositoryOperation::InsertMany, M::COLLECTION, e)
        })
    }

    /// Update the first matching document
    ///
    /// # Errors
    ///
    /// Returns a validation error, before any network call, when the update
    /// sets no fields.
    pub async fn update_one(
        &self,
        filter: &C::Filter,
        update: &C::Update,
        upsert: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<UpdateOutcome> {
        let query = self.combined_filter(filter)?;
        let update = self.update_document(update)?;

        tracing::debug!("Updating one document in {} (upsert: {})", M::COLLECTION, upsert);

        let result = guarded(RepositoryOperation::Update, cancel, async {
            self.collection.update_one(query, update).upsert(upsert).await
        })
        .await
        .map_err(|e| self.fail(e))?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    /// Update every matching document
    ///
    /// # Errors
    ///
    /// Returns a validation error, before any network call, when the update
    /// sets no fields.
    pub async fn update_many(
        &self,
        filter: &C::Filter,
        update: &C::Update,
        upsert: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<UpdateOutcome> {
        let query = self.combined_filter(filter)?;
        let update = self.update_document(update)?;

        tracing::debug!("Updating documents in {} (upsert: {})", M::COLLECTION, upsert);

        let result = guarded(RepositoryOperation::Update, cancel, async {
            self.collection.update_many(query, update).upsert(upsert).await
        })
        .await
        .map_err(|e| self.fail(e))?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    /// Atomically update the first matching document and return it
    ///
    /// With `return_updated` the post-update document is returned, otherwise
    /// the pre-update one.
    pub async fn find_one_and_update(
        &self,
        filter: &C::Filter,
        update: &C::Update,
        return_updated: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<M>> {
        let query = self.combined_filter(filter)?;
        let update = self.update_document(update)?;
        let returned = if return_updated {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        tracing::debug!("Finding and updating in {}", M::COLLECTION);

        guarded(RepositoryOperation::FindOneAndUpdate, cancel, async {
            self.collection
                .find_one_and_update(query, update)
                .return_document(returned)
                .await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// Atomically delete the first matching document and return it
    pub async fn delete_one(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<M>> {
        let query = self.combined_filter(filter)?;
        tracing::debug!("Deleting one document from {}", M::COLLECTION);

        guarded(RepositoryOperation::Delete, cancel, async {
            self.collection.find_one_and_delete(query).await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// Delete every matching document
    pub async fn delete_many(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<DeleteOutcome> {
        let query = self.combined_filter(filter)?;
        tracing::debug!("Deleting documents from {}", M::COLLECTION);

        let result = guarded(RepositoryOperation::Delete, cancel, async {
            self.collection.delete_many(query).await
        })
        .await
        .map_err(|e| self.fail(e))?;

        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    /// Atomically replace the first matching document, returning the new one
    pub async fn replace(
        &self,
        filter: &C::Filter,
        model: &M,
        upsert: bool,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<M>> {
        let query = self.combined_filter(filter)?;
        tracing::debug!("Replacing document in {} (upsert: {})", M::COLLECTION, upsert);

        guarded(RepositoryOperation::Replace, cancel, async {
            self.collection
                .find_one_and_replace(query, model)
                .upsert(upsert)
                .return_document(ReturnDocument::After)
                .await
        })
        .await
        .map_err(|e| self.fail(e))
    }

    /// Stream matching documents in batches through a server-side cursor
    pub async fn stream(
        &self,
        filter: &C::Filter,
        cancel: &CancellationToken,
    ) -> RepositoryResult<BatchStream<M>> {
        let query = self.combined_filter(filter)?;
        let sort = self.sort_for(filter);
        self.open_stream(&self.collection, query, sort, None, RepositoryOperation::Stream, cancel)
            .await
    }

    /// Matching documents projected into `T`
    pub async fn project<T>(
        &self,
        filter: &C::Filter,
        projection: Document,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync + 'static,
    {
        self.project_stream::<T>(filter, projection, cancel)
            .await?
            .flatten_all()
            .await
    }

    /// Matching documents projected into `T`, streamed in batches
    pub async fn project_stream<T>(
        &self,
        filter: &C::Filter,
        projection: Document,
        cancel: &CancellationToken,
    ) -> RepositoryResult<BatchStream<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync + 'static,
    {
        let query = self.combined_filter(filter)?;
        let sort = self.sort_for(filter);
        let projected = self.collection.clone_with_type::<T>();
        self.open_stream(
            &projected,
            query,
            sort,
            Some(projection),
            RepositoryOperation::Project,
            cancel,
        )
        .await
    }

    async fn open_stream<T>(
        &self,
        collection: &Collection<T>,
        query: Document,
        sort: Option<Document>,
        projection: Option<Document>,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
    ) -> RepositoryResult<BatchStream<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync + 'static,
    {
        let batch_size = self.stream_batch_size;
        tracing::debug!(
            "Opening cursor on {} (batch size {})",
            M::COLLECTION,
            batch_size
        );

        let cursor = guarded(operation, cancel, async {
            let mut action = collection
                .find(query)
                .batch_size(u32::try_from(batch_size).unwrap_or(u32::MAX));
            if let Some(sort) = sort {
                action = action.sort(sort);
            }
            if let Some(projection) = projection {
                action = action.projection(projection);
            }
            action.await
        })
        .await
        .map_err(|e| self.fail(e))?;

        let items = cursor
            .map(move |item| item.map_err(|e| RepositoryError::storage(operation, e)))
            .boxed();

        Ok(BatchStream::new(items, batch_size, operation, cancel.clone()))
    }
}

impl<M: Model, C: QueryComposer<M> + std::fmt::Debug> std::fmt::Debug for MongoRepository<M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoRepository")
            .field("collection", &M::COLLECTION)
            .field("composer", &self.composer)
            .field("stream_batch_size", &self.stream_batch_size)
            .finish_non_exhaustive()
    }
}
