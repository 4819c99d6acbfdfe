//! Batched cursor streaming
//!
//! [`BatchStream`] owns an open server-side cursor and yields it as a finite,
//! non-restartable sequence of `Vec<T>` batches. The cursor is released on
//! every exit path:
//!
//! - exhaustion: the final (possibly short) batch is yielded, then the cursor
//!   is dropped
//! - error: the error is yielded once and the cursor is dropped
//! - cancellation: a `Cancelled` error is yielded once and the cursor is
//!   dropped
//! - early termination: dropping the stream drops the cursor
//!
//! Dropping a MongoDB cursor that is not exhausted issues `killCursors`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::error::{RepositoryError, RepositoryOperation};
use super::traits::RepositoryResult;

/// Lazy stream of document batches backed by a cursor
pub struct BatchStream<T> {
    inner: BoxStream<'static, RepositoryResult<Vec<T>>>,
}

impl<T: Send + 'static> BatchStream<T> {
    /// Group an item stream into batches of at most `batch_size`
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn new<S>(
        source: S,
        batch_size: usize,
        operation: RepositoryOperation,
        cancel: CancellationToken,
    ) -> Self
    where
        S: Stream<Item = RepositoryResult<T>> + Send + Unpin + 'static,
    {
        let batch_size = batch_size.max(1);

        let inner = stream::unfold(Some(source), move |state| {
            let cancel = cancel.clone();
            async move {
                let mut source = state?;
                let mut batch = Vec::with_capacity(batch_size);

                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            tracing::debug!("Cursor stream cancelled during {}", operation);
                            return Some((Err(RepositoryError::cancelled(operation)), None));
                        }
                        next = source.next() => match next {
                            Some(Ok(item)) => {
                                batch.push(item);
                                if batch.len() == batch_size {
                                    return Some((Ok(batch), Some(source)));
                                }
                            }
                            Some(Err(e)) => return Some((Err(e), None)),
                            None if batch.is_empty() => return None,
                            None => return Some((Ok(batch), None)),
                        },
                    }
                }
            }
        })
        .boxed();

        Self { inner }
    }

    /// Collect every remaining item into one vector
    pub async fn flatten_all(mut self) -> RepositoryResult<Vec<T>> {
        let mut all = Vec::new();
        while let Some(batch) = self.next().await {
            all.extend(batch?);
        }
        Ok(all)
    }
}

impl<T> Stream for BatchStream<T> {
    type Item = RepositoryResult<Vec<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for BatchStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn numbers(n: i32) -> impl Stream<Item = RepositoryResult<i32>> + Send + Unpin + 'static {
        stream::iter((1..=n).map(Ok))
    }

    /// Item stream that records when it is dropped
    struct Tracked<S> {
        inner: S,
        dropped: Arc<AtomicBool>,
    }

    impl<S: Stream + Unpin> Stream for Tracked<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    impl<S> Drop for Tracked<S> {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_batches_and_short_tail() {
        let stream = BatchStream::new(
            numbers(7),
            3,
            RepositoryOperation::Stream,
            CancellationToken::new(),
        );
        let batches: Vec<Vec<i32>> = stream.map(|b| b.unwrap()).collect().await;
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_batch() {
        let stream = BatchStream::new(
            numbers(4),
            2,
            RepositoryOperation::Stream,
            CancellationToken::new(),
        );
        let batches: Vec<Vec<i32>> = stream.map(|b| b.unwrap()).collect().await;
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4]]);
    }

    #[tokio::test]
    async fn test_empty_source_yields_nothing() {
        let mut stream = BatchStream::new(
            numbers(0),
            5,
            RepositoryOperation::Stream,
            CancellationToken::new(),
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_one() {
        let stream = BatchStream::new(
            numbers(2),
            0,
            RepositoryOperation::Stream,
            CancellationToken::new(),
        );
        assert_eq!(stream.flatten_all().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let source = stream::iter(vec![
            Ok(1),
            Err(RepositoryError::validation_failed("boom")),
            Ok(3),
        ]);
        let mut stream =
            BatchStream::new(source, 10, RepositoryOperation::Stream, CancellationToken::new());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_releases_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            inner: stream::pending::<RepositoryResult<i32>>(),
            dropped: dropped.clone(),
        };
        let cancel = CancellationToken::new();
        let mut stream = BatchStream::new(source, 2, RepositoryOperation::Stream, cancel.clone());

        cancel.cancel();
        let first = stream.next().await.unwrap();
        assert_eq!(
            first.unwrap_err().kind,
            crate::repository::RepositoryErrorKind::Cancelled
        );
        assert!(dropped.load(Ordering::SeqCst));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_early_drop_releases_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            inner: numbers(10),
            dropped: dropped.clone(),
        };
        let mut stream =
            BatchStream::new(source, 2, RepositoryOperation::Stream, CancellationToken::new());

        assert_eq!(stream.next().await.unwrap().unwrap(), vec![1, 2]);
        assert!(!dropped.load(Ordering::SeqCst));
        drop(stream);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_exhaustion_releases_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let source = Tracked {
            inner: numbers(3),
            dropped: dropped.clone(),
        };
        let mut stream =
            BatchStream::new(source, 2, RepositoryOperation::Stream, CancellationToken::new());

        assert_eq!(stream.next().await.unwrap().unwrap(), vec![1, 2]);
        assert_eq!(stream.next().await.unwrap().unwrap(), vec![3]);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
