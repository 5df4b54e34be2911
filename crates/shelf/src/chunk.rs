//! Bounded-concurrency batch execution with per-item error capture.
//!
//! [`ChunkedRunner::run`] drives an async worker over a batch of items. Items are processed in
//! chunks of at most `chunk_size`: every worker inside a chunk runs concurrently, and the next
//! chunk starts only when the previous one has finished, which bounds the number of open file
//! handles and store connections at any point.
//!
//! A failing worker never aborts the batch. Its slot in [`ChunkOutcome::results`] is filled by
//! the fallback, and the item is reported alongside its error in [`ChunkOutcome::errors`].
//!
//! # Examples
//!
//! ```
//! use shelf::{chunk::ChunkedRunner, error::ShelfError};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let outcome = ChunkedRunner::new(2)
//!   .run(
//!     vec![1, 2, 3],
//!     |n| async move { if n == 2 { Err(ShelfError::Relocation("two".into())) } else { Ok(n * 10) } },
//!     |n| *n,
//!   )
//!   .await;
//!
//! assert_eq!(outcome.results, vec![10, 2, 30]);
//! assert_eq!(outcome.errors.len(), 1);
//! # }
//! ```

use std::future::Future;

use futures::future::join_all;

use super::*;

/// Default number of workers in flight at once.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Result of a chunked batch.
#[derive(Debug)]
pub struct ChunkOutcome<I, O> {
  /// One entry per input item, index-aligned with the input
  pub results: Vec<O>,
  /// The items whose worker failed, with the error; no ordering guarantee
  pub errors:  Vec<(I, ShelfError)>,
}

impl<I, O> ChunkOutcome<I, O> {
  /// Whether every worker succeeded.
  pub fn is_clean(&self) -> bool { self.errors.is_empty() }
}

/// Runs an async worker over a batch with a fixed concurrency bound.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedRunner {
  /// Maximum number of concurrent workers
  chunk_size: usize,
}

impl Default for ChunkedRunner {
  fn default() -> Self { Self::new(DEFAULT_CHUNK_SIZE) }
}

impl ChunkedRunner {
  /// Creates a runner; a zero chunk size is treated as one.
  pub fn new(chunk_size: usize) -> Self { Self { chunk_size: chunk_size.max(1) } }

  /// The concurrency bound.
  pub fn chunk_size(&self) -> usize { self.chunk_size }

  /// Runs `worker` over every item.
  ///
  /// `results` always has exactly one entry per item, in input order: the worker's output, or
  /// `fallback(&item)` when the worker failed.
  pub async fn run<I, O, W, Fut, F>(&self, items: Vec<I>, worker: W, fallback: F) -> ChunkOutcome<I, O>
  where
    I: Clone,
    W: Fn(I) -> Fut,
    Fut: Future<Output = Result<O>>,
    F: Fn(&I) -> O, {
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut errors = Vec::new();
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
      let chunk: Vec<I> = items.by_ref().take(self.chunk_size).collect();
      trace!(size = chunk.len(), "Running chunk");

      let outputs = join_all(chunk.iter().cloned().map(&worker)).await;
      for (item, output) in chunk.into_iter().zip(outputs) {
        match output {
          Ok(value) => results.push(value),
          Err(e) => {
            debug!(error = %e, "Chunk worker failed, using fallback");
            results.push(fallback(&item));
            errors.push((item, e));
          },
        }
      }
    }

    debug_assert_eq!(results.len(), total);
    ChunkOutcome { results, errors }
  }
}
