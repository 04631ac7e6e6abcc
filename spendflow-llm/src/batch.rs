//! Batch orchestration for large uploads: bounded chunks, bounded
//! parallelism, exponential backoff on transient provider failures.
//!
//! Results come back in original chunk order regardless of completion
//! order inside a wave; downstream index assignment depends on that.

use std::time::Duration;

use futures_util::future::join_all;

use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Items per provider call
    pub batch_size: usize,
    /// Chunks in flight at once; caps concurrent provider calls
    pub max_parallel: usize,
    /// Total attempts per chunk (first try included)
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 30,
            max_parallel: 3,
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// Run `f` until it succeeds, a non-retryable error appears, or the
/// attempt budget runs out. The delay doubles after each retryable
/// failure.
pub async fn retry_with_backoff<T, F, Fut>(
    f: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                eprintln!(
                    "provider error ({err}), retrying in {}ms ({} attempts left)",
                    delay.as_millis(),
                    max_retries - attempt
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Partition `items` into ordered chunks of `batch_size` and process them
/// in waves of up to `max_parallel` concurrent calls. A wave must settle
/// completely before the next starts. Each chunk call is wrapped in
/// [`retry_with_backoff`]; the first unrecoverable chunk failure aborts
/// the whole run (fail-fast, no partial salvage).
///
/// `on_progress` receives cumulative (processed, total) after each wave.
pub async fn process_in_batches<T, R, F, Fut, P>(
    items: Vec<T>,
    opts: &BatchOptions,
    on_progress: P,
    process: F,
) -> Result<Vec<R>, LlmError>
where
    T: Clone,
    F: Fn(Vec<T>, usize) -> Fut,
    Fut: Future<Output = Result<Vec<R>, LlmError>>,
    P: Fn(usize, usize),
{
    let total = items.len();
    let batch_size = opts.batch_size.max(1);
    let max_parallel = opts.max_parallel.max(1);

    let chunks: Vec<Vec<T>> = items
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    let mut results = Vec::with_capacity(total);
    let mut processed = 0usize;
    // Captured by reference so the move closures below stay Fn
    let process = &process;

    for (wave_number, wave) in chunks.chunks(max_parallel).enumerate() {
        let base_index = wave_number * max_parallel;

        let wave_futures = wave.iter().enumerate().map(move |(offset, chunk)| {
            retry_with_backoff(
                move || process(chunk.clone(), base_index + offset),
                opts.max_retries,
                opts.initial_delay,
            )
        });

        // join_all preserves input order, so chunk order survives
        for chunk_result in join_all(wave_futures).await {
            results.extend(chunk_result?);
        }

        processed += wave.iter().map(Vec::len).sum::<usize>();
        on_progress(processed, total);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn fast_opts(batch_size: usize, max_parallel: usize) -> BatchOptions {
        BatchOptions {
            batch_size,
            max_parallel,
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_batching_preserves_order() {
        let items: Vec<u32> = (0..100).collect();
        let result = process_in_batches(items.clone(), &fast_opts(7, 3), |_, _| {}, |chunk, _| async move {
            Ok(chunk)
        })
        .await
        .unwrap();
        assert_eq!(result, items);
    }

    #[tokio::test]
    async fn test_chunk_indices_are_global() {
        let items: Vec<u32> = (0..10).collect();
        let seen = Mutex::new(Vec::new());
        process_in_batches(items, &fast_opts(3, 2), |_, _| {}, |chunk, index| {
            seen.lock().unwrap().push(index);
            async move { Ok(chunk) }
        })
        .await
        .unwrap();
        let mut indices = seen.into_inner().unwrap();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_progress_is_cumulative() {
        let items: Vec<u32> = (0..10).collect();
        let reports = Mutex::new(Vec::new());
        process_in_batches(
            items,
            &fast_opts(3, 2),
            |done, total| reports.lock().unwrap().push((done, total)),
            |chunk, _| async move { Ok(chunk) },
        )
        .await
        .unwrap();
        // 4 chunks of (3,3,3,1) in waves of 2
        assert_eq!(reports.into_inner().unwrap(), vec![(6, 10), (10, 10)]);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(LlmError::http(429, "rate limited"))
                    } else {
                        Ok(n)
                    }
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::http(503, "down")) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(LlmError::Http { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::http(400, "bad request")) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(LlmError::Http { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_run() {
        let items: Vec<u32> = (0..30).collect();
        let result = process_in_batches(items, &fast_opts(10, 2), |_, _| {}, |chunk, index| async move {
            if index == 1 {
                Err(LlmError::http(401, "bad key"))
            } else {
                Ok(chunk)
            }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Http { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_max_parallel_bound() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<u32> = (0..40).collect();

        process_in_batches(items, &fast_opts(4, 3), |_, _| {}, |chunk, _| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let in_flight = &in_flight;
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(chunk)
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let result: Vec<u32> =
            process_in_batches(Vec::new(), &BatchOptions::default(), |_, _| {}, |chunk, _| async move {
                Ok(chunk)
            })
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
