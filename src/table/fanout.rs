//! Concurrent sub-call fan-out
//!
//! When one item needs N independent secondary calls (one per inline policy
//! name, for example), the calls run with bounded concurrency and join at a
//! wait-for-all barrier. Successes are collected in completion order; the
//! first error wins. Once an error is observed no further calls are
//! admitted, but in-flight calls are drained before returning so nothing
//! outlives the join point.

use crate::error::Result;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::future::Future;

/// Default number of concurrent sub-calls per item
pub const DEFAULT_FANOUT: usize = 8;

/// Run every future, at most `limit` at a time. Returns all success values
/// (order unconstrained) or the first error encountered; partial success is
/// never reported as success.
pub async fn join_all_first_error<F, T>(
    futures: impl IntoIterator<Item = F>,
    limit: usize,
) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    let mut pending = futures.into_iter();
    let mut in_flight = FuturesUnordered::new();

    for fut in pending.by_ref().take(limit.max(1)) {
        in_flight.push(fut);
    }

    let mut values = Vec::new();
    let mut first_error = None;

    while let Some(result) = in_flight.next().await {
        match result {
            Ok(value) => values.push(value),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        // admit the next call only while nothing has failed
        if first_error.is_none() {
            if let Some(next) = pending.next() {
                in_flight.push(next);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn api_error(code: &str) -> Error {
        Error::Api {
            status: 500,
            code: Some(code.to_string()),
            message: "boom".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn collects_all_values_regardless_of_completion_order() {
        let futures = (0u64..5).map(|i| async move {
            // later tasks finish first
            tokio::time::sleep(Duration::from_millis(100 - i * 10)).await;
            Ok(i)
        });

        let mut values = join_all_first_error(futures, 3).await.unwrap();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn single_failure_fails_the_aggregate() {
        let futures = (0..4).map(|i| async move {
            if i == 2 {
                Err(api_error("Throttling"))
            } else {
                Ok(i)
            }
        });

        let result = join_all_first_error(futures, 2).await;
        assert!(matches!(result, Err(Error::Api { .. })));
    }

    #[tokio::test]
    async fn no_new_calls_admitted_after_error() {
        let started = Arc::new(AtomicUsize::new(0));
        let futures = (0..10).map(|i| {
            let started = Arc::clone(&started);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if i == 0 {
                    Err(api_error("AccessDenied"))
                } else {
                    Ok(i)
                }
            }
        });

        let result = join_all_first_error(futures, 1).await;
        assert!(result.is_err());
        // the first call failed immediately, so nothing else was admitted
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_success() {
        let futures: Vec<std::future::Ready<Result<u32>>> = Vec::new();
        let values = join_all_first_error(futures, 4).await.unwrap();
        assert!(values.is_empty());
    }
}
