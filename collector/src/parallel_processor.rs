use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::CollectorError;

/// Bounded worker pool for per-delegate reconstruction.
///
/// At most `max_concurrent` tasks run at once. Results come back in input
/// order, one per item. A task that panics or is aborted yields
/// [`CollectorError::TaskFailed`] for its item and does not affect the others.
pub struct ParallelProcessor {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

impl ParallelProcessor {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Returns the maximum concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `f` over every item and wait for all of them.
    ///
    /// Dropping the returned future aborts every task still running.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, f: F) -> Vec<Result<T, CollectorError>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CollectorError>> + Send + 'static,
    {
        let count = items.len();
        let f = Arc::new(f);
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            let f = Arc::clone(&f);
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => f(item).await,
                    Err(e) => Err(CollectorError::TaskFailed(e.to_string())),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<T, CollectorError>>> = (0..count).map(|_| None).collect();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => failures.push(e.to_string()),
            }
        }

        // Panicked tasks lose their index; they fill the remaining slots.
        let mut failures = failures.into_iter();
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(CollectorError::TaskFailed(
                        failures.next().unwrap_or_else(|| "task lost".to_string()),
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_basic_processing() {
        let processor = ParallelProcessor::new(4);
        let results = processor.run(vec![1u64, 2, 3], |v| async move { Ok(v * 2) }).await;
        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let processor = ParallelProcessor::new(4);
        let results = processor
            .run(Vec::<u64>::new(), |v| async move { Ok(v) })
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let processor = ParallelProcessor::new(8);
        // Earlier items sleep longer, so they finish last.
        let results = processor
            .run((0..8u64).collect(), |i| async move {
                tokio::time::sleep(Duration::from_millis(5 * (8 - i))).await;
                Ok(i)
            })
            .await;
        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_tasks_run_in_parallel() {
        let processor = ParallelProcessor::new(4);
        let start = Instant::now();
        let results = processor
            .run((0..4u64).collect(), |i| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(i)
            })
            .await;
        let elapsed = start.elapsed();
        assert_eq!(results.len(), 4);
        // All four should run in parallel, so total time should be
        // close to 50ms, not 200ms. Allow generous margin.
        assert!(
            elapsed < Duration::from_millis(190),
            "Expected parallel execution, took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_semaphore_limits_concurrency() {
        let processor = ParallelProcessor::new(2);
        let concurrent = Arc::new(AtomicU64::new(0));
        let max_seen = Arc::new(AtomicU64::new(0));

        let conc = Arc::clone(&concurrent);
        let ms = Arc::clone(&max_seen);
        let results = processor
            .run((0..6u64).collect(), move |_| {
                let conc = Arc::clone(&conc);
                let ms = Arc::clone(&ms);
                async move {
                    let current = conc.fetch_add(1, Ordering::SeqCst) + 1;
                    ms.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    conc.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(results.iter().all(Result::is_ok));
        let observed_max = max_seen.load(Ordering::SeqCst);
        assert!(
            observed_max <= 2,
            "Expected max concurrency 2, observed {observed_max}"
        );
    }

    #[tokio::test]
    async fn test_errors_are_per_item() {
        let processor = ParallelProcessor::new(3);
        let results = processor
            .run(vec![1u64, 2, 3], |v| async move {
                if v == 2 {
                    Err(CollectorError::Config("bad item".into()))
                } else {
                    Ok(v)
                }
            })
            .await;
        assert_eq!(results[0].as_ref().ok(), Some(&1));
        assert!(matches!(results[1], Err(CollectorError::Config(_))));
        assert_eq!(results[2].as_ref().ok(), Some(&3));
    }

    #[tokio::test]
    async fn test_panic_becomes_task_failed() {
        let processor = ParallelProcessor::new(2);
        let results = processor
            .run(vec![1u64, 2, 3], |v| async move {
                if v == 2 {
                    panic!("worker blew up");
                }
                Ok(v)
            })
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().ok(), Some(&1));
        assert!(matches!(results[1], Err(CollectorError::TaskFailed(_))));
        assert_eq!(results[2].as_ref().ok(), Some(&3));
    }

    #[tokio::test]
    async fn test_zero_is_clamped_to_one() {
        let processor = ParallelProcessor::new(0);
        assert_eq!(processor.max_concurrent(), 1);
        let results = processor.run(vec![7u64], |v| async move { Ok(v) }).await;
        assert_eq!(results[0].as_ref().ok(), Some(&7));
    }

    #[tokio::test]
    async fn test_max_concurrent_getter() {
        let processor = ParallelProcessor::new(8);
        assert_eq!(processor.max_concurrent(), 8);
    }
}
