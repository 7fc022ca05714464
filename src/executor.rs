//! Bounded concurrent task executor with deterministic result ordering.
//!
//! Runs an ordered list of async tasks through a fixed pool of worker
//! futures. Each worker claims the next unclaimed task index from a shared
//! atomic counter and writes its result into the output slot at that index,
//! so the output order always equals the input order regardless of
//! completion order. Cancellation is cooperative: a cancelled token stops
//! workers from claiming new tasks, while in-flight tasks are expected to
//! observe the token themselves.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::{BoxFuture, try_join_all};
use tokio_util::sync::CancellationToken;

use crate::error::ExportError;

/// Run `tasks` with at most `concurrency` in flight, preserving input order
/// in the returned results.
///
/// A `concurrency` of zero is clamped to one. An empty task list returns an
/// empty vec without spawning workers. The first task error (including
/// [`ExportError::Aborted`] raised by a worker observing the cancelled
/// token before a claim) fails the whole call; remaining in-flight tasks
/// are dropped.
pub async fn run_ordered<T: Send>(
    tasks: Vec<BoxFuture<'_, Result<T, ExportError>>>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>, ExportError> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let task_count = tasks.len();
    let workers = concurrency.max(1).min(task_count);

    let next_index = AtomicUsize::new(0);
    let cells: Vec<Mutex<Option<BoxFuture<'_, Result<T, ExportError>>>>> =
        tasks.into_iter().map(|t| Mutex::new(Some(t))).collect();
    let slots: Vec<Mutex<Option<T>>> = (0..task_count).map(|_| Mutex::new(None)).collect();

    let worker_futures = (0..workers).map(|_| {
        let next_index = &next_index;
        let cells = &cells;
        let slots = &slots;
        async move {
            loop {
                if cancel.is_cancelled() {
                    return Err(ExportError::Aborted);
                }

                let index = next_index.fetch_add(1, Ordering::SeqCst);
                if index >= cells.len() {
                    return Ok(());
                }

                let task = cells[index]
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                let Some(task) = task else {
                    return Ok(());
                };

                let value = task.await?;
                *slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
            }
        }
    });

    try_join_all(worker_futures.collect::<Vec<_>>()).await?;

    let mut results = Vec::with_capacity(task_count);
    for slot in slots {
        match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(value) => results.push(value),
            // Unreachable once all workers returned Ok: every claimed index
            // either filled its slot or failed the join.
            None => return Err(ExportError::Other("executor lost a task result".to_string())),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures::FutureExt;

    #[tokio::test(start_paused = true)]
    async fn output_order_matches_input_order_despite_delays() {
        // Later tasks finish earlier: task i sleeps (10 - i) * 10ms.
        let tasks: Vec<BoxFuture<'static, Result<usize, ExportError>>> = (0..10usize)
            .map(|i| {
                async move {
                    tokio::time::sleep(Duration::from_millis((10 - i as u64) * 10)).await;
                    Ok(i)
                }
                .boxed()
            })
            .collect();

        let cancel = CancellationToken::new();
        let results = run_ordered(tasks, 3, &cancel).await.unwrap();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_tasks_never_exceed_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<BoxFuture<'static, Result<(), ExportError>>> = (0..12)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .collect();

        let cancel = CancellationToken::new();
        run_ordered(tasks, 4, &cancel).await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_runs_zero_tasks() {
        let ran = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<BoxFuture<'static, Result<(), ExportError>>> = (0..5)
            .map(|_| {
                let ran = Arc::clone(&ran);
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .collect();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_ordered(tasks, 2, &cancel).await.expect_err("aborted");
        assert!(err.is_aborted());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_task_list_returns_empty_results() {
        let cancel = CancellationToken::new();
        let tasks: Vec<BoxFuture<'static, Result<u8, ExportError>>> = Vec::new();
        let results = run_ordered(tasks, 8, &cancel).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let tasks: Vec<BoxFuture<'static, Result<u8, ExportError>>> =
            vec![async { Ok(1) }.boxed(), async { Ok(2) }.boxed()];
        let cancel = CancellationToken::new();
        let results = run_ordered(tasks, 0, &cancel).await.unwrap();
        assert_eq!(results, vec![1, 2]);
    }

    #[tokio::test]
    async fn first_task_error_fails_the_whole_call() {
        let tasks: Vec<BoxFuture<'static, Result<u8, ExportError>>> = vec![
            async { Ok(1) }.boxed(),
            async { Err(ExportError::Other("boom".to_string())) }.boxed(),
            async { Ok(3) }.boxed(),
        ];
        let cancel = CancellationToken::new();
        let err = run_ordered(tasks, 1, &cancel).await.expect_err("error");
        assert!(matches!(err, ExportError::Other(m) if m == "boom"));
    }
}
