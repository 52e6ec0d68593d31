//! Bounded concurrency helpers
//!
//! Everything here runs on the calling task: "concurrent" means several
//! futures in flight at once, not extra threads.

use super::RateLimiter;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Progress callback: `(completed, total)`
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Run `f` over `inputs` with at most `limit` futures in flight.
///
/// Results come back in input order regardless of completion order.
/// `on_progress` is called after every completion.
pub async fn parallel_map<I, T, R, F, Fut>(
    inputs: I,
    limit: usize,
    f: F,
    on_progress: Option<&ProgressFn<'_>>,
) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let items: Vec<T> = inputs.into_iter().collect();
    let total = items.len();
    let f = &f;

    let mut in_flight = stream::iter(items.into_iter().enumerate().map(|(index, item)| {
        let task = f(item);
        async move { (index, task.await) }
    }))
    .buffer_unordered(limit.max(1));

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let mut completed = 0;
    while let Some((index, result)) = in_flight.next().await {
        slots[index] = Some(result);
        completed += 1;
        if let Some(callback) = on_progress {
            callback(completed, total);
        }
    }

    slots.into_iter().flatten().collect()
}

/// Like [`parallel_map`], but every task also waits for a token from
/// `limiter` before it starts. The limiter gates admission, `limit` gates the
/// number in flight.
pub async fn parallel_map_rate_limited<I, T, R, F, Fut>(
    inputs: I,
    limit: usize,
    limiter: &RateLimiter,
    f: F,
    on_progress: Option<&ProgressFn<'_>>,
) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let f = &f;
    parallel_map(
        inputs,
        limit,
        move |item| async move {
            limiter.acquire().await;
            f(item).await
        },
        on_progress,
    )
    .await
}

/// Shared cap on in-flight operations across independent callers
#[derive(Debug)]
pub struct TaskQueue {
    semaphore: Semaphore,
    limit: usize,
    completed: AtomicUsize,
}

impl TaskQueue {
    /// Allow up to `limit` tasks at once
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            limit,
            completed: AtomicUsize::new(0),
        }
    }

    /// Concurrency cap
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    /// Tasks finished since creation
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Wait for a free slot, then run `task`. Excess tasks queue, they are
    /// never rejected.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquisition only fails if that changes.
        let _permit = self.semaphore.acquire().await.ok();
        let output = task.await;
        self.completed.fetch_add(1, Ordering::Relaxed);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_parallel_map_preserves_order() {
        // Later inputs finish first
        let results = parallel_map(
            vec![30u64, 20, 10],
            3,
            |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms * 2
            },
            None,
        )
        .await;
        assert_eq!(results, vec![60, 40, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_map_respects_limit() {
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let results = parallel_map(
            0..10,
            3,
            |i| {
                let current = &current;
                let peak = &peak;
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            },
            None,
        )
        .await;
        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_parallel_map_reports_progress() {
        let seen = Mutex::new(Vec::new());
        let record = |done: usize, total: usize| seen.lock().push((done, total));
        let results = parallel_map(vec!["a", "b", "c"], 2, |s| async move { s.len() }, Some(&record)).await;
        assert_eq!(results, vec![1, 1, 1]);
        assert_eq!(*seen.lock(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_parallel_map_empty_input() {
        let results: Vec<u32> = parallel_map(Vec::<u32>::new(), 4, |x| async move { x }, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_map_gates_admission() {
        let limiter = RateLimiter::new(10.0, 1);
        let started = tokio::time::Instant::now();
        let results =
            parallel_map_rate_limited(0..4, 4, &limiter, |i| async move { i + 1 }, None).await;
        assert_eq!(results, vec![1, 2, 3, 4]);
        // One token up front, three more at 100ms intervals
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_queue_limits_in_flight() {
        let queue = Arc::new(TaskQueue::new(2));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    queue
                        .run(async {
                            peak.fetch_max(queue.in_flight(), Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.completed(), 6);
        assert_eq!(queue.in_flight(), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
