use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

/// Run `f` for every item as its own task and collect the results by key.
///
/// At most `limit` tasks run at once (`None` or `Some(0)` means unbounded).
/// Returns only after every task has finished; a task that panics is logged
/// and its key is absent from the result.
pub async fn concurrent_map<K, I, V, F, Fut>(
    items: impl IntoIterator<Item = (K, I)>,
    limit: Option<usize>,
    f: F,
) -> HashMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    I: Send + 'static,
    V: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = V> + Send + 'static,
{
    // one map and one lock per call, never shared between calls
    let results: Arc<Mutex<HashMap<K, V>>> = Arc::new(Mutex::new(HashMap::new()));
    let permits = limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n)));

    let mut tasks = JoinSet::new();
    for (key, item) in items {
        let work = f(item);
        let results = results.clone();
        let permits = permits.clone();

        tasks.spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            let value = work.await;
            results.lock().await.insert(key, value);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("Concurrent task failed: {}", e);
        }
    }

    let mut guard = results.lock().await;
    std::mem::take(&mut *guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn collects_one_result_per_key() {
        let items = vec![("a", 1u64), ("b", 2), ("c", 3)];
        let out = concurrent_map(items, None, |n| async move { n * 10 }).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out["a"], 10);
        assert_eq!(out["c"], 30);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_concurrency_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items = (0..8).map(|i| (i, ()));
        let out = concurrent_map(items, Some(3), |_| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(out.len(), 8);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_runs_everything_at_once() {
        let started = tokio::time::Instant::now();
        let items = (0..5).map(|i| (i, i));
        let out = concurrent_map(items, None, |i| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            i
        })
        .await;

        assert_eq!(out.len(), 5);
        // bounded by the slowest task, not the sum
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn panicking_task_is_left_out() {
        let items = vec![("ok", false), ("boom", true)];
        let out = concurrent_map(items, None, |fail| async move {
            if fail {
                panic!("probe exploded");
            }
            1
        })
        .await;

        assert_eq!(out.len(), 1);
        assert!(out.contains_key("ok"));
    }
}
