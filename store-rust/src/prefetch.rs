use futures::stream::{self, StreamExt};
use std::{collections::HashSet, future::Future};

/// Unique positive ids in first-seen order.
#[must_use]
pub fn unique_positive_ids<I>(ids: I) -> Vec<i64>
where
    I: IntoIterator<Item = i64>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| *id > 0 && seen.insert(*id))
        .collect()
}

/// Run `worker` over `items` with at most `limit` calls in progress at any
/// time. Items are picked up in order as earlier calls finish.
pub async fn run_with_concurrency<T, F, Fut>(items: Vec<T>, limit: usize, worker: F)
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ()>,
{
    if items.is_empty() {
        return;
    }
    stream::iter(items)
        .for_each_concurrent(limit.max(1), worker)
        .await;
}
