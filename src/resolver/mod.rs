//! Fan-out resolution: look up many keys in parallel, answer in request order.
//!
//! [`FanOutResolver`] spawns one blocking task per key on Tokio's blocking
//! pool. Each task goes through the shared [`ReadThrough`] cache, calling the
//! caller's fetch function only on a miss, and hands back `(index, value)`.
//! The joining task writes every value into a buffer pre-sized to the number
//! of keys, so the output is index-aligned with the input no matter which
//! fetch finishes first.
//!
//! Nothing is returned until every task has finished. By default there is no
//! timeout: a fetch that never returns keeps the resolution pending forever.
//! [`FanOutResolver::with_deadline`] bounds the wait.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::cache::ReadThrough;

/// Errors that abort a whole resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolution task failed: {0}")]
    Task(#[from] JoinError),

    #[error("resolution did not finish within {deadline:?}")]
    DeadlineExceeded { deadline: Duration },
}

/// An input key that could not be parsed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key #{index} ({input:?}) is invalid: {reason}")]
pub struct KeyParseError {
    /// Position of the input in the request.
    pub index: usize,
    /// The raw input as received.
    pub input: String,
    /// Why parsing failed.
    pub reason: String,
}

/// The outcome of [`FanOutResolver::resolve_raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<V> {
    /// One value per input, in input order. Skipped inputs hold `V::default()`.
    pub values: Vec<V>,
    /// Inputs that failed to parse, in input order.
    pub skipped: Vec<KeyParseError>,
}

/// Resolves ordered key lists concurrently through a shared cache.
///
/// Cloning is cheap: clones share the same cache.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use readthrough::cache::Cache;
/// use readthrough::resolver::FanOutResolver;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), readthrough::resolver::ResolveError> {
/// let resolver = FanOutResolver::new(Arc::new(Cache::<u32, u32>::new()));
/// let squares = resolver
///     .resolve_all(vec![3, 1, 2], Arc::new(|k: &u32| k * k))
///     .await?;
/// assert_eq!(squares, vec![9, 1, 4]);
/// # Ok(())
/// # }
/// ```
pub struct FanOutResolver<C> {
    cache: Arc<C>,
    deadline: Option<Duration>,
}

impl<C> Clone for FanOutResolver<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            deadline: self.deadline,
        }
    }
}

impl<C> fmt::Debug for FanOutResolver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutResolver")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<C> FanOutResolver<C> {
    /// Creates a resolver over `cache` with no deadline.
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            deadline: None,
        }
    }

    /// Bounds every resolution by `deadline`.
    ///
    /// When it elapses the call returns [`ResolveError::DeadlineExceeded`].
    /// Fetches already running are not interrupted; they finish in the
    /// background and still fill the cache.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Returns the configured deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Resolves every key, returning values in the order of `keys`.
    ///
    /// Duplicate keys are allowed and go through the cache independently.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Task`] if a fetch panicked.
    /// - [`ResolveError::DeadlineExceeded`] if a deadline is set and elapsed.
    pub async fn resolve_all<K, V, F>(
        &self,
        keys: Vec<K>,
        fetch: Arc<F>,
    ) -> Result<Vec<V>, ResolveError>
    where
        C: ReadThrough<K, V> + 'static,
        K: Send + 'static,
        V: Default + Send + 'static,
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        let keys = keys.into_iter().map(Some).collect();
        let slots = self.resolve_slots(keys, fetch).await?;
        Ok(slots.into_iter().map(Option::unwrap_or_default).collect())
    }

    /// Resolves every key with a fallible fetch.
    ///
    /// Each position carries its own outcome. Failed fetches are not cached,
    /// so the next resolution of the same key retries.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_all`](Self::resolve_all); fetch errors are not errors
    /// of the resolution itself.
    pub async fn try_resolve_all<K, V, E, F>(
        &self,
        keys: Vec<K>,
        fetch: Arc<F>,
    ) -> Result<Vec<Result<V, E>>, ResolveError>
    where
        C: ReadThrough<K, V> + 'static,
        K: Send + 'static,
        V: Send + 'static,
        E: Send + 'static,
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        let keys = keys.into_iter().map(Some).collect();
        let cache = Arc::clone(&self.cache);
        let slots = self
            .join_within(keys, move |key| cache.try_get_with(key, |k| fetch(k)))
            .await?;
        // Every key was present, so every slot was written.
        Ok(slots.into_iter().flatten().collect())
    }

    /// Parses each raw input as `K` and resolves the ones that parse.
    ///
    /// An input that fails to parse does not abort the others: its position
    /// holds `V::default()` and the failure is recorded in
    /// [`Resolution::skipped`].
    ///
    /// # Errors
    ///
    /// Same as [`resolve_all`](Self::resolve_all).
    pub async fn resolve_raw<K, V, F, S>(
        &self,
        raw: &[S],
        fetch: Arc<F>,
    ) -> Result<Resolution<V>, ResolveError>
    where
        C: ReadThrough<K, V> + 'static,
        K: FromStr + Send + 'static,
        K::Err: fmt::Display,
        V: Default + Send + 'static,
        F: Fn(&K) -> V + Send + Sync + 'static,
        S: AsRef<str>,
    {
        let (keys, skipped) = parse_keys(raw);
        for error in &skipped {
            warn!(
                index = error.index,
                input = %error.input,
                reason = %error.reason,
                "skipping invalid key"
            );
        }

        let slots = self.resolve_slots(keys, fetch).await?;
        Ok(Resolution {
            values: slots.into_iter().map(Option::unwrap_or_default).collect(),
            skipped,
        })
    }

    async fn resolve_slots<K, V, F>(
        &self,
        keys: Vec<Option<K>>,
        fetch: Arc<F>,
    ) -> Result<Vec<Option<V>>, ResolveError>
    where
        C: ReadThrough<K, V> + 'static,
        K: Send + 'static,
        V: Send + 'static,
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        let cache = Arc::clone(&self.cache);
        self.join_within(keys, move |key| cache.get_with(key, |k| fetch(k)))
            .await
    }

    async fn join_within<K, T, W>(
        &self,
        keys: Vec<Option<K>>,
        work: W,
    ) -> Result<Vec<Option<T>>, ResolveError>
    where
        K: Send + 'static,
        T: Send + 'static,
        W: Fn(K) -> T + Send + Sync + 'static,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fan_out(keys, work))
                .await
                .map_err(|_| ResolveError::DeadlineExceeded { deadline })?,
            None => fan_out(keys, work).await,
        }
    }
}

/// Runs `work` for every present key on the blocking pool and waits for all of them.
///
/// Position `i` of the result holds the output for `keys[i]`, or `None` where
/// `keys[i]` was `None`.
async fn fan_out<K, T, W>(keys: Vec<Option<K>>, work: W) -> Result<Vec<Option<T>>, ResolveError>
where
    K: Send + 'static,
    T: Send + 'static,
    W: Fn(K) -> T + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let mut slots: Vec<Option<T>> = Vec::with_capacity(keys.len());
    slots.resize_with(keys.len(), || None);

    let mut tasks = JoinSet::new();
    for (index, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let work = Arc::clone(&work);
        tasks.spawn_blocking(move || (index, work(key)));
    }

    debug!(keys = slots.len(), tasks = tasks.len(), "fan-out started");
    while let Some(joined) = tasks.join_next().await {
        let (index, value) = joined?;
        slots[index] = Some(value);
    }

    Ok(slots)
}

fn parse_keys<K, S>(raw: &[S]) -> (Vec<Option<K>>, Vec<KeyParseError>)
where
    K: FromStr,
    K::Err: fmt::Display,
    S: AsRef<str>,
{
    let mut skipped = Vec::new();
    let keys = raw
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let input = input.as_ref();
            match input.parse::<K>() {
                Ok(key) => Some(key),
                Err(e) => {
                    skipped.push(KeyParseError {
                        index,
                        input: input.to_owned(),
                        reason: e.to_string(),
                    });
                    None
                }
            }
        })
        .collect();
    (keys, skipped)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, mpsc};
    use std::thread;

    use super::*;
    use crate::cache::{Cache, KeyedCache};

    fn letters() -> Arc<impl Fn(&u32) -> String + Send + Sync + 'static> {
        Arc::new(|k: &u32| match k {
            1 => "A".to_string(),
            2 => "B".to_string(),
            _ => String::new(),
        })
    }

    #[test]
    fn parse_keys_reports_failures_in_order() {
        let (keys, skipped) = parse_keys::<u32, _>(&["1", "x", "2", ""]);
        assert_eq!(keys, vec![Some(1), None, Some(2), None]);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].index, 1);
        assert_eq!(skipped[0].input, "x");
        assert_eq!(skipped[1].index, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_request_resolves_to_empty() {
        let resolver = FanOutResolver::new(Arc::new(Cache::<u32, String>::new()));
        let values = resolver.resolve_all(Vec::new(), letters()).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_key_leaves_default_and_others_resolve() {
        let resolver = FanOutResolver::new(Arc::new(Cache::<u32, String>::new()));
        let resolution = resolver
            .resolve_raw(&["1", "x", "2"], letters())
            .await
            .unwrap();
        assert_eq!(resolution.values, vec!["A", "", "B"]);
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].input, "x");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicates_share_one_fill() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let fetch = Arc::new(move |k: &u32| {
            counted.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            k + 1000
        });

        let resolver = FanOutResolver::new(Arc::new(KeyedCache::<u32, u32>::new()));
        let values = resolver.resolve_all(vec![5; 32], fetch).await.unwrap();
        assert_eq!(values, vec![1005; 32]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_errors_stay_in_their_slot() {
        let resolver = FanOutResolver::new(Arc::new(Cache::<u32, u32>::new()));
        let fetch = Arc::new(|k: &u32| {
            if k % 2 == 0 {
                Ok(k * 10)
            } else {
                Err(format!("odd {k}"))
            }
        });

        let results = resolver
            .try_resolve_all(vec![1, 2, 3, 4], fetch)
            .await
            .unwrap();
        assert_eq!(
            results,
            vec![
                Err("odd 1".to_string()),
                Ok(20),
                Err("odd 3".to_string()),
                Ok(40)
            ]
        );
        assert_eq!(resolver.cache().len(), 2);
        assert_eq!(resolver.cache().get(&1), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_fetch_is_a_task_error() {
        let resolver = FanOutResolver::new(Arc::new(KeyedCache::<u32, u32>::new()));
        let fetch = Arc::new(|k: &u32| if *k == 2 { panic!("store exploded") } else { *k });
        let result = resolver.resolve_all(vec![1, 2, 3], fetch).await;
        assert!(matches!(result, Err(ResolveError::Task(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deadline_bounds_a_hung_fetch() {
        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let fetch = Arc::new(move |_: &u32| {
            // Blocks until the test drops `release`.
            let _ = gate.lock().map(|rx| rx.recv());
            0u32
        });

        let resolver = FanOutResolver::new(Arc::new(KeyedCache::<u32, u32>::new()))
            .with_deadline(Duration::from_millis(100));
        let result = resolver.resolve_all(vec![1], fetch).await;
        assert!(matches!(
            result,
            Err(ResolveError::DeadlineExceeded { deadline }) if deadline == Duration::from_millis(100)
        ));

        drop(release);
    }
}
