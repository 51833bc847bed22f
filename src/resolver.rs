//! Batching resolvers
//!
//! A [`Resolver`] turns many keyed lookups into one call to its batch-fetch
//! function. Callers ask for a [`Deferred`] with [`Resolver::future`] while
//! building a response, and every pending key is fetched at once on the next
//! [`Resolve::resolve`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::batch::{resolve_all, ResolveAll};
use crate::{BoxError, Deferred, ResolveError, Result, Scope};

/// Batch fetch function for a resolver
#[async_trait]
pub trait BatchFetch<K, V>: Send + Sync {
    /// Fetch values for the given keys
    ///
    /// Must return exactly one value per key, in the same order as `keys`.
    /// Repeated keys are passed through as-is and need one value each.
    async fn fetch(&self, scope: &Scope, keys: &[K]) -> std::result::Result<Vec<V>, BoxError>;
}

/// Adapter turning an async function into a [`BatchFetch`]
pub struct FnFetch<F>(pub F);

#[async_trait]
impl<K, V, F, Fut> BatchFetch<K, V> for FnFetch<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Scope, Vec<K>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Vec<V>, BoxError>> + Send + 'static,
{
    async fn fetch(&self, scope: &Scope, keys: &[K]) -> std::result::Result<Vec<V>, BoxError> {
        (self.0)(scope.clone(), keys.to_vec()).await
    }
}

/// The part of a resolver that round-based resolution needs
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Fetch every pending key in one batch and fill in the pending values
    async fn resolve(&self, scope: &Scope) -> Result<()>;

    /// Diagnostic name
    fn name(&self) -> &str;

    /// Number of values still waiting for a batch
    fn count(&self) -> usize;
}

struct Pending<T, K> {
    key: K,
    slot: Arc<OnceLock<T>>,
}

struct State<T, K> {
    pending: Vec<Pending<T, K>>,
    resolved: HashMap<K, T>,
}

/// Resolver with a pending queue and a resolved-value cache
///
/// Meant to live for one unit of work (typically one request). The cache only
/// grows; nothing is evicted.
pub struct Resolver<T, K> {
    name: Arc<str>,
    fetcher: Box<dyn BatchFetch<K, T>>,
    state: Mutex<State<T, K>>,
}

impl<T, K> Resolver<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    /// Create a resolver backed by a batch fetcher
    pub fn new(name: impl Into<String>, fetcher: impl BatchFetch<K, T> + 'static) -> Self {
        Self {
            name: Arc::from(name.into()),
            fetcher: Box::new(fetcher),
            state: Mutex::new(State {
                pending: Vec::new(),
                resolved: HashMap::new(),
            }),
        }
    }

    /// Create a resolver backed by an async function
    ///
    /// # Example
    ///
    /// ```rust
    /// use lazy_resolve::{BoxError, Resolver, Scope};
    ///
    /// async fn fetch_users(_scope: Scope, ids: Vec<u64>) -> Result<Vec<String>, BoxError> {
    ///     Ok(ids.iter().map(|id| format!("user-{id}")).collect())
    /// }
    ///
    /// let users = Resolver::from_fn("users", fetch_users);
    /// let author = users.future(1);
    /// assert!(!author.is_resolved());
    /// ```
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Scope, Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<T>, BoxError>> + Send + 'static,
    {
        Self::new(name, FnFetch(f))
    }

    /// Request the value for `key`
    ///
    /// Returns a resolved value straight from the cache when `key` was fetched
    /// before. Otherwise the key is queued for the next batch; repeated keys
    /// are queued once per call.
    pub fn future(&self, key: K) -> Deferred<T, K> {
        let mut state = self.state.lock();
        if let Some(value) = state.resolved.get(&key) {
            return Deferred::cached(self.name.clone(), key, value.clone());
        }

        let slot = Arc::new(OnceLock::new());
        state.pending.push(Pending {
            key: key.clone(),
            slot: slot.clone(),
        });
        Deferred::pending(self.name.clone(), key, slot)
    }

    /// Prime the cache with a value
    ///
    /// Useful for seeding the cache with data you already have. Later
    /// [`Resolver::future`] calls for `key` resolve immediately.
    pub fn prime(&self, key: K, value: T) {
        self.state.lock().resolved.insert(key, value);
    }

    /// Whether `key` has a cached value
    pub fn is_cached(&self, key: &K) -> bool {
        self.state.lock().resolved.contains_key(key)
    }

    /// Put a failed batch back at the head of the queue
    fn requeue(&self, batch: Vec<Pending<T, K>>) {
        let mut state = self.state.lock();
        let registered_during_fetch = std::mem::replace(&mut state.pending, batch);
        state.pending.extend(registered_during_fetch);
    }
}

#[async_trait]
impl<T, K> Resolve for Resolver<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    async fn resolve(&self, scope: &Scope) -> Result<()> {
        // Drain first: the fetch may register new futures on this resolver.
        let batch = std::mem::take(&mut self.state.lock().pending);
        if batch.is_empty() {
            return Ok(());
        }

        let keys: Vec<K> = batch.iter().map(|p| p.key.clone()).collect();
        debug!(resolver = %self.name, keys = keys.len(), "resolving batch");

        let values = match self.fetcher.fetch(scope, &keys).await {
            Ok(values) => values,
            Err(err) => {
                self.requeue(batch);
                return Err(ResolveError::Fetch(err));
            }
        };

        if values.len() != keys.len() {
            self.requeue(batch);
            return Err(ResolveError::LengthMismatch {
                resolver: self.name.to_string(),
                expected: keys.len(),
                actual: values.len(),
            });
        }

        let mut state = self.state.lock();
        for (pending, value) in batch.into_iter().zip(values) {
            state.resolved.insert(pending.key, value.clone());
            let written = pending.slot.set(value).is_ok();
            debug_assert!(written, "deferred slot written twice");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

#[async_trait]
impl<T, K> ResolveAll for Resolver<T, K>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    async fn resolve_all(&self, scope: &Scope) -> Result<()> {
        resolve_all(scope, &[self]).await
    }
}
