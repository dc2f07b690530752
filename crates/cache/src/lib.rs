//! Batched, deduplicating metadata cache.
//!
//! A [`MetadataCache`] turns many keys into fully materialised metadata
//! records with as few remote round-trips as possible:
//!
//! - duplicate keys in one lookup collapse into a single fetch,
//! - keys already resolved are never fetched again for the lifetime of the cache,
//! - keys currently being fetched by another caller are joined, not re-fetched.
//!
//! Entries are only ever added. There is no eviction and no invalidation;
//! freshness is handled by whoever owns the cache dropping it and building a
//! new one.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use vaultlens_common::error::ResolutionError;
use vaultlens_common::types::ResolverKind;

/// Remote batch lookup capability backing a [`MetadataCache`].
///
/// Implementations must return exactly one value per key, in the same order
/// as `keys`. Any failure fails the whole batch.
#[async_trait]
pub trait Resolver<K, V>: Send + Sync {
    fn kind(&self) -> ResolverKind;

    async fn resolve(&self, keys: &[K]) -> Result<Vec<V>, ResolutionError>;
}

type Batch = Shared<BoxFuture<'static, Result<(), ResolutionError>>>;

struct CacheState<K, V> {
    entries: HashMap<K, V>,
    /// Keys with an outstanding resolver call, tagged with the owning batch id.
    in_flight: HashMap<K, (u64, Batch)>,
    next_batch: u64,
}

/// Memoising front for a [`Resolver`]. Cloning shares the underlying table.
pub struct MetadataCache<K, V> {
    resolver: Arc<dyn Resolver<K, V>>,
    state: Arc<Mutex<CacheState<K, V>>>,
}

impl<K, V> Clone for MetadataCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            state: Arc::clone(&self.state),
        }
    }
}

/// Outcome of partitioning a lookup into hits, joins and new misses.
struct LookupPlan {
    waits: Vec<Batch>,
    spawned: Option<Batch>,
}

impl<K, V> MetadataCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(resolver: Arc<dyn Resolver<K, V>>) -> Self {
        Self {
            resolver,
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_batch: 0,
            })),
        }
    }

    pub fn kind(&self) -> ResolverKind {
        self.resolver.kind()
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    /// Resolve a single key.
    pub async fn get_one(&self, key: K) -> Result<V, ResolutionError> {
        let mut values = self.get_many(std::slice::from_ref(&key)).await?;
        values
            .pop()
            .ok_or_else(|| ResolutionError::NotFound(format!("{key:?}")))
    }

    /// Resolve `keys`, returning one value per input key in input order.
    ///
    /// Distinct unresolved keys are sent to the resolver in a single call,
    /// in first-occurrence order. If that call fails, nothing is cached and
    /// the error is returned; retrying the same call is safe.
    ///
    /// The resolver call runs on a spawned task when a Tokio runtime is
    /// available, so dropping this future does not cancel the round-trip and
    /// its result is still memorised.
    pub async fn get_many(&self, keys: &[K]) -> Result<Vec<V>, ResolutionError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let plan = self.plan(keys);

        if let Some(batch) = plan.spawned {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(batch);
            }
        }

        futures::future::try_join_all(plan.waits).await?;

        let state = lock(&self.state);
        keys.iter()
            .map(|key| {
                state.entries.get(key).cloned().ok_or_else(|| {
                    ResolutionError::NotFound(format!("{key:?} missing after resolution"))
                })
            })
            .collect()
    }

    fn plan(&self, keys: &[K]) -> LookupPlan {
        let mut state = lock(&self.state);

        let mut missing: Vec<K> = Vec::new();
        let mut seen: HashSet<&K> = HashSet::new();
        let mut joined: HashSet<u64> = HashSet::new();
        let mut waits: Vec<Batch> = Vec::new();
        let mut hits = 0usize;

        for key in keys {
            if state.entries.contains_key(key) {
                hits += 1;
                continue;
            }
            if let Some((batch_id, batch)) = state.in_flight.get(key) {
                if joined.insert(*batch_id) {
                    waits.push(batch.clone());
                }
                continue;
            }
            if seen.insert(key) {
                missing.push(key.clone());
            }
        }

        tracing::debug!(
            kind = %self.resolver.kind(),
            requested = keys.len(),
            hits,
            joined = joined.len(),
            missing = missing.len(),
            "Metadata cache lookup"
        );

        if missing.is_empty() {
            return LookupPlan {
                waits,
                spawned: None,
            };
        }

        let batch_id = state.next_batch;
        state.next_batch += 1;

        let batch: Batch = self.resolve_batch(batch_id, missing.clone()).boxed().shared();
        for key in missing {
            state.in_flight.insert(key, (batch_id, batch.clone()));
        }
        waits.push(batch.clone());

        LookupPlan {
            waits,
            spawned: Some(batch),
        }
    }

    fn resolve_batch(
        &self,
        batch_id: u64,
        keys: Vec<K>,
    ) -> impl Future<Output = Result<(), ResolutionError>> + Send + 'static {
        let resolver = Arc::clone(&self.resolver);
        let state = Arc::clone(&self.state);

        async move {
            let kind = resolver.kind();
            let outcome = AssertUnwindSafe(resolver.resolve(&keys))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(ResolutionError::Aborted(format!("{kind} resolver panicked")))
                })
                .and_then(|values| {
                    if values.len() == keys.len() {
                        Ok(values)
                    } else {
                        Err(ResolutionError::LengthMismatch {
                            expected: keys.len(),
                            actual: values.len(),
                        })
                    }
                });

            let mut guard = lock(&state);
            for key in &keys {
                if matches!(guard.in_flight.get(key), Some((owner, _)) if *owner == batch_id) {
                    guard.in_flight.remove(key);
                }
            }

            match outcome {
                Ok(values) => {
                    let count = values.len();
                    for (key, value) in keys.into_iter().zip(values) {
                        guard.entries.entry(key).or_insert(value);
                    }
                    tracing::info!(kind = %kind, batch_id, count, "Resolved metadata batch");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(
                        kind = %kind,
                        batch_id,
                        keys = keys.len(),
                        error = %e,
                        "Metadata batch failed"
                    );
                    Err(e)
                }
            }
        }
    }
}

/// The table is monotonic, so a poisoned lock still holds consistent data.
fn lock<K, V>(state: &Mutex<CacheState<K, V>>) -> MutexGuard<'_, CacheState<K, V>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Resolver<String, String> for Upper {
        fn kind(&self) -> ResolverKind {
            ResolverKind::FungibleAsset
        }

        async fn resolve(&self, keys: &[String]) -> Result<Vec<String>, ResolutionError> {
            Ok(keys.iter().map(|k| k.to_uppercase()).collect())
        }
    }

    #[tokio::test]
    async fn test_empty_lookup() {
        let cache = MetadataCache::new(Arc::new(Upper));
        assert!(cache.get_many(&[]).await.unwrap().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_one() {
        let cache = MetadataCache::new(Arc::new(Upper));
        assert_eq!(cache.get_one("abc".to_string()).await.unwrap(), "ABC");
        assert!(cache.contains(&"abc".to_string()));
        assert_eq!(cache.kind(), ResolverKind::FungibleAsset);
    }

    #[test]
    fn test_lookup_without_runtime_still_resolves() {
        let cache = MetadataCache::new(Arc::new(Upper));
        let values = futures::executor::block_on(cache.get_many(&["x".to_string()])).unwrap();
        assert_eq!(values, vec!["X".to_string()]);
    }
}
