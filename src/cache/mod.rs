//! In-process TTL cache with request coalescing.
//!
//! Per key a value moves `Absent -> Pending -> Fresh -> Stale`. While a
//! computation is pending, every caller for the same key awaits that one
//! computation. Successful results are stored with the clock's timestamp;
//! failures reach every waiting caller and are never stored.
//!
//! Computations run on their own task, so a caller that stops waiting does
//! not cancel work other callers may be attached to. Invalidation never
//! starts a second computation for a key: a running one stays joinable but
//! its result is not stored.

pub mod key;

pub use key::{cache_key, cache_key_from_request};

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use tokio::sync::oneshot;

use crate::clock::Clock;
use crate::error::{Error, Result};

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedResult = Shared<BoxFuture<'static, Result<AnyValue>>>;

struct CacheEntry {
    stored_at_ms: i64,
    value: AnyValue,
}

struct InFlight {
    id: u64,
    fut: SharedResult,
    /// Set by `invalidate`; the result is still delivered but not stored.
    invalidated: bool,
}

struct Inner {
    entries: DashMap<String, CacheEntry>,
    inflight: DashMap<String, InFlight>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
}

/// Removes the in-flight registration it was created for, and only that
/// one, however the computation ends.
struct InFlightGuard {
    inner: Arc<Inner>,
    key: String,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .inflight
            .remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

/// Cheap to clone; clones share the same maps.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                inflight: DashMap::new(),
                clock,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<AnyValue> {
        let entry = self.inner.entries.get(key)?;
        let age_ms = self.inner.clock.epoch_ms() - entry.stored_at_ms;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        (age_ms < ttl_ms).then(|| entry.value.clone())
    }

    /// Return the cached value for `key` if it is younger than `ttl`,
    /// otherwise run `compute` (or join the run already in progress).
    pub async fn with_cache<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.fresh(key, ttl) {
            debug!("cache hit: {key}");
            return downcast(key, value);
        }

        let mut start = None;
        let shared = match self.inner.inflight.entry(key.to_string()) {
            Entry::Occupied(e) => {
                debug!("cache join: {key}");
                e.get().fut.clone()
            }
            Entry::Vacant(e) => {
                // Another caller may have stored a result since the first look.
                if let Some(value) = self.fresh(key, ttl) {
                    drop(e);
                    debug!("cache hit: {key}");
                    return downcast(key, value);
                }
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel::<Result<AnyValue>>();
                let fut: SharedResult = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(Error::Other("in-flight computation dropped".into()))
                    })
                }
                .boxed()
                .shared();
                e.insert(InFlight {
                    id,
                    fut: fut.clone(),
                    invalidated: false,
                });
                start = Some((id, tx));
                fut
            }
        };

        if let Some((id, tx)) = start {
            debug!("cache miss: {key}");
            self.spawn_compute(key.to_string(), id, tx, compute());
        }

        let value = shared.await?;
        downcast(key, value)
    }

    fn spawn_compute<T, Fut>(
        &self,
        key: String,
        id: u64,
        tx: oneshot::Sender<Result<AnyValue>>,
        fut: Fut,
    ) where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let guard = InFlightGuard {
                inner: inner.clone(),
                key: key.clone(),
                id,
            };
            let result = fut.await.map(|v| Arc::new(v) as AnyValue);

            match result {
                Ok(ref value) => {
                    // The registration stays read-locked until the insert is
                    // done, so `invalidate` either flags it before the check
                    // or clears the stored entry afterwards.
                    if let Some(flight) = inner.inflight.get(&key) {
                        if flight.id == id && !flight.invalidated {
                            inner.entries.insert(
                                key.clone(),
                                CacheEntry {
                                    stored_at_ms: inner.clock.epoch_ms(),
                                    value: value.clone(),
                                },
                            );
                        }
                    }
                }
                Err(ref e) => debug!("cache compute failed for {key}: {e}"),
            }

            drop(guard);
            let _ = tx.send(result);
        });
    }

    /// Drop cached entries: all of them, or those whose key starts with
    /// `prefix`. Matching in-flight computations keep running and callers
    /// arriving meanwhile still join them, but their result is not stored.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, prefix: Option<&str>) -> usize {
        let matches = |k: &str| prefix.map_or(true, |p| k.starts_with(p));

        // Flag before clearing: a store that got in ahead of the flag is
        // removed by the retain below.
        let mut flagged = 0;
        for mut flight in self.inner.inflight.iter_mut() {
            if !flight.invalidated && matches(flight.key().as_str()) {
                flight.invalidated = true;
                flagged += 1;
            }
        }

        let mut removed = 0;
        self.inner.entries.retain(|k, _| {
            let drop_it = matches(k.as_str());
            if drop_it {
                removed += 1;
            }
            !drop_it
        });
        debug!(
            "cache invalidate {:?}: {removed} entries, {flagged} in flight",
            prefix.unwrap_or("*")
        );
        removed
    }

    /// Stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.inflight.len()
    }
}

fn downcast<T: Clone + Send + Sync + 'static>(key: &str, value: AnyValue) -> Result<T> {
    value
        .downcast::<T>()
        .map(|v| (*v).clone())
        .map_err(|_| Error::Other(format!("cached value for {key} has a different type")))
}
