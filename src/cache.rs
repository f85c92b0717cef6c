// src/cache.rs
//! Fingerprint-keyed explanation cache with absolute TTL.
//!
//! Each fingerprint owns an async slot. A caller holds the slot lock across the
//! generation call, so concurrent requests for the same fingerprint wait for the
//! first one instead of generating again; different fingerprints never contend
//! beyond the brief map lookup. Streamed generations hold the lock through a
//! [`SlotLease`] until the stream is finished or dropped.

use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::metrics::ensure_metrics_described;
use crate::payload::{ExplanationPayload, ExplanationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: ExplanationPayload,
    pub created_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// Exclusive hold on an empty (or expired) slot. Dropping it without
/// [`SlotLease::fill`] leaves the slot empty and wakes the next waiter.
pub struct SlotLease {
    fingerprint: Fingerprint,
    guard: OwnedMutexGuard<Option<CacheEntry>>,
}

impl SlotLease {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn fill(mut self, payload: ExplanationPayload) {
        *self.guard = Some(CacheEntry {
            payload,
            created_at: Instant::now(),
        });
        debug!(target: "explain", fingerprint = %self.fingerprint.short(), "slot filled");
    }
}

pub enum Reservation {
    Fresh(ExplanationPayload),
    Vacant(SlotLease),
}

pub struct ExplanationCache {
    ttl: Duration,
    slots: Mutex<HashMap<Fingerprint, Slot>>,
}

impl ExplanationCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        ensure_metrics_described();
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Fingerprint, Slot>> {
        match self.slots.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn slot(&self, fp: Fingerprint) -> Slot {
        self.map().entry(fp).or_default().clone()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        Instant::now().saturating_duration_since(entry.created_at) <= self.ttl
    }

    /// Cached payload for `request`, or the result of `generator_fn` (called at most once).
    pub async fn get_or_create<F, Fut>(
        &self,
        request: &ExplanationRequest,
        generator_fn: F,
    ) -> ExplanationPayload
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExplanationPayload>,
    {
        self.get_or_create_with_status(request, generator_fn).await.0
    }

    pub async fn get_or_create_with_status<F, Fut>(
        &self,
        request: &ExplanationRequest,
        generator_fn: F,
    ) -> (ExplanationPayload, CacheStatus)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExplanationPayload>,
    {
        let fp = request.fingerprint();
        let slot = self.slot(fp);
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref() {
            if self.is_fresh(entry) {
                counter!("explain_cache_hits_total").increment(1);
                return (entry.payload.clone(), CacheStatus::Hit);
            }
            debug!(target: "explain", fingerprint = %fp.short(), "cache entry expired");
        }

        counter!("explain_cache_misses_total").increment(1);
        let payload = generator_fn().await;
        *guard = Some(CacheEntry {
            payload: payload.clone(),
            created_at: Instant::now(),
        });
        (payload, CacheStatus::Miss)
    }

    /// Fresh payload for `fp`, if any. Waits for an in-flight generation on the same slot.
    pub async fn peek(&self, fp: Fingerprint) -> Option<ExplanationPayload> {
        let slot = self.map().get(&fp).cloned()?;
        let guard = slot.lock().await;
        guard
            .as_ref()
            .filter(|e| self.is_fresh(e))
            .map(|e| e.payload.clone())
    }

    /// Fresh payload for `fp`, or a lease on its slot. Waits while another caller
    /// holds the slot, so at most one generation per fingerprint is in flight.
    pub async fn reserve(&self, fp: Fingerprint) -> Reservation {
        let guard = self.slot(fp).lock_owned().await;
        if let Some(entry) = guard.as_ref() {
            if self.is_fresh(entry) {
                counter!("explain_cache_hits_total").increment(1);
                return Reservation::Fresh(entry.payload.clone());
            }
            debug!(target: "explain", fingerprint = %fp.short(), "cache entry expired");
        }
        counter!("explain_cache_misses_total").increment(1);
        Reservation::Vacant(SlotLease {
            fingerprint: fp,
            guard,
        })
    }

    /// Drop expired entries and empty slots nobody is waiting on. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.as_ref().is_some_and(|e| self.is_fresh(e)),
                Err(_) => true,
            }
        });
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Periodically purge expired entries. Stops once the cache is dropped.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(target: "explain", removed, "cache janitor purged entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(text: &str) -> ExplanationRequest {
        ExplanationRequest::new(None, text, None)
    }

    fn reply(s: &str) -> ExplanationPayload {
        ExplanationPayload::Conversational { reply: s.into() }
    }

    #[tokio::test]
    async fn second_call_is_a_hit() {
        let cache = ExplanationCache::with_ttl(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let req = request("안녕");

        let (a, s1) = cache
            .get_or_create_with_status(&req, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                reply("first")
            })
            .await;
        let (b, s2) = cache
            .get_or_create_with_status(&req, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                reply("second")
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((s1, s2), (CacheStatus::Miss, CacheStatus::Hit));
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let cache = ExplanationCache::with_ttl(Duration::from_secs(10));
        cache.get_or_create(&request("a"), || async { reply("a") }).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.get_or_create(&request("b"), || async { reply("b") }).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(request("b").fingerprint()).await.is_some());
    }

    #[tokio::test]
    async fn lease_fill_then_reserve_is_fresh() {
        let cache = ExplanationCache::with_ttl(Duration::from_secs(60));
        let fp = request("stream").fingerprint();
        assert!(cache.peek(fp).await.is_none());
        let Reservation::Vacant(lease) = cache.reserve(fp).await else {
            panic!("empty slot must be vacant");
        };
        lease.fill(reply("streamed"));
        assert_eq!(cache.peek(fp).await, Some(reply("streamed")));
        assert!(matches!(cache.reserve(fp).await, Reservation::Fresh(p) if p == reply("streamed")));
    }

    #[tokio::test]
    async fn dropped_lease_leaves_slot_empty() {
        let cache = ExplanationCache::with_ttl(Duration::from_secs(60));
        let fp = request("abandoned").fingerprint();
        let lease = cache.reserve(fp).await;
        drop(lease);
        assert!(matches!(cache.reserve(fp).await, Reservation::Vacant(_)));
    }
}
