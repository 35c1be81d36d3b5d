use crate::domain::errors::ValuationError;
use crate::domain::features::Fingerprint;
use crate::domain::valuation::EnsembleResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Outcome published to waiters attached to an in-flight computation.
/// `None` until the computing task finishes.
type ComputeOutcome = Option<Result<EnsembleResult, String>>;

enum Lookup {
    Hit(EnsembleResult),
    Join(watch::Receiver<ComputeOutcome>),
    Reserved(watch::Sender<ComputeOutcome>),
}

enum Slot {
    /// Reserved: a computation for this fingerprint is in flight. Waiters
    /// subscribe to the channel instead of starting duplicate work.
    Pending(watch::Receiver<ComputeOutcome>),
    Ready {
        result: EnsembleResult,
        expires_at: Instant,
        last_used: Instant,
    },
}

/// Releases a still-pending slot if the computing task unwinds without
/// publishing. Without this, a panicking computation would leave the
/// `Pending` entry in place and block every later request for the
/// fingerprint.
struct PendingGuard {
    cache: Arc<ResultCache>,
    key: String,
    armed: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.cache.lock_entries();
        if matches!(entries.get(&self.key), Some(Slot::Pending(_))) {
            warn!(
                "Computation for fingerprint {} aborted before publishing, releasing slot",
                self.key
            );
            entries.remove(&self.key);
        }
    }
}

/// Fingerprint-keyed store with at-most-one-computation-in-flight semantics
/// and time-based expiry.
///
/// The mutex guards only the reserve/publish transitions on the map; the
/// (much longer) ensemble computation runs outside any critical section, on
/// a detached task so a waiter's cancellation never cancels the computation
/// itself.
pub struct ResultCache {
    entries: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a ready, unexpired result is stored for the fingerprint.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        let entries = self.lock_entries();
        matches!(
            entries.get(fingerprint.as_str()),
            Some(Slot::Ready { expires_at, .. }) if *expires_at > Instant::now()
        )
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ResultCache: lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Return the cached result for the fingerprint, or run `compute` to
    /// populate it. The boolean is true when the caller was served without
    /// triggering the computation (stored entry or in-flight join).
    ///
    /// The first caller for a fingerprint reserves the slot and the
    /// computation's own error type propagates to it; concurrent callers
    /// attach to the in-flight attempt and observe `CacheComputeFailed` if
    /// it fails. A failed attempt releases the slot so a later request can
    /// retry; failures are never stored.
    pub async fn get_or_compute<F>(
        self: &Arc<Self>,
        fingerprint: &Fingerprint,
        compute: F,
    ) -> Result<(EnsembleResult, bool), ValuationError>
    where
        F: Future<Output = Result<EnsembleResult, ValuationError>> + Send + 'static,
    {
        let key = fingerprint.as_str().to_string();

        // Lookup and reservation are one critical section: two racing misses
        // must never both reserve the slot.
        let lookup = {
            let mut entries = self.lock_entries();
            let now = Instant::now();
            if matches!(
                entries.get(&key),
                Some(Slot::Ready { expires_at, .. }) if *expires_at <= now
            ) {
                // Expired entry reads as a miss.
                entries.remove(&key);
            }

            let found = match entries.get_mut(&key) {
                Some(Slot::Ready {
                    result, last_used, ..
                }) => {
                    *last_used = now;
                    Some(Lookup::Hit(result.clone()))
                }
                Some(Slot::Pending(rx)) => Some(Lookup::Join(rx.clone())),
                None => None,
            };
            match found {
                Some(lookup) => lookup,
                None => {
                    let (tx, rx) = watch::channel(None);
                    entries.insert(key.clone(), Slot::Pending(rx));
                    Lookup::Reserved(tx)
                }
            }
        };

        let tx = match lookup {
            Lookup::Hit(result) => {
                debug!("Cache hit for fingerprint {}", key);
                return Ok((result, true));
            }
            Lookup::Join(rx) => {
                debug!("Joining in-flight computation for fingerprint {}", key);
                return Self::wait_for_outcome(rx).await.map(|result| (result, true));
            }
            Lookup::Reserved(tx) => tx,
        };

        // Miss: the slot is reserved, run the computation on a detached
        // task. Waiters that arrive meanwhile subscribe to the channel;
        // cancelling this caller does not cancel the computation.

        let cache = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut guard = PendingGuard {
                cache: Arc::clone(&cache),
                key: task_key.clone(),
                armed: true,
            };
            let outcome = compute.await;
            {
                let mut entries = cache.lock_entries();
                match &outcome {
                    Ok(result) => {
                        entries.insert(
                            task_key.clone(),
                            Slot::Ready {
                                result: result.clone(),
                                expires_at: Instant::now() + cache.ttl,
                                last_used: Instant::now(),
                            },
                        );
                        cache.evict_over_capacity(&mut entries);
                    }
                    Err(e) => {
                        // Release the slot so a subsequent request may retry.
                        entries.remove(&task_key);
                        warn!("Computation failed for fingerprint {}: {}", task_key, e);
                    }
                }
            }
            guard.armed = false;
            let _ = tx.send(Some(
                outcome.as_ref().map(Clone::clone).map_err(|e| e.to_string()),
            ));
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome.map(|result| (result, false)),
            Err(join_err) => Err(ValuationError::CacheComputeFailed {
                detail: format!("computation task failed: {}", join_err),
            }),
        }
    }

    async fn wait_for_outcome(
        mut rx: watch::Receiver<ComputeOutcome>,
    ) -> Result<EnsembleResult, ValuationError> {
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome.map_err(|detail| ValuationError::CacheComputeFailed { detail });
            }
            if rx.changed().await.is_err() {
                return Err(ValuationError::CacheComputeFailed {
                    detail: "in-flight computation dropped before publishing".to_string(),
                });
            }
        }
    }

    /// Drop least-recently-used ready entries above capacity. Pending slots
    /// are never evicted: eviction must not interrupt an in-flight
    /// computation.
    fn evict_over_capacity(&self, entries: &mut HashMap<String, Slot>) {
        while entries.len() > self.max_entries {
            let lru_key = entries
                .iter()
                .filter_map(|(k, slot)| match slot {
                    Slot::Ready { last_used, .. } => Some((k.clone(), *last_used)),
                    Slot::Pending(_) => None,
                })
                .min_by_key(|(_, last_used)| *last_used)
                .map(|(k, _)| k);

            match lru_key {
                Some(k) => {
                    debug!("Evicting least-recently-used cache entry {}", k);
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result(value: f64) -> EnsembleResult {
        EnsembleResult {
            point_estimate: value,
            lower_bound: value * 0.95,
            upper_bound: value * 1.05,
            confidence_level: 95.0,
            model_agreement: 0.97,
            models_used: 3,
            model_version: "v1".to_string(),
            computed_at: Utc::now(),
        }
    }

    fn fingerprint(tag: &str) -> Fingerprint {
        use crate::domain::property::{PropertyAttributes, PropertyType};
        let attrs = PropertyAttributes {
            property_type: PropertyType::Office,
            city: "Seattle".to_string(),
            square_feet: 15000.0,
            num_floors: 3.0,
            num_units: 12.0,
            parking_spots: 40.0,
            occupancy_rate: 0.92,
            annual_revenue: 525_000.0,
            annual_expenses: 157_500.0,
            net_operating_income: 367_500.0,
            cap_rate: 0.06,
            walk_score: 78.0,
            transit_score: 65.0,
            building_age: 12.0,
            distance_to_downtown: 2.5,
        };
        crate::domain::features::build(&attrs, tag).unwrap().1
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k1");
        let calls = Arc::new(AtomicUsize::new(0));

        for expect_cached in [false, true] {
            let calls = Arc::clone(&calls);
            let (res, cached) = cache
                .get_or_compute(&fp, async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(result(1_000_000.0))
                })
                .await
                .unwrap();
            assert_eq!(cached, expect_cached);
            assert_eq!(res.point_estimate, 1_000_000.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k2");
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let fp = fp.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(result(2_500_000.0))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            let (res, _) = handle.await.unwrap();
            values.push(res.point_estimate);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| *v == 2_500_000.0));
    }

    #[tokio::test]
    async fn test_failure_releases_slot_for_retry() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k3");

        let err = cache
            .get_or_compute(&fp, async {
                Err(ValuationError::EnsembleUnavailable {
                    attempted: 3,
                    detail: "all failed".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ValuationError::EnsembleUnavailable { .. }));
        assert!(!cache.contains(&fp));

        // A subsequent request may retry and populate the slot.
        let (res, cached) = cache
            .get_or_compute(&fp, async { Ok(result(900_000.0)) })
            .await
            .unwrap();
        assert!(!cached);
        assert_eq!(res.point_estimate, 900_000.0);
        assert!(cache.contains(&fp));
    }

    #[tokio::test]
    async fn test_waiters_observe_in_flight_failure() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k4");

        let leader = {
            let cache = Arc::clone(&cache);
            let fp = fp.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(&fp, async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(ValuationError::EnsembleUnavailable {
                            attempted: 2,
                            detail: "artifacts corrupt".to_string(),
                        })
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        let joiner_err = cache
            .get_or_compute(&fp, async { Ok(result(1.0)) })
            .await
            .unwrap_err();

        // The triggering caller keeps the precise error; attached waiters
        // observe the propagated cache failure.
        assert!(matches!(
            leader.await.unwrap().unwrap_err(),
            ValuationError::EnsembleUnavailable { .. }
        ));
        assert!(matches!(
            joiner_err,
            ValuationError::CacheComputeFailed { .. }
        ));
    }

    async fn panicking_compute(msg: &'static str) -> Result<EnsembleResult, ValuationError> {
        panic!("{}", msg)
    }

    #[tokio::test]
    async fn test_panicked_computation_releases_slot() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k6");

        let err = cache
            .get_or_compute(&fp, panicking_compute("artifact corrupted mid-read"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValuationError::CacheComputeFailed { .. }));

        // The fingerprint is not blocked: a later request reserves the slot
        // again and computes normally.
        let (res, cached) = cache
            .get_or_compute(&fp, async { Ok(result(750_000.0)) })
            .await
            .unwrap();
        assert!(!cached);
        assert_eq!(res.point_estimate, 750_000.0);
        assert!(cache.contains(&fp));
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_cancel_computation() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 100));
        let fp = fingerprint("k7");
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let fp = fp.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(result(3_100_000.0))
                    })
                    .await
            })
        };

        // Abort the caller mid-flight; the detached computation keeps going
        // and still populates the slot.
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let (res, cached) = cache
            .get_or_compute(&fp, panicking_compute("must be served from the stored entry"))
            .await
            .unwrap();
        assert!(cached);
        assert_eq!(res.point_estimate, 3_100_000.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let cache = Arc::new(ResultCache::new(Duration::from_millis(40), 100));
        let fp = fingerprint("k5");

        let (_, cached) = cache
            .get_or_compute(&fp, async { Ok(result(1_000_000.0)) })
            .await
            .unwrap();
        assert!(!cached);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(!cache.contains(&fp));

        let (_, cached) = cache
            .get_or_compute(&fp, async { Ok(result(1_000_000.0)) })
            .await
            .unwrap();
        assert!(!cached);
    }

    #[tokio::test]
    async fn test_lru_eviction_above_capacity() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 2));

        for (i, tag) in ["e1", "e2", "e3"].iter().enumerate() {
            let fp = fingerprint(tag);
            cache
                .get_or_compute(&fp, async move { Ok(result(1000.0 * (i + 1) as f64)) })
                .await
                .unwrap();
            // Keep insertion order distinguishable for the LRU scan.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&fingerprint("e1")));
        assert!(cache.contains(&fingerprint("e3")));
    }

    #[tokio::test]
    async fn test_eviction_never_removes_pending_slot() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), 2));
        let slow_fp = fingerprint("p1");
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let fp = slow_fp.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&fp, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        Ok(result(5_000_000.0))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Push the map past capacity while the slow computation is still
        // pending; only ready entries are eviction candidates.
        for tag in ["p2", "p3"] {
            cache
                .get_or_compute(&fingerprint(tag), async { Ok(result(1000.0)) })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Pending slot plus the most recent ready entry survived the sweep.
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&fingerprint("p3")));

        let (res, cached) = leader.await.unwrap().unwrap();
        assert!(!cached);
        assert_eq!(res.point_estimate, 5_000_000.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&slow_fp));
    }
}
