//! Prepared-transaction request buffer.
//!
//! Hand-off point between the two phases of a contract submission:
//!
//! 1. prepare handler calls `put()` and returns the `RequestId` to the client
//! 2. client signs and calls submit with that id
//! 3. submit handler calls `take()`, which removes the entry atomically
//!
//! A given id is consumed at most once: the removal from the map is the
//! linearization point, so of any number of racing `take()` calls exactly
//! one gets the payload. Entries past their TTL are never returned, whether
//! or not the sweeper has removed them yet.

use crate::domain::config::BufferConfig;
use crate::domain::prepared::PreparedRequest;
use crate::domain::request_id::RequestId;
use crate::ports::{Clock, SystemClock};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Attempts at drawing a fresh identifier before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Buffer failures. All are reported to the client; `Full` and
/// `IdSpaceExhausted` are transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A live entry already holds the identifier
    #[error("request {0} is already prepared")]
    Conflict(RequestId),

    /// Capacity reached
    #[error("request buffer is full ({capacity} entries)")]
    Full { capacity: usize },

    /// No free identifier could be drawn
    #[error("no free request identifier")]
    IdSpaceExhausted,

    /// Multi-request with no payloads
    #[error("empty batch")]
    EmptyBatch,
}

/// Statistics for the request buffer
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Entries stored
    pub total_stored: AtomicU64,
    /// Entries consumed by a submit
    pub total_consumed: AtomicU64,
    /// Entries that expired (found expired on access or swept)
    pub total_expired: AtomicU64,
    /// Puts refused because the id was live
    pub total_conflicts: AtomicU64,
    /// Full scans run by a put on a full buffer
    pub total_reclaims: AtomicU64,
}

/// Concurrency-safe expiring map from request id to prepared payload.
pub struct RequestBuffer<T> {
    entries: DashMap<RequestId, PreparedRequest<T>>,
    ttl: Duration,
    max_entries: usize,
    /// Min spacing of the scans a full buffer runs on `put`
    reclaim_interval: Duration,
    last_reclaim: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
    stats: Arc<BufferStats>,
}

impl<T> RequestBuffer<T> {
    /// Create a buffer on the system clock with no capacity bound.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, usize::MAX, Arc::new(SystemClock))
    }

    /// Create a buffer on `clock`. A full buffer rescans for expired
    /// entries at most once per `ttl`.
    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            reclaim_interval: ttl,
            last_reclaim: Mutex::new(None),
            clock,
            stats: Arc::new(BufferStats::default()),
        }
    }

    pub fn from_config(config: &BufferConfig, clock: Arc<dyn Clock>) -> Self {
        let mut buffer = Self::with_clock(config.ttl, config.max_entries, clock);
        buffer.reclaim_interval = config.sweep_interval;
        buffer
    }

    /// Store `payload` under a fresh identifier.
    pub fn put(&self, payload: T) -> Result<RequestId, BufferError> {
        let mut payload = payload;
        for _ in 0..MAX_ID_ATTEMPTS {
            let request_id = RequestId::new();
            match self.insert(request_id, payload) {
                Ok(()) => return Ok(request_id),
                Err((BufferError::Conflict(_), returned)) => payload = returned,
                Err((e, _)) => return Err(e),
            }
        }
        Err(BufferError::IdSpaceExhausted)
    }

    /// Store `payload` under a caller chosen identifier.
    ///
    /// Fails with `Conflict` while a live entry holds the id; an expired
    /// entry is replaced.
    pub fn put_with_id(&self, request_id: RequestId, payload: T) -> Result<(), BufferError> {
        self.insert(request_id, payload).map_err(|(e, _)| e)
    }

    fn insert(&self, request_id: RequestId, payload: T) -> Result<(), (BufferError, T)> {
        if self.entries.len() >= self.max_entries {
            self.reclaim();
            // Soft bound: racing writers may overshoot by their own count.
            if self.entries.len() >= self.max_entries {
                warn!(capacity = self.max_entries, "Request buffer full");
                return Err((
                    BufferError::Full {
                        capacity: self.max_entries,
                    },
                    payload,
                ));
            }
        }

        let now = self.clock.now();
        match self.entries.entry(request_id) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    self.stats.total_conflicts.fetch_add(1, Ordering::Relaxed);
                    warn!(request_id = %request_id, "Request id already prepared");
                    return Err((BufferError::Conflict(request_id), payload));
                }
                occupied.insert(PreparedRequest::new(request_id, payload, now, self.ttl));
                self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(PreparedRequest::new(request_id, payload, now, self.ttl));
            }
        }

        self.stats.total_stored.fetch_add(1, Ordering::Relaxed);
        debug!(
            request_id = %request_id,
            ttl_ms = self.ttl.as_millis(),
            "Stored prepared request"
        );
        Ok(())
    }

    /// Scan for expired entries unless a scan ran within `reclaim_interval`
    /// or another writer is deciding right now.
    fn reclaim(&self) {
        let now = self.clock.now();
        {
            let Some(mut last) = self.last_reclaim.try_lock() else {
                return;
            };
            if matches!(*last, Some(at) if now.duration_since(at) < self.reclaim_interval) {
                return;
            }
            *last = Some(now);
        }

        self.stats.total_reclaims.fetch_add(1, Ordering::Relaxed);
        let removed = self.remove_expired();
        debug!(removed = removed, "Full buffer reclaimed expired entries");
    }

    /// Consume the entry for `request_id`.
    ///
    /// Returns `None` if the id is unknown, already consumed or expired.
    pub fn take(&self, request_id: &RequestId) -> Option<T> {
        let (_, entry) = self.entries.remove(request_id)?;
        let now = self.clock.now();

        if entry.is_expired(now) {
            self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %request_id,
                age_ms = now.duration_since(entry.created_at).as_millis(),
                "Prepared request expired before submit"
            );
            return None;
        }

        self.stats.total_consumed.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %request_id, "Consumed prepared request");
        Some(entry.payload)
    }

    /// Consume the entry only if `accept` approves its payload.
    ///
    /// The check and the removal happen under the same shard lock, so a
    /// rejected entry stays available for a corrected submit. An expired
    /// entry is removed without consulting `accept`.
    pub fn take_if<F>(&self, request_id: &RequestId, accept: F) -> Option<T>
    where
        F: FnOnce(&T) -> bool,
    {
        let now = self.clock.now();
        let (_, entry) = self
            .entries
            .remove_if(request_id, |_, entry| entry.is_expired(now) || accept(&entry.payload))?;

        if entry.is_expired(now) {
            self.stats.total_expired.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = %request_id, "Prepared request expired before submit");
            return None;
        }

        self.stats.total_consumed.fetch_add(1, Ordering::Relaxed);
        debug!(request_id = %request_id, "Consumed prepared request");
        Some(entry.payload)
    }

    /// True if a live entry holds `request_id`
    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        let now = self.clock.now();
        self.entries
            .get(request_id)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    /// Drop expired entries. Returns the number removed.
    pub fn remove_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.stats
                .total_expired
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Entries physically held, expired-but-unswept included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }
}

/// Buffer for batches: one identifier, an ordered list of payloads, consumed
/// all at once.
pub struct MultiRequestBuffer<T> {
    inner: RequestBuffer<Vec<T>>,
}

impl<T> MultiRequestBuffer<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RequestBuffer::new(ttl),
        }
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RequestBuffer::with_clock(ttl, max_entries, clock),
        }
    }

    pub fn from_config(config: &BufferConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RequestBuffer::from_config(config, clock),
        }
    }

    pub fn put_multi(&self, payloads: Vec<T>) -> Result<RequestId, BufferError> {
        if payloads.is_empty() {
            return Err(BufferError::EmptyBatch);
        }
        self.inner.put(payloads)
    }

    pub fn take_multi(&self, request_id: &RequestId) -> Option<Vec<T>> {
        self.inner.take(request_id)
    }

    pub fn take_multi_if<F>(&self, request_id: &RequestId, accept: F) -> Option<Vec<T>>
    where
        F: FnOnce(&[T]) -> bool,
    {
        self.inner.take_if(request_id, |batch| accept(batch.as_slice()))
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.inner.is_pending(request_id)
    }

    pub fn remove_expired(&self) -> usize {
        self.inner.remove_expired()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    pub fn stats(&self) -> &BufferStats {
        self.inner.stats()
    }
}

/// Anything the sweeper can clean.
pub trait Sweepable: Send + Sync {
    fn remove_expired(&self) -> usize;
}

impl<T: Send + Sync> Sweepable for RequestBuffer<T> {
    fn remove_expired(&self) -> usize {
        RequestBuffer::remove_expired(self)
    }
}

impl<T: Send + Sync> Sweepable for MultiRequestBuffer<T> {
    fn remove_expired(&self) -> usize {
        MultiRequestBuffer::remove_expired(self)
    }
}

/// Background task to clean up expired requests
pub async fn sweep_task(buffer: Arc<dyn Sweepable>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let removed = buffer.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Swept expired prepared requests");
        }
    }
}
