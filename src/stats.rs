use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of the decisions taken by the cache handler.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Served from cache without contacting the server.
    pub hits: AtomicU64,
    /// Nothing usable stored, or the request bypassed the cache.
    pub misses: AtomicU64,
    /// Conditional requests sent to confirm a stored response.
    pub revalidations: AtomicU64,
    /// Revalidations the server answered with 304 Not Modified.
    pub not_modified: AtomicU64,
    /// Responses written to the store.
    pub stores: AtomicU64,
    /// Successful responses not admitted to the store.
    pub skipped: AtomicU64,
    /// PUT/PATCH invalidations of related representations.
    pub invalidations: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub revalidations: u64,
    pub not_modified: u64,
    pub stores: u64,
    pub skipped: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Ratio of lookups served from cache, 0.0 to 1.0. 304s count as hits
    /// since no body was transferred.
    pub fn hit_rate(&self) -> f64 {
        let snapshot = self.snapshot();
        let hits = snapshot.hits + snapshot.not_modified;
        let total = snapshot.hits + snapshot.misses + snapshot.revalidations;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.revalidations,
            &self.not_modified,
            &self.stores,
            &self.skipped,
            &self.invalidations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Display for StatsSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} revalidations={} not_modified={} stores={} skipped={} invalidations={}",
            self.hits,
            self.misses,
            self.revalidations,
            self.not_modified,
            self.stores,
            self.skipped,
            self.invalidations
        )
    }
}
