use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use im::OrdMap;

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::log_debug;

use crate::Result;

type Entries = OrdMap<CacheKey, CacheEntry>;

/// Lock-free in-process store. Holds a single reference to a persistent
/// ordered map. Readers load the current version and never block. Writers
/// derive a new version from the one they read and publish it with a
/// compare-and-swap, starting over against the latest version if another
/// writer got there first.
pub struct InMemoryCache {
    entries: ArcSwap<Entries>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(OrdMap::new()),
        }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Apply `op` until the new version is published. `op` returns `None`
    /// when there is nothing to change, in which case nothing is published.
    fn update<F>(&self, op: F)
    where
        F: Fn(&Entries) -> Option<Entries>,
    {
        let mut current = self.entries.load_full();
        loop {
            let Some(next) = op(&*current) else {
                return;
            };
            let previous = self.entries.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return;
            }
            // Another writer published first. Retry on its version so its
            // change is not lost.
            log_debug!("Cache store contention, retrying update");
            current = Guard::into_inner(previous);
        }
    }
}

impl CacheStore for InMemoryCache {
    fn get_variants(&self, primary: &str) -> Result<Vec<(CacheKey, CacheEntry)>> {
        let start = CacheKey::primary(primary);
        let entries = self.entries.load();
        let variants = entries
            .range(start.clone()..)
            .take_while(|(key, _)| key.primary == start.primary)
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        Ok(variants)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        self.update(|entries| Some(entries.update(key.clone(), entry.clone())));
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<()> {
        self.update(|entries| {
            if entries.contains_key(key) {
                Some(entries.without(key))
            } else {
                None
            }
        });
        Ok(())
    }

    fn remove_range(&self, prefix: &str) -> Result<()> {
        let start = CacheKey::primary(prefix);
        self.update(|entries| {
            let doomed = entries
                .range(start.clone()..)
                .take_while(|(key, _)| key.primary.starts_with(&start.primary))
                .map(|(key, _)| key.clone())
                .collect::<Vec<CacheKey>>();
            if doomed.is_empty() {
                return None;
            }
            Some(
                doomed
                    .iter()
                    .fold(entries.clone(), |entries, key| entries.without(key)),
            )
        });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.store(Arc::new(OrdMap::new()));
        Ok(())
    }
}
