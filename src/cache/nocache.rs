use crate::cache::{CacheEntry, CacheKey, CacheStore};

use crate::Result;

/// Store that never keeps anything. Every lookup is a miss, so every request
/// goes to the network.
pub struct NoCache;

impl CacheStore for NoCache {
    fn get_variants(&self, _primary: &str) -> Result<Vec<(CacheKey, CacheEntry)>> {
        Ok(Vec::new())
    }
    fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(None)
    }
    fn set(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<()> {
        Ok(())
    }
    fn remove(&self, _key: &CacheKey) -> Result<()> {
        Ok(())
    }
    fn remove_range(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }
    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
