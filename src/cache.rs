use crate::http::Headers;
use crate::io::HttpResponse;
use std::sync::Arc;

pub mod inmemory;
pub mod nocache;

use crate::Result;
pub use inmemory::InMemoryCache;
pub use nocache::NoCache;

/// Identity of one cached representation. The primary key identifies the
/// resource, the secondary key the representation selected by the request
/// headers the response varies on. Keys order by primary key first, so all
/// the variants of a resource, and all the resources sharing a prefix, are
/// contiguous.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub primary: String,
    pub secondary: String,
}

impl CacheKey {
    pub fn new(primary: &str, secondary: &str) -> Self {
        CacheKey {
            primary: primary.to_lowercase(),
            secondary: secondary.to_string(),
        }
    }

    pub fn primary(primary: &str) -> Self {
        CacheKey::new(primary, "")
    }
}

/// Normalized resource identity of a request target.
pub fn primary_key(url: &str) -> String {
    url.to_lowercase()
}

/// Build the secondary key out of the request headers named in a Vary
/// declaration. Empty when the response does not vary.
pub fn secondary_key(vary: &[String], headers: &Headers) -> String {
    let mut names = vary
        .iter()
        .map(|name| name.to_lowercase())
        .filter(|name| name != "*")
        .collect::<Vec<String>>();
    names.sort();
    names.dedup();
    names
        .iter()
        .map(|name| {
            let value = headers.get(name).map(|v| v.as_str()).unwrap_or("");
            format!("{}:{}", name, value)
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// One stored representation: the response and the header names its
/// selection depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub response: HttpResponse,
    pub vary: Vec<String>,
}

impl CacheEntry {
    pub fn new(response: HttpResponse) -> Self {
        let vary = response.vary();
        CacheEntry { response, vary }
    }

    pub fn key_for(&self, primary: &str, headers: &Headers) -> CacheKey {
        CacheKey::new(primary, &secondary_key(&self.vary, headers))
    }
}

/// Storage backend for cached representations. Implementations must be safe
/// to share across threads: every operation is individually atomic and none
/// of them spans another.
pub trait CacheStore: Send + Sync {
    /// All the variants stored for a primary key, with their full keys.
    fn get_variants(&self, primary: &str) -> Result<Vec<(CacheKey, CacheEntry)>>;
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    /// Insert or overwrite.
    fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<()>;
    fn remove(&self, key: &CacheKey) -> Result<()>;
    /// Remove every entry whose primary key starts with `prefix`.
    fn remove_range(&self, prefix: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get_variants(&self, primary: &str) -> Result<Vec<(CacheKey, CacheEntry)>> {
        self.as_ref().get_variants(primary)
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        self.as_ref().set(key, entry)
    }

    fn remove(&self, key: &CacheKey) -> Result<()> {
        self.as_ref().remove(key)
    }

    fn remove_range(&self, prefix: &str) -> Result<()> {
        self.as_ref().remove_range(prefix)
    }

    fn clear(&self) -> Result<()> {
        self.as_ref().clear()
    }
}

/// Outcome of looking a request up in the cache.
pub enum CacheState {
    /// Can be handed out as is.
    Fresh(CacheKey, CacheEntry),
    /// Needs a round trip to the server to confirm it.
    Stale(CacheKey, CacheEntry),
    None,
}
