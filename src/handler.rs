//! Caching decorator over an HTTP transport.
//!
//! GET requests are answered from the cache store when the stored response is
//! fresh, revalidated with the server when it is not, and stored when the
//! network response is admissible. PUT and PATCH requests are made
//! conditional on the cached validators and purge the cached variants of the
//! resource once they succeed. Everything else goes straight to the
//! transport.

use crate::api_defaults::{NOT_MODIFIED, QUERY_SEPARATOR};
use crate::cache::{primary_key, CacheEntry, CacheKey, CacheState, CacheStore};
use crate::config::HandlerSettings;
use crate::http::{Headers, Method, Request, RequestInfo};
use crate::io::{
    HttpResponse, HttpRunner, CACHE_CONTROL, DATE, ETAG, EXPIRES, IF_MATCH, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, IF_UNMODIFIED_SINCE, LAST_MODIFIED, VARY,
};
use crate::policy;
use crate::{log_debug, log_warn};
use crate::stats::CacheStats;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

// Headers a 304 carries that supersede the stored ones.
const REFRESHED_HEADERS: [&str; 6] = [DATE, CACHE_CONTROL, EXPIRES, ETAG, LAST_MODIFIED, VARY];

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct HttpCacheHandler<S, R, D> {
    store: S,
    runner: R,
    settings: D,
    /// Source of the current time for freshness computations.
    #[builder(default = "crate::time::now")]
    clock: fn() -> DateTime<Utc>,
    #[builder(setter(skip))]
    stats: CacheStats,
}

impl<S, R, D> HttpCacheHandler<S, R, D> {
    pub fn builder() -> HttpCacheHandlerBuilder<S, R, D> {
        HttpCacheHandlerBuilder::default()
    }

    pub fn new(store: S, runner: R, settings: D) -> Self {
        HttpCacheHandler {
            store,
            runner,
            settings,
            clock: crate::time::now,
            stats: CacheStats::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<S, R, D> HttpCacheHandler<S, R, D>
where
    S: CacheStore,
    R: HttpRunner<Response = HttpResponse>,
    D: HandlerSettings,
{
    fn get<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<HttpResponse> {
        let primary = primary_key(cmd.url());
        let no_store = policy::request_forbids_store(cmd.headers());
        let state = if policy::request_forbids_cache(cmd.headers()) {
            log_debug!("Request forbids cached responses: {}", cmd.url());
            CacheState::None
        } else {
            self.lookup(&primary, cmd.headers())
        };
        match state {
            CacheState::Fresh(_, entry) => {
                log_debug!("Cache hit: {}", cmd.url());
                CacheStats::record(&self.stats.hits);
                Ok(entry.response.with_request(RequestInfo::from(&*cmd)))
            }
            CacheState::Stale(key, entry) => {
                log_debug!("Cache entry needs revalidation: {}", cmd.url());
                CacheStats::record(&self.stats.revalidations);
                if let Some(etag) = entry.response.get_etag() {
                    cmd.set_header(IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = entry.response.last_modified() {
                    cmd.set_header(IF_MODIFIED_SINCE, last_modified);
                }
                let response = self.runner.run(cmd)?;
                if response.status == NOT_MODIFIED {
                    log_debug!("Not modified, serving from cache: {}", cmd.url());
                    CacheStats::record(&self.stats.not_modified);
                    let cached = self.refresh(&key, cmd.headers(), entry, &response);
                    return Ok(cached.with_request(RequestInfo::from(&*cmd)));
                }
                Ok(self.store_response(&primary, cmd.headers(), response))
            }
            CacheState::None => {
                CacheStats::record(&self.stats.misses);
                let response = self.runner.run(cmd)?;
                if no_store {
                    log_debug!("Request forbids storing the response: {}", cmd.url());
                    return Ok(response);
                }
                Ok(self.store_response(&primary, cmd.headers(), response))
            }
        }
    }

    fn mutate<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<HttpResponse> {
        let method = cmd.method();
        let primary = primary_key(cmd.url());
        let cached = self.find_variant(&primary, cmd.headers());
        if self.settings.conditional_mutation(&method) {
            if let Some((_, entry)) = &cached {
                add_precondition(cmd, IF_MATCH, entry.response.get_etag());
                add_precondition(cmd, IF_UNMODIFIED_SINCE, entry.response.last_modified());
            }
        }
        let response = self.runner.run(cmd)?;
        if !response.is_success() {
            return Ok(response);
        }
        if self.settings.clear_related(&method) {
            let key = cached
                .map(|(key, _)| key)
                .unwrap_or_else(|| CacheKey::primary(&primary));
            self.invalidate(&key);
        }
        Ok(self.store_response(&primary, cmd.headers(), response))
    }

    /// Find the stored variant selected by the request headers and decide
    /// whether it can be handed out as is. Store failures count as a miss.
    fn lookup(&self, primary: &str, headers: &Headers) -> CacheState {
        let Some((key, entry)) = self.find_variant(primary, headers) else {
            log_debug!("Cache miss: {}", primary);
            return CacheState::None;
        };
        let force_stale = self.settings.force_revalidation_of_stale_entries();
        if policy::must_revalidate(&entry.response, (self.clock)(), force_stale) {
            CacheState::Stale(key, entry)
        } else {
            CacheState::Fresh(key, entry)
        }
    }

    fn find_variant(&self, primary: &str, headers: &Headers) -> Option<(CacheKey, CacheEntry)> {
        let variants = match self.store.get_variants(primary) {
            Ok(variants) => variants,
            Err(err) => {
                log_warn!("Cache lookup failed for {}: {}", primary, err);
                return None;
            }
        };
        variants
            .into_iter()
            .find(|(key, entry)| entry.key_for(primary, headers) == *key)
    }

    /// Bring the stored entry up to date with the headers of a 304 and return
    /// the cached response. Falls back to the copy read at lookup if the entry
    /// is gone. An entry whose Vary changed moves to its new key.
    fn refresh(
        &self,
        key: &CacheKey,
        request_headers: &Headers,
        held: CacheEntry,
        not_modified: &HttpResponse,
    ) -> HttpResponse {
        let mut entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                log_debug!("Cache entry removed during revalidation: {}", key.primary);
                return held.response;
            }
            Err(err) => {
                log_warn!("Cache lookup failed for {}: {}", key.primary, err);
                return held.response;
            }
        };
        let mut updated = false;
        for name in REFRESHED_HEADERS {
            if let Some(value) = not_modified.header(name) {
                entry.response.headers.set(name, value);
                updated = true;
            }
        }
        if !updated {
            return entry.response;
        }
        let entry = CacheEntry::new(entry.response);
        let new_key = entry.key_for(&key.primary, request_headers);
        if new_key != *key {
            log_debug!("Vary changed on revalidation, rekeying: {}", key.primary);
            if let Err(err) = self.store.remove(key) {
                log_warn!("Unable to remove {} from cache: {}", key.primary, err);
            }
        }
        if let Err(err) = self.store.set(&new_key, entry.clone()) {
            log_warn!("Unable to refresh cache entry {}: {}", key.primary, err);
        }
        entry.response
    }

    /// Stamp and store a successful network response if it is admissible.
    /// The response is handed back whatever the outcome.
    fn store_response(
        &self,
        primary: &str,
        request_headers: &Headers,
        mut response: HttpResponse,
    ) -> HttpResponse {
        if !response.is_success() {
            return response;
        }
        response.ensure_date((self.clock)());
        if !policy::can_be_cached(&response) {
            CacheStats::record(&self.stats.skipped);
            return response;
        }
        let entry = CacheEntry::new(response.clone());
        let key = entry.key_for(primary, request_headers);
        match self.store.set(&key, entry) {
            Ok(()) => {
                log_debug!("Stored in cache: {}", primary);
                CacheStats::record(&self.stats.stores);
            }
            Err(err) => log_warn!("Unable to store {} in cache: {}", primary, err),
        }
        response
    }

    /// Purge the mutated representation, every other variant of the resource
    /// and every query string variant. Each step is atomic on its own.
    fn invalidate(&self, key: &CacheKey) {
        log_debug!("Invalidating cached variants of {}", key.primary);
        CacheStats::record(&self.stats.invalidations);
        if let Err(err) = self.store.remove(key) {
            log_warn!("Unable to remove {} from cache: {}", key.primary, err);
        }
        match self.store.get_variants(&key.primary) {
            Ok(variants) => {
                for (variant, _) in variants {
                    if let Err(err) = self.store.remove(&variant) {
                        log_warn!("Unable to remove {} from cache: {}", variant.primary, err);
                    }
                }
            }
            Err(err) => log_warn!("Cache lookup failed for {}: {}", key.primary, err),
        }
        let prefix = format!("{}{}", key.primary, QUERY_SEPARATOR);
        if let Err(err) = self.store.remove_range(&prefix) {
            log_warn!("Unable to remove {} from cache: {}", prefix, err);
        }
    }
}

// Preconditions supplied by the caller win over the cached validators.
fn add_precondition<T>(cmd: &mut Request<T>, name: &str, validator: Option<&str>) {
    if let Some(validator) = validator {
        if !cmd.headers().contains(name) {
            cmd.set_header(name, validator);
        }
    }
}

impl<S, R, D> HttpRunner for HttpCacheHandler<S, R, D>
where
    S: CacheStore,
    R: HttpRunner<Response = HttpResponse>,
    D: HandlerSettings,
{
    type Response = HttpResponse;

    fn run<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<Self::Response> {
        match cmd.method() {
            Method::GET => self.get(cmd),
            Method::PUT | Method::PATCH => self.mutate(cmd),
            method => {
                log_debug!("{} bypasses the cache: {}", method, cmd.url());
                self.runner.run(cmd)
            }
        }
    }
}
