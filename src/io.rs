use crate::{
    http::{Headers, Request, RequestInfo},
    policy::{self, CacheControl},
    time, Result,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A trait for the HTTP protocol. Implementors need to conform with the HTTP
/// constraints and requirements. Implementors accept a `Request` that wraps
/// headers, payloads and HTTP methods. Clients can potentially do HTTP calls
/// against a remote server, answer from a cache or mock the responses for
/// testing purposes.
pub trait HttpRunner {
    type Response;
    fn run<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<Self::Response>;
}

impl<R: HttpRunner> HttpRunner for Arc<R> {
    type Response = R::Response;

    fn run<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<Self::Response> {
        self.as_ref().run(cmd)
    }
}

// Internal processing is all in lowercase

pub const CACHE_CONTROL: &str = "cache-control";
pub const DATE: &str = "date";
pub const EXPIRES: &str = "expires";
pub const ETAG: &str = "etag";
pub const LAST_MODIFIED: &str = "last-modified";
pub const VARY: &str = "vary";
pub const PRAGMA: &str = "pragma";

// Conditional request headers

pub const IF_NONE_MATCH: &str = "if-none-match";
pub const IF_MODIFIED_SINCE: &str = "if-modified-since";
pub const IF_MATCH: &str = "if-match";
pub const IF_UNMODIFIED_SINCE: &str = "if-unmodified-since";

/// Adapts lower level HTTP outputs to a common Response. A response coming
/// from the network always carries a body, possibly empty. A missing body
/// means there is no content to work with.
#[derive(Clone, Debug, Builder, PartialEq)]
pub struct HttpResponse {
    #[builder(default)]
    pub status: u16,
    #[builder(setter(into, strip_option), default)]
    pub body: Option<String>,
    #[builder(default)]
    pub headers: Headers,
    /// The request this response answers, when known.
    #[builder(setter(into, strip_option), default)]
    pub request: Option<RequestInfo>,
}

impl HttpResponse {
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::default()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|s| s.as_str())
    }

    pub fn get_etag(&self) -> Option<&str> {
        self.header(ETAG)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header(LAST_MODIFIED)
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header(DATE)
            .and_then(|date| time::parse_http_date(date).ok())
    }

    /// An `Expires` header that cannot be parsed, like `0` or `-1`,
    /// represents a time in the past.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.header(EXPIRES).map(|expires| {
            time::parse_http_date(expires).unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        policy::parse_cache_control(&self.headers)
    }

    /// Header names listed in the Vary header, lowercased. A wildcard is
    /// returned as `*`.
    pub fn vary(&self) -> Vec<String> {
        self.header(VARY)
            .map(|vary| {
                vary.split(',')
                    .map(|name| name.trim().to_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Stamp a `Date` header if the server did not send one, so freshness
    /// can be computed later on.
    pub fn ensure_date(&mut self, now: DateTime<Utc>) {
        if self.date().is_none() {
            self.headers.set(DATE, time::format_http_date(&now));
        }
    }

    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(request);
        self
    }
}
