//! Cache admission and staleness rules.
//!
//! Pure functions over a response representation. They never touch the cache
//! store and never do I/O: the caller supplies the current time.

use crate::api_defaults::CACHEABLE_STATUS_CODES;
use crate::http::Headers;
use crate::io::{HttpResponse, CACHE_CONTROL, PRAGMA};
use crate::log_debug;
use chrono::{DateTime, Duration, Utc};
use std::num::IntErrorKind;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheControl {
    pub max_age: Option<Duration>,
    /// s-maxage
    pub shared_max_age: Option<Duration>,
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub public: bool,
    pub private: bool,
}

pub fn parse_cache_control(headers: &Headers) -> Option<CacheControl> {
    headers.get(CACHE_CONTROL).map(|cc| {
        let mut cache_control = CacheControl::default();
        for directive in cc.split(',') {
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim().to_lowercase(), Some(value)),
                None => (directive.trim().to_lowercase(), None),
            };
            match name.as_str() {
                // no-cache="set-cookie" still forbids reuse without
                // revalidation for our purposes.
                "no-cache" => cache_control.no_cache = true,
                "no-store" => cache_control.no_store = true,
                "must-revalidate" => cache_control.must_revalidate = true,
                "public" => cache_control.public = true,
                "private" => cache_control.private = true,
                "max-age" => cache_control.max_age = value.and_then(delta_seconds),
                "s-maxage" => cache_control.shared_max_age = value.and_then(delta_seconds),
                _ => {}
            }
        }
        cache_control
    })
}

// Lifetimes larger than this are treated as this value.
const MAX_DELTA_SECONDS: i64 = 1 << 31;

// Signed on purpose: a negative lifetime is already elapsed.
fn delta_seconds(value: &str) -> Option<Duration> {
    let seconds = match value.trim().trim_matches('"').parse::<i64>() {
        Ok(seconds) => seconds,
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => MAX_DELTA_SECONDS,
            IntErrorKind::NegOverflow => -MAX_DELTA_SECONDS,
            _ => return None,
        },
    };
    Duration::try_seconds(seconds.clamp(-MAX_DELTA_SECONDS, MAX_DELTA_SECONDS))
}

/// Whether the request itself asks to bypass any stored response.
pub fn request_forbids_cache(headers: &Headers) -> bool {
    match parse_cache_control(headers) {
        Some(cache_control) => cache_control.no_cache || cache_control.no_store,
        None => headers
            .get(PRAGMA)
            .map(|pragma| pragma.to_lowercase().contains("no-cache"))
            .unwrap_or(false),
    }
}

/// Whether the request forbids storing the response it gets back.
pub fn request_forbids_store(headers: &Headers) -> bool {
    parse_cache_control(headers)
        .map(|cache_control| cache_control.no_store)
        .unwrap_or(false)
}

/// Decide whether a response arriving from the network may be stored.
pub fn can_be_cached(response: &HttpResponse) -> bool {
    if !CACHEABLE_STATUS_CODES.contains(&response.status) {
        log_debug!("Not cacheable: status {}", response.status);
        return false;
    }
    // No key scheme can tell future requests apart
    if response.vary().iter().any(|name| name == "*") {
        log_debug!("Not cacheable: Vary *");
        return false;
    }
    let cache_control = match (response.has_body(), response.cache_control()) {
        (true, Some(cache_control)) => cache_control,
        _ => {
            log_debug!("Not cacheable: no content or no cache-control");
            return false;
        }
    };
    if cache_control.no_store {
        log_debug!("Not cacheable: no-store");
        return false;
    }
    if response.expires().is_none()
        && cache_control.max_age.is_none()
        && cache_control.shared_max_age.is_none()
    {
        log_debug!("Not cacheable: no expires, max-age nor s-maxage");
        return false;
    }
    true
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Freshness {
    Fresh,
    Stale,
    /// A lifetime is declared but there is no Date to age the response from.
    Unaged,
    /// No expires, max-age nor s-maxage.
    NoSignal,
}

/// Evaluate the one freshness signal that applies. s-maxage overrides
/// max-age, which overrides Expires, even if a lower ranked signal is more
/// forgiving.
pub fn freshness(
    response: &HttpResponse,
    cache_control: &CacheControl,
    now: DateTime<Utc>,
) -> Freshness {
    if let Some(ttl) = cache_control.shared_max_age.or(cache_control.max_age) {
        let Some(date) = response.date() else {
            return Freshness::Unaged;
        };
        return match date.checked_add_signed(ttl) {
            Some(expires_at) if expires_at <= now => Freshness::Stale,
            Some(_) => Freshness::Fresh,
            None if ttl < Duration::zero() => Freshness::Stale,
            None => Freshness::Fresh,
        };
    }
    match response.expires() {
        Some(expires) if expires < now => Freshness::Stale,
        Some(_) => Freshness::Fresh,
        None => Freshness::NoSignal,
    }
}

/// Decide whether a stored response has to be revalidated with the server
/// before it can be handed out. A stale response can still be reused unless
/// it declares must-revalidate or `force_stale` is set.
pub fn must_revalidate(response: &HttpResponse, now: DateTime<Utc>, force_stale: bool) -> bool {
    let cache_control = match (response.has_body(), response.cache_control()) {
        (true, Some(cache_control)) => cache_control,
        // something went wrong - revalidate
        _ => return true,
    };
    if cache_control.no_cache {
        return true;
    }
    match freshness(response, &cache_control, now) {
        Freshness::Fresh | Freshness::NoSignal => false,
        Freshness::Stale => cache_control.must_revalidate || force_stale,
        Freshness::Unaged => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::format_http_date;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn response(status: u16, headers: &[(&str, String)]) -> HttpResponse {
        let mut response_headers = Headers::new();
        for (key, value) in headers {
            response_headers.set(key, value.clone());
        }
        HttpResponse::builder()
            .status(status)
            .body("x".repeat(512))
            .headers(response_headers)
            .build()
            .unwrap()
    }

    fn date_header() -> (&'static str, String) {
        ("date", format_http_date(&now()))
    }

    fn cc(value: &str) -> (&'static str, String) {
        ("cache-control", value.to_string())
    }

    fn expires_in(seconds: i64) -> (&'static str, String) {
        (
            "expires",
            format_http_date(&(now() + Duration::seconds(seconds))),
        )
    }

    #[test]
    fn test_parse_cache_control() {
        let mut headers = Headers::new();

        let test_table = vec![
            (
                "max-age=3600, no-cache, no-store",
                Some(Duration::seconds(3600)),
                None,
                true,
                true,
                false,
            ),
            (
                "public, max-age=666, must-revalidate",
                Some(Duration::seconds(666)),
                None,
                false,
                false,
                true,
            ),
            (
                "s-maxage=-100, max-age=666",
                Some(Duration::seconds(666)),
                Some(Duration::seconds(-100)),
                false,
                false,
                false,
            ),
            (
                "Max-Age=\"60\", NO-CACHE=\"set-cookie\"",
                Some(Duration::seconds(60)),
                None,
                true,
                false,
                false,
            ),
            ("max-age=abc", None, None, false, false, false),
            ("no-store", None, None, false, true, false),
            ("max-age=0", Some(Duration::seconds(0)), None, false, false, false),
        ];

        for (header, max_age, shared_max_age, no_cache, no_store, must_revalidate) in test_table {
            headers.set("cache-control", header);
            let cc = parse_cache_control(&headers).unwrap();
            assert_eq!(cc.max_age, max_age, "{}", header);
            assert_eq!(cc.shared_max_age, shared_max_age, "{}", header);
            assert_eq!(cc.no_cache, no_cache, "{}", header);
            assert_eq!(cc.no_store, no_store, "{}", header);
            assert_eq!(cc.must_revalidate, must_revalidate, "{}", header);
        }
    }

    #[test]
    fn test_no_cache_control_header_is_none() {
        assert!(parse_cache_control(&Headers::new()).is_none());
    }

    #[test]
    fn test_cacheable_statuses() {
        for status in [200, 203, 206, 300, 301, 410] {
            assert!(can_be_cached(&response(status, &[cc("max-age=666")])));
        }
        for status in [201, 204, 302, 304, 404, 500] {
            assert!(!can_be_cached(&response(status, &[cc("max-age=666")])));
        }
    }

    #[test]
    fn test_not_cacheable_without_freshness_signal() {
        let test_table = vec![
            vec![cc("public")],
            vec![cc("public, must-revalidate"), date_header()],
            vec![cc("no-cache"), ("etag", "\"dummyetag\"".to_string())],
        ];
        for headers in test_table {
            assert!(!can_be_cached(&response(200, &headers)));
        }
    }

    #[test]
    fn test_not_cacheable_no_store_even_with_freshness() {
        let test_table = vec![
            vec![cc("no-store, max-age=666")],
            vec![cc("no-store, s-maxage=666")],
            vec![cc("no-store"), expires_in(3600)],
        ];
        for headers in test_table {
            assert!(!can_be_cached(&response(200, &headers)));
        }
    }

    #[test]
    fn test_not_cacheable_vary_wildcard() {
        let response = response(200, &[cc("max-age=666"), ("vary", "*".to_string())]);
        assert!(!can_be_cached(&response));
    }

    #[test]
    fn test_not_cacheable_without_body_or_cache_control() {
        let mut no_body = response(200, &[cc("max-age=666")]);
        no_body.body = None;
        assert!(!can_be_cached(&no_body));
        assert!(!can_be_cached(&response(200, &[expires_in(3600)])));
    }

    #[test]
    fn test_cacheable_with_any_freshness_signal() {
        let test_table = vec![
            vec![cc("max-age=666")],
            vec![cc("s-maxage=666")],
            vec![cc("public"), expires_in(3600)],
            // Expires in the past is still a signal
            vec![cc("public"), ("expires", "0".to_string())],
        ];
        for headers in test_table {
            assert!(can_be_cached(&response(200, &headers)));
        }
    }

    #[test]
    fn test_must_revalidate_corrupt_entry() {
        let mut no_body = response(200, &[cc("max-age=666"), date_header()]);
        no_body.body = None;
        assert!(must_revalidate(&no_body, now(), false));
        let no_cache_control = response(200, &[date_header(), expires_in(3600)]);
        assert!(must_revalidate(&no_cache_control, now(), false));
    }

    #[test]
    fn test_must_revalidate_no_cache() {
        let response = response(200, &[cc("no-cache, max-age=666"), date_header()]);
        assert!(must_revalidate(&response, now(), false));
    }

    #[test]
    fn test_shared_max_age_overrides_max_age() {
        // s-maxage already elapsed, max-age still fresh: s-maxage decides.
        let response = response(
            200,
            &[cc("must-revalidate, s-maxage=-100, max-age=666"), date_header()],
        );
        assert!(must_revalidate(&response, now(), false));
        // s-maxage fresh, max-age elapsed: s-maxage decides.
        let response = response_fresh_shared_stale_max_age();
        assert!(!must_revalidate(&response, now(), false));
    }

    fn response_fresh_shared_stale_max_age() -> HttpResponse {
        response(
            200,
            &[cc("must-revalidate, s-maxage=666, max-age=-100"), date_header()],
        )
    }

    #[test]
    fn test_max_age_overrides_expires() {
        let fresh = response(
            200,
            &[cc("must-revalidate, max-age=666"), date_header(), expires_in(-3600)],
        );
        assert!(!must_revalidate(&fresh, now(), false));
        let stale = response(
            200,
            &[cc("must-revalidate, max-age=-100"), date_header(), expires_in(3600)],
        );
        assert!(must_revalidate(&stale, now(), false));
    }

    #[test]
    fn test_stale_follows_must_revalidate() {
        let test_table = vec![
            (cc("must-revalidate, max-age=-100"), true),
            (cc("max-age=-100"), false),
            (cc("must-revalidate, s-maxage=-100"), true),
            (cc("s-maxage=-100"), false),
        ];
        for (header, expected) in test_table {
            let response = response(200, &[header, date_header()]);
            assert_eq!(expected, must_revalidate(&response, now(), false));
        }
        let expired = response(200, &[cc("must-revalidate"), expires_in(-10)]);
        assert!(must_revalidate(&expired, now(), false));
        let expired = response(200, &[cc("public"), expires_in(-10)]);
        assert!(!must_revalidate(&expired, now(), false));
    }

    #[test]
    fn test_max_age_boundary_is_stale() {
        let response = response(200, &[cc("must-revalidate, max-age=0"), date_header()]);
        assert_eq!(
            Freshness::Stale,
            freshness(&response, &response.cache_control().unwrap(), now())
        );
    }

    #[test]
    fn test_fresh_entry_never_revalidates() {
        let response = response(200, &[cc("must-revalidate, max-age=666"), date_header()]);
        assert!(!must_revalidate(&response, now(), true));
    }

    #[test]
    fn test_force_stale_revalidation() {
        let response = response(200, &[cc("max-age=-100"), date_header()]);
        assert!(!must_revalidate(&response, now(), false));
        assert!(must_revalidate(&response, now(), true));
    }

    #[test]
    fn test_no_signal_is_never_stale() {
        let response = response(200, &[cc("must-revalidate")]);
        assert_eq!(
            Freshness::NoSignal,
            freshness(&response, &response.cache_control().unwrap(), now())
        );
        assert!(!must_revalidate(&response, now(), true));
    }

    #[test]
    fn test_lifetime_without_date_revalidates() {
        let response = response(200, &[cc("max-age=666")]);
        assert!(must_revalidate(&response, now(), false));
    }

    #[test]
    fn test_request_forbids_cache() {
        let test_table = vec![
            (vec![("Cache-Control", "no-cache")], true),
            (vec![("Cache-Control", "no-store")], true),
            (vec![("Cache-Control", "max-age=0")], false),
            (vec![("Pragma", "no-cache")], true),
            (vec![("Accept", "application/json")], false),
        ];
        for (request_headers, expected) in test_table {
            let mut headers = Headers::new();
            for (key, value) in request_headers {
                headers.set(key, value);
            }
            assert_eq!(expected, request_forbids_cache(&headers));
        }
    }

    #[test]
    fn test_request_forbids_store() {
        let test_table = vec![
            ("no-store", true),
            ("no-cache, no-store", true),
            ("no-cache", false),
            ("max-age=0", false),
        ];
        for (value, expected) in test_table {
            let mut headers = Headers::new();
            headers.set("Cache-Control", value);
            assert_eq!(expected, request_forbids_store(&headers));
        }
        assert!(!request_forbids_store(&Headers::new()));
    }

    #[test]
    fn test_huge_lifetimes_are_clamped() {
        let max = Some(Duration::seconds(MAX_DELTA_SECONDS));
        let test_table = vec![
            ("max-age=99999999999999999999", max),
            ("max-age=99999999999999999", max),
            ("max-age=-99999999999999999999", Some(-Duration::seconds(MAX_DELTA_SECONDS))),
            ("max-age=abc", None),
        ];
        for (value, expected) in test_table {
            let mut headers = Headers::new();
            headers.set("Cache-Control", value);
            assert_eq!(expected, parse_cache_control(&headers).unwrap().max_age);
        }
        let response = response(200, &[cc("max-age=99999999999999999999"), date_header()]);
        assert!(can_be_cached(&response));
        assert_eq!(
            Freshness::Fresh,
            freshness(&response, &response.cache_control().unwrap(), now())
        );
        assert!(!must_revalidate(&response, now(), true));
    }
}
