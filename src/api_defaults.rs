// Status codes whose semantics allow a response to be stored without any
// extra negotiation. RFC 2616 13.4
pub const CACHEABLE_STATUS_CODES: [u16; 6] = [200, 203, 206, 300, 301, 410];

pub const NOT_MODIFIED: u16 = 304;

// Separates a resource path from its query string. Used as the range prefix
// to purge every query variant of a resource after a mutation.
pub const QUERY_SEPARATOR: &str = "?";

// Global timeout for a single request/response exchange in the default
// transport, in seconds.
pub const DEFAULT_TRANSPORT_TIMEOUT: u64 = 30;
