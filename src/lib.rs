pub mod api_defaults;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod io;
pub mod policy;
pub mod stats;
pub mod time;
pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
pub mod logging;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate derive_builder;

pub use cache::{CacheEntry, CacheKey, CacheStore, InMemoryCache, NoCache};
pub use config::{Config, HandlerSettings, Settings};
pub use handler::{HttpCacheHandler, HttpCacheHandlerBuilder};
pub use http::{Client, Headers, Method, Request};
pub use io::{HttpResponse, HttpRunner};
pub use stats::{CacheStats, StatsSnapshot};
