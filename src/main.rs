use std::{fs::File, sync::Arc, time::Duration};

use env_logger::Env;
use hcache::{
    cli::parse_cli,
    config::{Config, Settings},
    error::AddContext,
    http::{Client, Request},
    io::HttpRunner,
    HttpCacheHandler, InMemoryCache, Result,
};

fn main() -> Result<()> {
    let options = parse_cli();
    if options.verbose {
        let env = Env::default().default_filter_or("info");
        env_logger::init_from_env(env);
    }
    let settings = match &options.config {
        Some(path) => {
            let f = File::open(path).err_context(format!("Unable to open {}", path))?;
            Config::new(f)?
        }
        None => Settings::default(),
    };
    let client = Client::new(Some(Duration::from_secs(options.timeout)));
    let handler = HttpCacheHandler::new(Arc::new(InMemoryCache::new()), client, settings);

    let mut last = None;
    for attempt in 1..=options.repeat.max(1) {
        let mut request = Request::new(&options.url, options.method);
        for (name, value) in &options.headers {
            request.set_header(name, value);
        }
        if let Some(body) = &options.body {
            request = request.with_body(body.clone());
        }
        let served_before = served_from_cache(&handler);
        let response = handler.run(&mut request)?;
        let source = if served_from_cache(&handler) > served_before {
            "cache"
        } else {
            "network"
        };
        println!("#{} {} {} ({})", attempt, options.method, response.status, source);
        last = Some(response);
    }
    if let Some(response) = last {
        println!();
        println!("{}", response.body.unwrap_or_default());
    }
    println!();
    println!("{}", handler.stats().snapshot());
    println!("hit rate: {:.2}", handler.stats().hit_rate());
    Ok(())
}

// Hits plus 304s, where the body came out of the cache.
fn served_from_cache<S, R, D>(handler: &HttpCacheHandler<S, R, D>) -> u64 {
    let snapshot = handler.stats().snapshot();
    snapshot.hits + snapshot.not_modified
}
