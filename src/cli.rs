use crate::api_defaults::DEFAULT_TRANSPORT_TIMEOUT;
use crate::http::Method;

use clap::Parser;

#[derive(Parser)]
#[command(about = "Send HTTP requests through a client-side response cache")]
struct Args {
    /// Target URL
    pub url: String,
    /// HTTP method. GET is cached, PUT and PATCH invalidate
    #[clap(long = "request", short = 'X', default_value = "GET", value_parser = parse_method)]
    pub method: Method,
    /// Request header as 'Name: value'. Can be repeated
    #[clap(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// JSON request body
    #[clap(long = "data", short = 'd', value_parser = parse_json)]
    pub data: Option<serde_json::Value>,
    /// Number of times the request is sent
    #[clap(long = "repeat", short = 'n', default_value_t = 2)]
    pub repeat: u32,
    /// Transport timeout in seconds
    #[clap(long, default_value_t = DEFAULT_TRANSPORT_TIMEOUT)]
    pub timeout: u64,
    /// Cache settings file with key=value lines
    #[clap(long)]
    pub config: Option<String>,
    /// Verbose mode. Enables logging, RUST_LOG overrides the level
    #[clap(long, short)]
    pub verbose: bool,
}

fn parse_method(method: &str) -> Result<Method, String> {
    Method::try_from(method).map_err(|err| err.to_string())
}

fn parse_header(header: &str) -> Result<(String, String), String> {
    match header.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Expected 'Name: value', found: {}", header)),
    }
}

fn parse_json(data: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(data).map_err(|err| format!("Invalid JSON body: {}", err))
}

pub struct CliOptions {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub repeat: u32,
    pub timeout: u64,
    pub config: Option<String>,
    pub verbose: bool,
}

impl From<Args> for CliOptions {
    fn from(args: Args) -> Self {
        CliOptions {
            url: args.url,
            method: args.method,
            headers: args.headers,
            body: args.data,
            repeat: args.repeat,
            timeout: args.timeout,
            config: args.config,
            verbose: args.verbose,
        }
    }
}

// Parse cli and return CliOptions
pub fn parse_cli() -> CliOptions {
    Args::parse().into()
}
