use crate::api_defaults;
use crate::io::{HttpResponse, HttpRunner};
use crate::log_debug;
use crate::Result;
use serde::Serialize;
use std::collections::{hash_map, HashMap};
use std::fmt::{self, Display, Formatter};
use std::time::Duration;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder as UreqRequest};

/// Blocking HTTP transport backed by a `ureq` agent. Status codes are never
/// turned into errors: a 404 or a 500 is a response like any other. Only
/// connection, timeout and protocol failures are reported as errors.
pub struct Client {
    agent: Agent,
}

impl Client {
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();
        Client {
            agent: Agent::new_with_config(config),
        }
    }

    fn call<T>(
        &self,
        builder: UreqRequest<WithoutBody>,
        request: &Request<T>,
    ) -> Result<HttpResponse> {
        let builder = with_headers(builder, request.headers());
        let response = builder.call()?;
        into_response(response)
    }

    fn send<T: Serialize>(
        &self,
        builder: UreqRequest<WithBody>,
        request: &Request<T>,
    ) -> Result<HttpResponse> {
        let builder = with_headers(builder, request.headers());
        let response = match &request.body {
            Some(body) => builder.send_json(body)?,
            None => builder.send_empty()?,
        };
        into_response(response)
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new(Some(Duration::from_secs(
            api_defaults::DEFAULT_TRANSPORT_TIMEOUT,
        )))
    }
}

fn with_headers<B>(builder: UreqRequest<B>, headers: &Headers) -> UreqRequest<B> {
    headers
        .iter()
        .fold(builder, |req, (key, value)| req.header(key.as_str(), value.as_str()))
}

fn into_response(mut response: ureq::http::Response<ureq::Body>) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    // Grab headers for cache validation and freshness.
    let headers = response
        .headers()
        .iter()
        .fold(Headers::new(), |mut headers, (name, value)| {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
            headers
        });
    let body = response.body_mut().read_to_string()?;
    let response = HttpResponse::builder()
        .status(status)
        .body(body)
        .headers(headers)
        .build()?;
    Ok(response)
}

impl HttpRunner for Client {
    type Response = HttpResponse;

    fn run<T: Serialize>(&self, cmd: &mut Request<T>) -> Result<Self::Response> {
        log_debug!("{} {}", cmd.method, cmd.url());
        match cmd.method {
            Method::GET => self.call(self.agent.get(cmd.url()), cmd),
            Method::HEAD => self.call(self.agent.head(cmd.url()), cmd),
            Method::DELETE => self.call(self.agent.delete(cmd.url()), cmd),
            Method::POST => self.send(self.agent.post(cmd.url()), cmd),
            Method::PUT => self.send(self.agent.put(cmd.url()), cmd),
            Method::PATCH => self.send(self.agent.patch(cmd.url()), cmd),
        }
    }
}

/// Header names are case-insensitive. Internal processing is all in
/// lowercase.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Headers(HashMap::new())
    }

    pub fn set<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.as_ref().to_lowercase(), value.into());
    }

    /// Add a value to a header, joining it with any existing value as a comma
    /// separated list.
    pub fn append<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        let key = key.as_ref().to_lowercase();
        match self.0.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value.as_ref());
            }
            None => {
                self.0.insert(key, value.as_ref().to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(&key.to_lowercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_lowercase())
    }

    pub fn iter(&self) -> hash_map::Iter<String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let method = match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        write!(f, "{}", method)
    }
}

impl TryFrom<&str> for Method {
    type Error = crate::Error;

    fn try_from(method: &str) -> std::result::Result<Self, Self::Error> {
        match method.to_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(crate::error::gen(format!(
                "Unsupported HTTP method: {}",
                method
            ))),
        }
    }
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Request<T> {
    #[builder(setter(into, strip_option), default)]
    body: Option<T>,
    #[builder(default)]
    headers: Headers,
    #[builder(default)]
    method: Method,
    #[builder(setter(into))]
    url: String,
}

impl<T> Request<T> {
    pub fn builder() -> RequestBuilder<T> {
        RequestBuilder::default()
    }

    pub fn new(url: &str, method: Method) -> Self {
        Request {
            body: None,
            headers: Headers::new(),
            method,
            url: url.to_string(),
        }
    }

    pub fn with_body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers.set(key, value);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }
}

/// Snapshot of the request a response answers. Cached responses get the live
/// request attached when they are handed back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestInfo {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
}

impl<T> From<&Request<T>> for RequestInfo {
    fn from(request: &Request<T>) -> Self {
        RequestInfo {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
        }
    }
}
