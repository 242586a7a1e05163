// src/context.rs
use axum::{
    extract::{ConnectInfo, OriginalUri},
    http::{header::HeaderName, HeaderMap, Method, Request, StatusCode},
    response::Response,
};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Correlation id of the current request, available to handlers as `Extension<RequestId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One in-flight transaction as seen by the request logger.
///
/// The request half is captured before the downstream handlers run, since
/// they take ownership of the request. The response half is filled in once
/// they return.
#[derive(Debug, Clone)]
pub struct RequestContext {
    uid: Uuid,
    method: Method,
    url: String,
    original_url: String,
    headers: HeaderMap,
    ip: String,
    protocol: String,
    query: Map<String, Value>,
    status: StatusCode,
    response_headers: HeaderMap,
    response_time: Option<Duration>,
}

impl RequestContext {
    pub fn capture<B>(req: &Request<B>, uid: Uuid, trust_proxy: bool) -> Self {
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let original_url = req
            .extensions()
            .get::<OriginalUri>()
            .and_then(|OriginalUri(uri)| uri.path_and_query())
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| url.clone());

        let headers = req.headers().clone();
        let forwarded = |name: &HeaderName| {
            trust_proxy
                .then(|| headers.get(name))
                .flatten()
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let ip = forwarded(&X_FORWARDED_FOR)
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();

        let protocol = forwarded(&X_FORWARDED_PROTO)
            .or_else(|| req.uri().scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());

        let query = parse_query(req.uri().query().unwrap_or(""));

        Self {
            uid,
            method: req.method().clone(),
            url,
            original_url,
            headers,
            ip,
            protocol,
            query,
            status: StatusCode::NOT_FOUND,
            response_headers: HeaderMap::new(),
            response_time: None,
        }
    }

    /// Records the status and headers of the response about to be sent.
    pub fn observe_response(&mut self, response: &Response) {
        self.status = response.status();
        self.response_headers = response.headers().clone();
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_response_time(&mut self, elapsed: Duration) {
        self.response_time = Some(elapsed);
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_time(&self) -> Option<Duration> {
        self.response_time
    }
}

/// Parses a query string into a JSON object; repeated keys collect into arrays.
fn parse_query(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match out.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key.into_owned(), value);
            }
        }
    }
    out
}
