// src/serializers.rs
//! Projections of a request context into the shapes written to the log.

use axum::http::{header, HeaderMap};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::LoggerConfig;
use crate::context::RequestContext;
use crate::error::HandlerError;

pub const OBFUSCATED: &str = "obfuscated";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedRequest {
    pub url: String,
    pub header: Map<String, Value>,
    pub method: String,
    pub ip: String,
    pub protocol: String,
    #[serde(rename = "originalUrl")]
    pub original_url: String,
    pub query: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Milliseconds
    #[serde(rename = "responseTime")]
    pub response_time: Option<u64>,
    pub header: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerializedError {
    pub message: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Request serializer bound to the logger configuration.
#[derive(Debug, Clone, Copy)]
pub struct RequestSerializer {
    obfuscate: bool,
}

impl RequestSerializer {
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self {
            obfuscate: config.obfuscate,
        }
    }

    pub fn serialize(&self, ctx: &RequestContext) -> SerializedRequest {
        let mut headers = header_map_to_json(ctx.headers());
        if self.obfuscate {
            for name in [header::AUTHORIZATION, header::COOKIE] {
                if let Some(value) = headers.get_mut(name.as_str()) {
                    *value = Value::String(OBFUSCATED.to_string());
                }
            }
        }

        SerializedRequest {
            url: ctx.url().to_string(),
            header: headers,
            method: ctx.method().to_string(),
            ip: ctx.ip().to_string(),
            protocol: ctx.protocol().to_string(),
            original_url: ctx.original_url().to_string(),
            query: ctx.query().clone(),
        }
    }
}

pub fn response_serializer(ctx: &RequestContext) -> SerializedResponse {
    SerializedResponse {
        status_code: ctx.status().as_u16(),
        response_time: ctx
            .response_time()
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        header: header_map_to_json(ctx.response_headers()),
    }
}

pub fn correlation_serializer(id: &Uuid) -> String {
    id.to_string()
}

pub fn error_serializer(err: &HandlerError) -> SerializedError {
    SerializedError {
        message: err.message().to_string(),
        name: err.name().to_string(),
        stack: err.stack().map(str::to_string),
    }
}

/// Header names become lowercase keys. Repeated values are joined with `", "`,
/// except `set-cookie` which stays a list.
fn header_map_to_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();

        let value = if *name == header::SET_COOKIE {
            Value::Array(values.into_iter().map(Value::String).collect())
        } else {
            Value::String(values.join(", "))
        };
        out.insert(name.as_str().to_string(), value);
    }
    out
}
