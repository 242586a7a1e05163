// src/middleware/response.rs
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::error::HandlerError;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Body of a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(Value),
    Text(String),
}

impl ErrorBody {
    /// Generic body for 500s, the error message otherwise. With `surface_errors`
    /// the error's own detail replaces either.
    pub fn for_error(err: &HandlerError, status: StatusCode, json: bool, surface_errors: bool) -> Self {
        if surface_errors {
            let detail = err
                .error()
                .filter(|detail| !detail.is_null() && detail.as_str() != Some(""))
                .cloned()
                .unwrap_or_else(|| Value::String(err.message().to_string()));
            return match (json, detail) {
                (true, Value::String(s)) => ErrorBody::Json(json!({ "error": s })),
                (true, other) => ErrorBody::Json(other),
                (false, Value::String(s)) => ErrorBody::Text(s),
                (false, other) => ErrorBody::Text(other.to_string()),
            };
        }

        match (status == StatusCode::INTERNAL_SERVER_ERROR, json) {
            (true, true) => ErrorBody::Json(json!({
                "status": 500,
                "error": INTERNAL_SERVER_ERROR,
            })),
            (true, false) => ErrorBody::Text(INTERNAL_SERVER_ERROR.to_string()),
            (false, true) => ErrorBody::Json(json!({ "message": err.message() })),
            (false, false) => ErrorBody::Text(err.message().to_string()),
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            ErrorBody::Json(_) => JSON_CONTENT_TYPE,
            ErrorBody::Text(_) => TEXT_CONTENT_TYPE,
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let content_type = self.content_type();
        let body = match self {
            ErrorBody::Json(value) => Body::from(value.to_string()),
            ErrorBody::Text(text) => Body::from(text),
        };
        let mut response = Response::new(body);
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

/// Replaces the body of a failed response, keeping the downstream's other headers.
pub fn replace_body(failed: Response, status: StatusCode, body: ErrorBody) -> Response {
    let (mut parts, _) = failed.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.extensions.remove::<HandlerError>();

    let (new_parts, new_body) = body.into_response().into_parts();
    parts.headers.extend(new_parts.headers);
    parts.status = status;
    Response::from_parts(parts, new_body)
}

pub fn force_json_content_type(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
}
