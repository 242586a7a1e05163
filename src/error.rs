use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Errors raised while writing a record to a channel sink.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("failed to write log record to {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure raised by a downstream handler.
///
/// Handlers return it as the `Err` side of their result. Its response carries
/// the error in the extensions so the request logger can tell a failed request
/// from one that merely has an error status.
#[derive(Debug, Clone)]
pub struct HandlerError {
    message: String,
    name: String,
    status_code: Option<u16>,
    status: Option<u16>,
    error: Option<Value>,
    stack: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: "Error".to_string(),
            status_code: None,
            status: None,
            error: None,
            stack: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_status_code(404).with_name("NotFoundError")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message).with_status_code(400).with_name("BadRequestError")
    }

    /// Builds an error from any `std::error::Error`, recording its source chain as the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut stack = format!("Error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str(&format!("\n    caused by: {}", cause));
            source = cause.source();
        }
        Self::new(err.to_string()).with_stack(stack)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new(message).with_name("Panic")
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Detail exposed instead of the message when errors are surfaced.
    pub fn with_error(mut self, error: impl Into<Value>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// `status_code`, then `status`, then 500. Zero and invalid codes count as absent.
    pub fn resolved_status(&self) -> StatusCode {
        [self.status_code, self.status]
            .into_iter()
            .flatten()
            .filter(|code| *code != 0)
            .find_map(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        let mut stack = format!("Error: {}", err);
        for cause in err.chain().skip(1) {
            stack.push_str(&format!("\n    caused by: {}", cause));
        }
        Self::new(err.to_string()).with_stack(stack)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.resolved_status();
        let mut response = (status, self.message.clone()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
