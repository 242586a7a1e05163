// src/middleware/logging.rs
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use metrics::histogram;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, Level};
use uuid::Uuid;

use super::response::{force_json_content_type, replace_body, ErrorBody};
use crate::channel::{Channel, Channels, LogRecord, Target};
use crate::config::LoggerConfig;
use crate::context::{RequestContext, RequestId};
use crate::error::HandlerError;
use crate::observer::ErrorObserver;

type JsonPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Request logger shared by every request handled through [`json_logger`].
#[derive(Clone)]
pub struct JsonLogger {
    inner: Arc<Inner>,
}

struct Inner {
    config: LoggerConfig,
    is_json: Option<JsonPredicate>,
    channels: Channels,
    observers: Vec<Arc<dyn ErrorObserver>>,
}

impl JsonLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: LoggerConfig) -> JsonLoggerBuilder {
        JsonLoggerBuilder {
            config,
            is_json: None,
            info_target: None,
            error_target: None,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    pub fn channels(&self) -> &Channels {
        &self.inner.channels
    }

    /// JSON mode; the configured predicate wins over `config.json`.
    pub fn is_json(&self) -> bool {
        match &self.inner.is_json {
            Some(predicate) => predicate(),
            None => self.inner.config.json,
        }
    }

    fn completed(&self, mut ctx: RequestContext, mut response: Response, start: Instant) -> Response {
        let elapsed = start.elapsed();
        ctx.set_response_time(elapsed);
        if self.is_json() {
            force_json_content_type(&mut response);
        }
        ctx.observe_response(&response);

        self.emit(&self.inner.channels.info, Level::INFO, &ctx, None);
        histogram!("loggate_response_time_seconds", "outcome" => "completed")
            .record(elapsed.as_secs_f64());
        response
    }

    fn failed(
        &self,
        mut ctx: RequestContext,
        mut response: Response,
        err: HandlerError,
        start: Instant,
    ) -> Response {
        let status = err.resolved_status();
        let elapsed = start.elapsed();
        let json = self.is_json();
        if json {
            force_json_content_type(&mut response);
        }
        ctx.observe_response(&response);
        ctx.set_status(status);
        ctx.set_response_time(elapsed);

        self.emit(&self.inner.channels.error, Level::ERROR, &ctx, Some(&err));

        let body = ErrorBody::for_error(&err, status, json, self.inner.config.surface_errors);
        let response = replace_body(response, status, body);

        for observer in &self.inner.observers {
            observer.on_error(&err, &ctx);
        }
        histogram!("loggate_response_time_seconds", "outcome" => "failed")
            .record(elapsed.as_secs_f64());
        response
    }

    fn emit(&self, channel: &Channel, level: Level, ctx: &RequestContext, err: Option<&HandlerError>) {
        let record = LogRecord {
            uid: ctx.uid(),
            req: ctx,
            res: ctx,
            err,
        };
        if let Err(e) = channel.emit(level, record) {
            error!(channel = channel.label(), uid = %ctx.uid(), error = %e, "❌ failed to write request log");
        }
    }
}

impl std::fmt::Debug for JsonLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLogger")
            .field("config", &self.inner.config)
            .field("channels", &self.inner.channels)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

pub struct JsonLoggerBuilder {
    config: LoggerConfig,
    is_json: Option<JsonPredicate>,
    info_target: Option<Target>,
    error_target: Option<Target>,
    observers: Vec<Arc<dyn ErrorObserver>>,
}

impl JsonLoggerBuilder {
    /// Overrides how JSON mode is decided for each request.
    pub fn json_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.is_json = Some(Arc::new(predicate));
        self
    }

    pub fn info_target(mut self, target: Target) -> Self {
        self.info_target = Some(target);
        self
    }

    pub fn error_target(mut self, target: Target) -> Self {
        self.error_target = Some(target);
        self
    }

    pub fn on_error<O>(mut self, observer: O) -> Self
    where
        O: ErrorObserver + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn build(self) -> JsonLogger {
        let channels = Channels::with_targets(
            &self.config,
            self.info_target
                .unwrap_or_else(|| Target::file_or(self.config.info_log_file(), Target::Stdout)),
            self.error_target
                .unwrap_or_else(|| Target::file_or(self.config.error_log_file(), Target::Stderr)),
        );
        debug!(
            name = %self.config.name,
            info = channels.info.target(),
            error = channels.error.target(),
            "request logger channels ready"
        );

        JsonLogger {
            inner: Arc::new(Inner {
                config: self.config,
                is_json: self.is_json,
                channels,
                observers: self.observers,
            }),
        }
    }
}

/// Request logging middleware with correlation ID.
///
/// Logs completed requests on the info channel and failed ones (a
/// [`HandlerError`] response or a panic) on the error channel, then shapes
/// the failed response body.
///
/// A caught panic still runs the process panic hook first. The default hook
/// prints plain text to stderr, which is also the error channel in stream
/// mode, so embedders that parse that stream should install their own hook.
pub async fn json_logger(State(logger): State<JsonLogger>, mut req: Request, next: Next) -> Response {
    let start = Instant::now();
    let uid = Uuid::new_v4();
    req.extensions_mut().insert(RequestId(uid));
    let ctx = RequestContext::capture(&req, uid, logger.config().trust_proxy);

    let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => HandlerError::from_panic(panic).into_response(),
    };

    match response.extensions().get::<HandlerError>().cloned() {
        None => logger.completed(ctx, response, start),
        Some(err) => logger.failed(ctx, response, err, start),
    }
}
