// src/observer.rs
use tracing::warn;

use crate::context::RequestContext;
use crate::error::HandlerError;

/// Callback notified of every downstream failure, after the failed response is shaped.
pub trait ErrorObserver: Send + Sync {
    fn on_error(&self, err: &HandlerError, ctx: &RequestContext);
}

impl<F> ErrorObserver for F
where
    F: Fn(&HandlerError, &RequestContext) + Send + Sync,
{
    fn on_error(&self, err: &HandlerError, ctx: &RequestContext) {
        self(err, ctx)
    }
}

/// Reports failures through `tracing`, skipping 404s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ErrorObserver for TracingObserver {
    fn on_error(&self, err: &HandlerError, ctx: &RequestContext) {
        if ctx.status().as_u16() == 404 {
            return;
        }
        warn!(
            uid = %ctx.uid(),
            method = %ctx.method(),
            url = ctx.url(),
            status = ctx.status().as_u16(),
            error = %err,
            "⚠️ request failed"
        );
    }
}
