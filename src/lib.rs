pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observer;
pub mod serializers;

pub use channel::{Channel, Channels, LogRecord, Target};
pub use config::LoggerConfig;
pub use context::{RequestContext, RequestId};
pub use error::{HandlerError, LoggerError};
pub use middleware::logging::{json_logger, JsonLogger, JsonLoggerBuilder};
pub use observer::ErrorObserver;
