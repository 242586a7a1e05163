// src/channel.rs
//! Logging channels: one sink, one severity gate and one serializer set each.

use chrono::{SecondsFormat, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

use crate::config::LoggerConfig;
use crate::context::RequestContext;
use crate::error::{HandlerError, LoggerError};
use crate::serializers::{
    correlation_serializer, error_serializer, response_serializer, RequestSerializer,
    SerializedError, SerializedRequest, SerializedResponse,
};

/// Where a channel writes its records.
pub enum Target {
    Stdout,
    Stderr,
    /// Opened in append mode on the first write.
    File(PathBuf),
    Writer(BoxMakeWriter),
}

impl Target {
    /// `File(path)` when a path is configured, otherwise the given stream.
    pub fn file_or(path: Option<PathBuf>, stream: Target) -> Target {
        path.map_or(stream, Target::File)
    }

    fn describe(&self) -> String {
        match self {
            Target::Stdout => "stdout".to_string(),
            Target::Stderr => "stderr".to_string(),
            Target::File(path) => path.display().to_string(),
            Target::Writer(_) => "custom writer".to_string(),
        }
    }

    fn into_make_writer(self) -> BoxMakeWriter {
        match self {
            Target::Stdout => BoxMakeWriter::new(io::stdout),
            Target::Stderr => BoxMakeWriter::new(io::stderr),
            Target::File(path) => BoxMakeWriter::new(LazyFile::new(path)),
            Target::Writer(writer) => writer,
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Field serializers registered on a channel.
#[derive(Debug, Clone, Copy)]
pub struct Serializers {
    pub uid: fn(&Uuid) -> String,
    pub req: RequestSerializer,
    pub res: fn(&RequestContext) -> SerializedResponse,
    pub err: Option<fn(&HandlerError) -> SerializedError>,
}

/// Fields handed to [`Channel::emit`].
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub uid: Uuid,
    pub req: &'a RequestContext,
    pub res: &'a RequestContext,
    pub err: Option<&'a HandlerError>,
}

#[derive(Serialize)]
struct Entry<'a> {
    name: &'a str,
    pid: u32,
    level: u8,
    msg: String,
    time: String,
    v: u8,
    uid: String,
    req: SerializedRequest,
    res: SerializedResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<SerializedError>,
}

pub struct Channel {
    name: String,
    label: &'static str,
    level: Level,
    target: String,
    writer: BoxMakeWriter,
    serializers: Serializers,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        label: &'static str,
        level: Level,
        target: Target,
        serializers: Serializers,
    ) -> Self {
        Self {
            name: name.into(),
            label,
            level,
            target: target.describe(),
            writer: target.into_make_writer(),
            serializers,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Serializes the record and writes it as one JSON line.
    ///
    /// Records below the channel's level are dropped.
    pub fn emit(&self, level: Level, record: LogRecord<'_>) -> Result<(), LoggerError> {
        if !self.enabled(level) {
            debug!(channel = self.label, %level, "record below channel level dropped");
            return Ok(());
        }

        let req = self.serializers.req.serialize(record.req);
        let entry = Entry {
            name: &self.name,
            pid: std::process::id(),
            level: bunyan_level(level),
            msg: format!("{} {}", req.method, req.url),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            v: 0,
            uid: (self.serializers.uid)(&record.uid),
            req,
            res: (self.serializers.res)(record.res),
            err: record.err.zip(self.serializers.err).map(|(err, ser)| ser(err)),
        };

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        self.writer
            .make_writer()
            .write_all(&line)
            .map_err(|source| LoggerError::Write {
                target: self.target.clone(),
                source,
            })?;

        counter!("loggate_records_total", "channel" => self.label).increment(1);
        Ok(())
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("level", &self.level)
            .field("target", &self.target)
            .finish()
    }
}

/// The informational and error channels of one request logger.
#[derive(Debug)]
pub struct Channels {
    pub info: Channel,
    pub error: Channel,
}

impl Channels {
    /// Standard streams when `config.path` is unset, otherwise `<name>.log` and `<name>_error.log`.
    pub fn from_config(config: &LoggerConfig) -> Self {
        let info = Target::file_or(config.info_log_file(), Target::Stdout);
        let error = Target::file_or(config.error_log_file(), Target::Stderr);
        Self::with_targets(config, info, error)
    }

    pub fn with_targets(config: &LoggerConfig, info: Target, error: Target) -> Self {
        let req = RequestSerializer::from_config(config);
        Self {
            info: Channel::new(
                config.name.clone(),
                "info",
                Level::INFO,
                info,
                Serializers {
                    uid: correlation_serializer,
                    req,
                    res: response_serializer,
                    err: None,
                },
            ),
            error: Channel::new(
                config.name.clone(),
                "error",
                Level::ERROR,
                error,
                Serializers {
                    uid: correlation_serializer,
                    req,
                    res: response_serializer,
                    err: Some(error_serializer),
                },
            ),
        }
    }
}

fn bunyan_level(level: Level) -> u8 {
    if level == Level::ERROR {
        50
    } else if level == Level::WARN {
        40
    } else if level == Level::INFO {
        30
    } else if level == Level::DEBUG {
        20
    } else {
        10
    }
}

/// Append-only file opened on first use.
struct LazyFile {
    path: PathBuf,
    file: OnceCell<Mutex<File>>,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: OnceCell::new(),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&self) -> io::Result<&Mutex<File>> {
        self.file.get_or_try_init(|| {
            debug!(path = %self.path().display(), "opening log file");
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map(Mutex::new)
        })
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .handle()?
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        f(&mut file)
    }
}

struct LazyFileWriter<'a> {
    sink: &'a LazyFile,
}

impl<'a> MakeWriter<'a> for LazyFile {
    type Writer = LazyFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LazyFileWriter { sink: self }
    }
}

impl Write for LazyFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.with_file(|file| file.write(buf))
    }

    // One lock per record keeps lines from interleaving.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.sink.with_file(|file| file.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.with_file(|file| file.flush())
    }
}
