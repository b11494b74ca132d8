//! Structured logging.
//!
//! # Responsibilities
//! - Own the log sink: severity threshold, encoder and destination
//! - Swap sinks atomically when the logger is (re)initialized
//! - Bridge `tracing` events into the sink
//!
//! # Design Decisions
//! - `tracing` is the emission API everywhere; this module only decides where
//!   records go and how they look
//! - The active sink sits behind an `ArcSwapOption`: a swap redirects every
//!   subsequent event, and an event already in flight finishes on the sink it
//!   loaded
//! - Files and stdout are written by a `tracing-appender` worker thread, so an
//!   emitting task only encodes the line and hands it over
//! - One record is one `write_all`, so concurrent emitters never interleave
//!   inside a line

use std::cmp;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::layer::{Context, Layer, Layered, SubscriberExt};
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogConfig, LogFormat};
use crate::observability::format::{encode, RecordVisitor};
use crate::observability::rotation::{Retention, RollingFile};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Error type for logger initialization.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("unrecognized log level {0:?}")]
    InvalidLevel(String),

    #[error("open log destination: {0}")]
    Io(#[from] io::Error),
}

/// Parse a severity string into a threshold.
///
/// The panic/fatal levels of other loggers collapse into `error`; an empty
/// string means `info`.
pub fn parse_level(level: &str) -> Result<LevelFilter, LogError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "" | "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "dpanic" | "panic" | "fatal" => Ok(LevelFilter::ERROR),
        _ => Err(LogError::InvalidLevel(level.to_string())),
    }
}

/// Writer that never fails a record: failures are counted and the first one
/// is reported on stderr.
struct Reported<W> {
    inner: W,
    dropped: Arc<AtomicU64>,
}

impl<W: Write> Write for Reported<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Err(err) = self.inner.write_all(buf) {
            if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                eprintln!("log write failed, records are being dropped: {err}");
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct Output {
    writer: Box<dyn Write + Send>,
    last: Option<DateTime<Local>>,
}

/// An installed destination.
struct Sink {
    level: LevelFilter,
    format: LogFormat,
    output: Mutex<Output>,
    // Dropping the guard drains the background worker.
    _worker: Option<WorkerGuard>,
}

impl Sink {
    /// Write on the emitting thread.
    fn direct<W>(level: LevelFilter, format: LogFormat, writer: W, dropped: &Arc<AtomicU64>) -> Self
    where
        W: Write + Send + 'static,
    {
        let writer = Reported {
            inner: writer,
            dropped: Arc::clone(dropped),
        };
        Self::with_writer(level, format, Box::new(writer), None)
    }

    /// Hand lines to a worker thread that owns `writer`.
    fn background<W>(
        level: LevelFilter,
        format: LogFormat,
        writer: W,
        dropped: &Arc<AtomicU64>,
    ) -> Self
    where
        W: Write + Send + 'static,
    {
        let writer = Reported {
            inner: writer,
            dropped: Arc::clone(dropped),
        };
        let (queue, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("log-writer")
            .finish(writer);
        let queue = Reported {
            inner: queue,
            dropped: Arc::clone(dropped),
        };
        Self::with_writer(level, format, Box::new(queue), Some(guard))
    }

    fn with_writer(
        level: LevelFilter,
        format: LogFormat,
        writer: Box<dyn Write + Send>,
        worker: Option<WorkerGuard>,
    ) -> Self {
        Self {
            level,
            format,
            output: Mutex::new(Output { writer, last: None }),
            _worker: worker,
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        *metadata.level() <= self.level
    }

    fn emit(&self, event: &Event<'_>) {
        let mut record = RecordVisitor::default();
        event.record(&mut record);

        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Local::now();
        let time = match output.last {
            Some(last) => cmp::max(last, now),
            None => now,
        };
        output.last = Some(time);

        let line = encode(self.format, &time, event.metadata(), record);
        // `Reported` absorbs the failure.
        let _ = output.writer.write_all(line.as_bytes());
    }

    fn flush(&self) -> io::Result<()> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
            .flush()
    }
}

/// Handle to a swappable log sink.
///
/// Clones share the same sink. Until `init` succeeds, events are dropped.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Arc<ArcSwapOption<Sink>>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("installed", &self.sink.load().is_some())
            .field("dropped", &self.dropped_records())
            .finish()
    }
}

impl Logger {
    /// Create a logger with no sink installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide logger.
    ///
    /// The first call registers it as the global `tracing` dispatcher. If
    /// another global dispatcher was set first, the handle still works but
    /// only receives events through scoped subscribers.
    pub fn global() -> &'static Logger {
        static GLOBAL: OnceLock<Logger> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let logger = Logger::new();
            if logger.subscriber().try_init().is_err() {
                eprintln!("global tracing subscriber already set; process-wide logger not installed");
            }
            logger
        })
    }

    /// Build a sink from `config` and install it, replacing any previous sink.
    ///
    /// Replacing a file or stdout sink waits for its worker to drain.
    pub fn init(&self, config: &LogConfig) -> Result<(), LogError> {
        let level = parse_level(&config.level)?;
        let sink = if config.filename.is_empty() {
            Sink::background(level, config.format, io::stdout(), &self.dropped)
        } else {
            let retention = Retention {
                max_backups: config.max_backups,
                max_age: Duration::from_secs(config.max_age.saturating_mul(SECONDS_PER_DAY)),
            };
            let file = RollingFile::open(&config.filename, config.max_size, retention)?;
            Sink::background(level, config.format, file, &self.dropped)
        };

        self.swap(Some(sink));
        Ok(())
    }

    /// Install an arbitrary writer as the destination, written on the
    /// emitting thread.
    pub fn init_writer<W>(&self, level: &str, format: LogFormat, writer: W) -> Result<(), LogError>
    where
        W: Write + Send + 'static,
    {
        let level = parse_level(level)?;
        self.swap(Some(Sink::direct(level, format, writer, &self.dropped)));
        Ok(())
    }

    fn swap(&self, sink: Option<Sink>) {
        if let Some(previous) = self.sink.swap(sink.map(Arc::new)) {
            let _ = previous.flush();
        }
    }

    /// Whether a sink is installed.
    pub fn is_installed(&self) -> bool {
        self.sink.load().is_some()
    }

    /// Records lost to destination write failures since creation.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Flush a destination written on the emitting thread. Background
    /// destinations are drained by [`Logger::shutdown`].
    pub fn flush(&self) -> io::Result<()> {
        match self.sink.load_full() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }

    /// Uninstall the sink and wait for everything queued to be written.
    ///
    /// Later events are dropped until the next `init`. This blocks, so call
    /// it off the async workers.
    pub fn shutdown(&self) {
        self.swap(None);
    }

    /// A `tracing` layer that forwards events to this logger.
    pub fn layer(&self) -> SinkLayer {
        SinkLayer {
            sink: Arc::clone(&self.sink),
        }
    }

    /// A complete subscriber for scoped use with
    /// `tracing::subscriber::set_default`.
    pub fn subscriber(&self) -> Layered<SinkLayer, Registry> {
        tracing_subscriber::registry().with(self.layer())
    }
}

/// Initialize the process-wide logger.
pub fn init(config: &LogConfig) -> Result<(), LogError> {
    Logger::global().init(config)
}

/// Layer that writes enabled events to the current sink.
pub struct SinkLayer {
    sink: Arc<ArcSwapOption<Sink>>,
}

impl<S: Subscriber> Layer<S> for SinkLayer {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The threshold can change on every swap, so never cache a verdict.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.sink
            .load()
            .as_ref()
            .is_some_and(|sink| sink.enabled(metadata))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if let Some(sink) = self.sink.load().as_ref() {
            if sink.enabled(event.metadata()) {
                sink.emit(event);
            }
        }
    }
}
