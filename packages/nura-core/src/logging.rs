use env_logger::Logger;
use log::{Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{LazyLock, Mutex};
use tokio::sync::broadcast;

const MAX_LOG_ENTRIES: usize = 2000;
const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp_ms: i64,
    pub level: String,
    pub target: String,
    pub message: String,
}

struct LogHub {
    entries: Mutex<VecDeque<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogHub {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(512);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)),
            tx,
        }
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry.clone());
            while entries.len() > MAX_LOG_ENTRIES {
                entries.pop_front();
            }
        }
        let _ = self.tx.send(entry);
    }

    fn recent_entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

static LOG_HUB: LazyLock<LogHub> = LazyLock::new(LogHub::new);

/// Writes through env_logger and keeps the recent records for a host UI.
struct RecordingLogger {
    inner: Logger,
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        LOG_HUB.push(LogEntry {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level: record.level().to_string().to_lowercase(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        });
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger, filtered by `RUST_LOG` (default `warn`).
pub fn init() -> Result<(), SetLoggerError> {
    let builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER));
    install(builder)
}

/// Install the logger with an explicit filter, ignoring `RUST_LOG`.
pub fn init_with_filter(filter: &str) -> Result<(), SetLoggerError> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(filter);
    install(builder)
}

fn install(mut builder: env_logger::Builder) -> Result<(), SetLoggerError> {
    let inner = builder.build();
    let max_level = inner.filter();
    let logger = Box::leak(Box::new(RecordingLogger { inner }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}

pub fn recent_entries() -> Vec<LogEntry> {
    LOG_HUB.recent_entries()
}

pub fn subscribe() -> broadcast::Receiver<LogEntry> {
    LOG_HUB.tx.subscribe()
}
