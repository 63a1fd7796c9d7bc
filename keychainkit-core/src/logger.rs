//! Forwarding of the crate's `log` records to a host-provided logger.

use std::sync::{Arc, OnceLock};

/// Receiver for log messages emitted by the store.
///
/// Implemented by the host application and installed once with
/// [`set_logger`]. Messages name operations, services and platforms; secret
/// values are never logged.
///
/// ```rust
/// use std::sync::Arc;
/// use keychainkit_core::logger::{set_logger, LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[keychain {level:?}] {message}");
///     }
/// }
///
/// set_logger(Arc::new(StderrLogger));
/// ```
///
/// From Swift:
///
/// ```swift
/// final class KeychainLogBridge: KeychainKit.Logger {
///     func log(level: KeychainKit.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// KeychainKit.setLogger(logger: KeychainLogBridge())
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Receives one formatted record.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Per-query detail.
    Trace,
    /// Store submissions.
    Debug,
    /// Informational.
    Info,
    /// Degraded but recoverable, e.g. a stopped serial queue.
    Warn,
    /// Failures.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// `log::Log` implementation forwarding to [`LOGGER_INSTANCE`].
struct ForeignLogger;

static FOREIGN_LOGGER: ForeignLogger = ForeignLogger;

/// Debug and trace records from other crates are dropped.
fn is_forwarded(metadata: &log::Metadata<'_>, module_path: Option<&str>) -> bool {
    metadata.level() <= log::Level::Info
        || module_path.is_some_and(|path| path.starts_with("keychainkit"))
}

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        LOGGER_INSTANCE.get().is_some()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !is_forwarded(record.metadata(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the process-wide receiver for this crate's records.
///
/// Only the first call takes effect. If another `log` implementation was
/// already registered by the process, records keep going there.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("keychain logger already set, ignoring");
        return;
    }
    if let Err(err) = log::set_logger(&FOREIGN_LOGGER) {
        eprintln!("failed to install keychain logger: {err}");
        return;
    }
    log::set_max_level(log::LevelFilter::Trace);
}
