/// relay3d Engine - process-wide diagnostics hub
///
/// Holds the two pieces of state that genuinely are per-process: the logger
/// every thread writes to and the handler fatal assertions are routed to.
/// The rendering pipeline itself is an explicit context object (`Renderer`)
/// and is never stored here.

use std::sync::{OnceLock, RwLock};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::SystemTime;
use crate::fatal::{DefaultFatalHandler, FatalHandler, FatalReport};
use crate::log::{current_thread_label, DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Global fatal handler (initialized with DefaultFatalHandler)
static FATAL_HANDLER: OnceLock<RwLock<Box<dyn FatalHandler>>> = OnceLock::new();

/// Entries below this severity are dropped before reaching the logger
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(severity_to_u8(LogSeverity::Debug));

const fn severity_to_u8(severity: LogSeverity) -> u8 {
    match severity {
        LogSeverity::Trace => 0,
        LogSeverity::Debug => 1,
        LogSeverity::Info => 2,
        LogSeverity::Warn => 3,
        LogSeverity::Error => 4,
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn fatal_handler() -> &'static RwLock<Box<dyn FatalHandler>> {
    FATAL_HANDLER.get_or_init(|| RwLock::new(Box::new(DefaultFatalHandler)))
}

// ===== PUBLIC API =====

/// Process-wide logging and fatal-assertion entry points
///
/// # Example
///
/// ```no_run
/// use relay3d_engine::relay3d::{Engine, log::{Logger, LogEntry, LogSeverity}};
///
/// struct FileLogger;
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
///
/// Engine::set_logger(FileLogger);
/// Engine::set_min_severity(LogSeverity::Info);
/// ```
pub struct Engine;

impl Engine {
    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// Replace the default logger with a custom implementation (file logger, network logger, etc.)
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Drop entries below `severity`
    ///
    /// Defaults to `LogSeverity::Debug`; per-command trace logging in the
    /// render loop is off unless explicitly enabled.
    pub fn set_min_severity(severity: LogSeverity) {
        MIN_SEVERITY.store(severity_to_u8(severity), Ordering::Relaxed);
    }

    /// Whether an entry of `severity` would currently be forwarded
    pub fn is_enabled(severity: LogSeverity) -> bool {
        severity_to_u8(severity) >= MIN_SEVERITY.load(Ordering::Relaxed)
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    ///
    /// # Arguments
    ///
    /// * `severity` - Log severity level
    /// * `source` - Source component (e.g., "relay3d::Renderer")
    /// * `message` - Log message
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(severity, source, message, None, None);
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error! macro to include source location.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(severity, source, message, Some(file), Some(line));
    }

    fn dispatch(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: Option<&'static str>,
        line: Option<u32>,
    ) {
        if !Self::is_enabled(severity) {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                thread: current_thread_label(),
                message,
                file,
                line,
            });
        }
    }

    // ===== FATAL ASSERTION API =====

    /// Replace the fatal assertion handler
    pub fn set_fatal_handler<H: FatalHandler + 'static>(handler: H) {
        if let Ok(mut lock) = fatal_handler().write() {
            *lock = Box::new(handler);
        }
    }

    /// Restore the default (panicking) fatal handler
    pub fn reset_fatal_handler() {
        if let Ok(mut lock) = fatal_handler().write() {
            *lock = Box::new(DefaultFatalHandler);
        }
    }

    /// Report a fatal assertion
    ///
    /// Used by engine_fatal! and engine_assert!. Always logged at ERROR
    /// severity regardless of the severity filter.
    pub fn fatal(source: &str, message: String, file: &'static str, line: u32) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity: LogSeverity::Error,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                thread: current_thread_label(),
                message: format!("FATAL: {}", message),
                file: Some(file),
                line: Some(line),
            });
        }

        let report = FatalReport {
            source: source.to_string(),
            message,
            file,
            line,
        };

        match fatal_handler().read() {
            Ok(handler) => handler.on_fatal(&report),
            Err(poisoned) => poisoned.into_inner().on_fatal(&report),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
