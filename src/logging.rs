/// Structured logging for the alert relay
///
/// Every line carries the subsystem it came from and an optional context
/// (channel name, feed address, warning type). Supports console output and
/// an append-only log file for unattended operation.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Warnings,
    Storm,
    Forecast,
    Feed,
    Transport,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Warnings => write!(f, "WARN-FEED"),
            Source::Storm => write!(f, "STORM"),
            Source::Forecast => write!(f, "FCST"),
            Source::Feed => write!(f, "STRIKES"),
            Source::Transport => write!(f, "TX"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - feed temporarily empty or between publications
    Expected,
    /// Unexpected failure - server errors, format changes, broken links
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        *LOGGER.lock().unwrap_or_else(PoisonError::into_inner) = Some(logger);
    }

    fn log(&self, level: LogLevel, source: Source, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, context_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, context_part, message),
                LogLevel::Info => println!("   {}{}: {}", source, context_part, message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", source, context_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, source: Source, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
        logger.log(level, source, context, message);
    }
}

pub fn info(source: Source, context: Option<&str>, message: &str) {
    emit(LogLevel::Info, source, context, message);
}

pub fn warn(source: Source, context: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source, context, message);
}

pub fn error(source: Source, context: Option<&str>, message: &str) {
    emit(LogLevel::Error, source, context, message);
}

pub fn debug(source: Source, context: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source, context, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a feed fetch failure from its error text
pub fn classify_fetch_failure(error_message: &str) -> FailureType {
    // Server faults, moved endpoints, and payload format changes need a human
    if error_message.contains("HTTP error: 5")
        || error_message.contains("HTTP error: 404")
        || error_message.contains("Parse error")
    {
        FailureType::Unexpected
    } else if error_message.contains("empty") {
        FailureType::Expected
    } else {
        FailureType::Unknown
    }
}

/// Log a feed fetch failure with automatic classification
pub fn log_fetch_failure(source: Source, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_fetch_failure(&error_msg);
    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(source, None, &message),
        FailureType::Unexpected => error(source, None, &message),
        FailureType::Unknown => warn(source, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Delivery Summary Logging
// ---------------------------------------------------------------------------

/// Log the outcome of sending one alert's chunks to a channel
pub fn log_delivery_summary(channel: &str, total: usize, sent: usize, failed: usize) {
    let message = format!("Delivered {}/{} chunk(s), {} failed", sent, total, failed);

    if failed == 0 {
        info(Source::Transport, Some(channel), &message);
    } else if sent == 0 {
        error(Source::Transport, Some(channel), &message);
    } else {
        warn(Source::Transport, Some(channel), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" Warning ".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(classify_fetch_failure("HTTP error: 503"), FailureType::Unexpected);
        assert_eq!(classify_fetch_failure("Parse error: expected value"), FailureType::Unexpected);
        assert_eq!(classify_fetch_failure("Fetch error: forecast body was empty"), FailureType::Expected);
        assert_eq!(classify_fetch_failure("Fetch error: connection reset"), FailureType::Unknown);
    }

    #[test]
    fn test_log_file_receives_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.log");
        let path_str = path.to_str().unwrap();

        init_logger(LogLevel::Info, Some(path_str), true);
        info(Source::System, Some("test"), "relay started");
        debug(Source::System, None, "below minimum level");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO SYS [test]: relay started"), "got {:?}", content);
        assert!(!content.contains("below minimum level"));
    }
}
