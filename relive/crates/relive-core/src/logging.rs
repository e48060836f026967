//! Logging boundary for hot-reload diagnostics.
//!
//! The swap coordinator and the build orchestrator decide only that a
//! message is emitted and at what severity. Where it ends up is the sink's
//! business:
//!
//! - [`FacadeSink`]: forwards to the `log` facade under target `relive`
//! - [`MemorySink`]: keeps entries in memory for tests and tools

use std::fmt;

use parking_lot::Mutex;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn level(self) -> log::Level {
        match self {
            Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Info => log::Level::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// Destination for diagnostics.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, args: fmt::Arguments<'_>);

    fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Severity::Error, args);
    }

    fn warning(&self, args: fmt::Arguments<'_>) {
        self.log(Severity::Warning, args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Severity::Info, args);
    }
}

/// Sink that forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn log(&self, severity: Severity, args: fmt::Arguments<'_>) {
        log::log!(target: "relive", severity.level(), "{}", args);
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

/// Sink that records every entry.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }

    /// Whether any entry of `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.severity == severity && entry.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, args: fmt::Arguments<'_>) {
        self.entries.lock().push(LogEntry {
            severity,
            message: args.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_by_severity() {
        let sink = MemorySink::new();
        sink.error(format_args!("compile failed: {}", 2));
        sink.warning(format_args!("unused"));
        sink.info(format_args!("loaded {}", "game"));

        assert_eq!(sink.count(Severity::Error), 1);
        assert!(sink.contains(Severity::Error, "compile failed: 2"));
        assert!(!sink.contains(Severity::Info, "compile"));
        assert_eq!(sink.entries().len(), 3);

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_facade_sink_accepts_all_severities() {
        let sink = FacadeSink;
        sink.error(format_args!("e"));
        sink.warning(format_args!("w"));
        sink.info(format_args!("i"));
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
