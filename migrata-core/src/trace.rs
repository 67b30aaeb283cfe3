//! Progress reporting.

use std::sync::Mutex;

/// Sink for human-readable progress messages.
///
/// The engine never depends on what a sink does with a message.
pub trait TraceService: Send + Sync {
    /// Progress information.
    fn info(&self, message: &str);

    /// Detail, including script text when debug tracing is enabled.
    fn debug(&self, message: &str);

    /// Something the operator should look at.
    fn warn(&self, message: &str);

    /// A failure.
    fn error(&self, message: &str);

    /// Whether debug detail (such as raw script text) should be produced.
    fn is_debug_enabled(&self) -> bool {
        false
    }
}

/// Forwards messages to `tracing` under the `migrata` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTraceService {
    debug: bool,
}

impl TracingTraceService {
    /// Create a sink. `debug` enables script text tracing.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl TraceService for TracingTraceService {
    fn info(&self, message: &str) {
        tracing::info!(target: "migrata", "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "migrata", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "migrata", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "migrata", "{message}");
    }

    fn is_debug_enabled(&self) -> bool {
        self.debug
    }
}

/// Severity of a captured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    /// `info`
    Info,
    /// `debug`
    Debug,
    /// `warn`
    Warn,
    /// `error`
    Error,
}

/// Keeps every message in memory. Used by embedding hosts that want to show
/// the log themselves, and by tests.
#[derive(Debug, Default)]
pub struct MemoryTraceService {
    debug: bool,
    messages: Mutex<Vec<(TraceLevel, String)>>,
}

impl MemoryTraceService {
    /// Create an empty sink.
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages captured so far.
    pub fn messages(&self) -> Vec<(TraceLevel, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Captured messages of one level.
    pub fn at(&self, level: TraceLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: TraceLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

impl TraceService for MemoryTraceService {
    fn info(&self, message: &str) {
        self.push(TraceLevel::Info, message);
    }

    fn debug(&self, message: &str) {
        self.push(TraceLevel::Debug, message);
    }

    fn warn(&self, message: &str) {
        self.push(TraceLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(TraceLevel::Error, message);
    }

    fn is_debug_enabled(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_trace() {
        let trace = MemoryTraceService::new(true);
        trace.info("starting");
        trace.warn("careful");
        trace.info("done");
        assert_eq!(trace.at(TraceLevel::Info), vec!["starting", "done"]);
        assert_eq!(trace.at(TraceLevel::Warn), vec!["careful"]);
        assert!(trace.is_debug_enabled());
        assert!(!TracingTraceService::default().is_debug_enabled());
    }
}
