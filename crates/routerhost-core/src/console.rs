//! Console sink for human-readable notices
//!
//! The session loop and the translator surface acks, responses, warnings,
//! and errors as plain text lines. The `ConsoleSink` trait decouples them
//! from whatever actually displays those lines. Implementations must not
//! block: the background protocol loop calls `append_line` inline.

use parking_lot::Mutex;
use std::sync::Arc;

/// A side-channel sink for human-readable notices.
///
/// Implementations must be cheap and non-blocking.
pub trait ConsoleSink: Send + Sync {
    /// Append one line of text to the console.
    fn append_line(&self, line: &str);
}

/// Console sink that forwards lines to the `tracing` infrastructure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn append_line(&self, line: &str) {
        tracing::info!(target: "console", "{}", line);
    }
}

/// Console sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsole;

impl ConsoleSink for NullConsole {
    fn append_line(&self, _line: &str) {}
}

/// Console sink that records lines in memory.
///
/// Useful for tests and for UIs that render the console themselves.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    /// Create a new, empty memory console.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all lines appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }

    /// Remove and return all recorded lines.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.lines.lock())
    }
}

impl ConsoleSink for MemoryConsole {
    fn append_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_console_records_lines() {
        let console = MemoryConsole::new();
        console.append_line("ACK 3");
        console.append_line("Sending command: 1 0 0");
        assert_eq!(console.lines().len(), 2);
        assert!(console.contains("ACK 3"));
        assert!(!console.contains("retransmit"));
    }

    #[test]
    fn test_memory_console_take_drains() {
        let console = MemoryConsole::new();
        console.append_line("ping");
        assert_eq!(console.take(), vec!["ping".to_string()]);
        assert!(console.lines().is_empty());
    }
}
