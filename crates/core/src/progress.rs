//! Pipeline progress reporting.
//!
//! The sync pipeline emits a human-readable status line at each stage
//! boundary. Messages go through this trait so a UI can render them however it
//! likes; there is no structured payload.

use std::io::Write;
use std::sync::Mutex;

pub trait Progress: Send + Sync {
    fn update(&self, message: &str);
}

/// Writes each status line to stderr, keeping stdout parseable.
pub struct StderrProgress;

impl Progress for StderrProgress {
    fn update(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{message}");
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress output is unwanted.
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&self, _message: &str) {}
}

/// Collects status lines in memory; used by tests and embedding UIs.
#[derive(Default)]
pub struct MemoryProgress {
    messages: Mutex<Vec<String>>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Progress for MemoryProgress {
    fn update(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_progress_records_in_order() {
        let progress = MemoryProgress::new();
        progress.update("first");
        progress.update("second");
        assert_eq!(progress.messages(), vec!["first", "second"]);
    }
}
