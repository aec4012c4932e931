use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::error;

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub at: DateTime<Utc>,
    pub context: String,
    pub message: String,
}

/// 错误报告的输出端
pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &ErrorReport);
}

#[derive(Debug, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, report: &ErrorReport) {
        error!(context = %report.context, "{}", report.message);
    }
}

/// Keeps the most recent `capacity` error reports and forwards each one to a sink.
pub struct ErrorReporter {
    capacity: usize,
    buffer: Mutex<VecDeque<ErrorReport>>,
    sink: Arc<dyn ErrorSink>,
}

impl ErrorReporter {
    pub fn new(capacity: usize) -> Self {
        Self::with_sink(capacity, Arc::new(TracingSink))
    }

    pub fn with_sink(capacity: usize, sink: Arc<dyn ErrorSink>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            sink,
        }
    }

    pub fn record(&self, context: &str, err: &dyn Display) {
        let report = ErrorReport {
            at: Utc::now(),
            context: context.to_string(),
            message: err.to_string(),
        };
        self.sink.report(&report);

        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(report);
    }

    /// Snapshot, oldest first.
    pub fn recent(&self) -> Vec<ErrorReport> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(50)
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
