// src/core/logging.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logging context handed to every component at construction.
///
/// Contexts derived from one root share a sequence counter, so messages from
/// the worker, the trigger and the sweeper can be ordered across threads
/// without any process-wide state.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    sequence: Arc<AtomicU64>,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Context for a sub-component sharing this context's sequence counter.
    pub fn child(&self, component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            sequence: self.sequence.clone(),
        }
    }

    pub fn with_instance(&self, instance_id: &str) -> Self {
        self.child(&self.component, instance_id)
    }

    /// Number of messages formatted so far through this context family.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "[{}][seq={:06}][{}:{}] {}",
            level, seq, self.component, self.instance_id, message
        )
    }
}

// Helper trait for uniform component logging
pub trait ComponentLogger {
    fn log_context(&self) -> &LogContext;

    fn trace(&self, message: &str) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", self.log_context().format("TRACE", message));
        }
    }

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format("DEBUG", message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format("INFO", message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format("WARN", message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format("ERROR", message));
    }
}

impl ComponentLogger for LogContext {
    fn log_context(&self) -> &LogContext {
        self
    }
}
