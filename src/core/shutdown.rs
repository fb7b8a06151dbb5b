// src/core/shutdown.rs
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::lock::MutexExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / SIGTERM / explicit request.
    Signal,
    /// A capture worker lost its source for good.
    Fatal(String),
}

/// Process-wide cancellation handle, passed explicitly to every component.
///
/// The first requested reason wins; later requests are ignored.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

struct ShutdownInner {
    reason: Mutex<Option<ShutdownReason>>,
    condvar: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                reason: Mutex::new(None),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Returns true if this call set the reason.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        let mut slot = self.inner.reason.lock_or_recover("shutdown.request");
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.condvar.notify_all();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.reason.lock_or_recover("shutdown.is_requested").is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner.reason.lock_or_recover("shutdown.reason").clone()
    }

    /// Blocks until shutdown is requested.
    pub fn wait(&self) -> ShutdownReason {
        let mut slot = self.inner.reason.lock_or_recover("shutdown.wait");
        loop {
            if let Some(reason) = slot.as_ref() {
                return reason.clone();
            }
            slot = match self.inner.condvar.wait(slot) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    pub fn wait_timeout(&self, duration: Duration) -> Option<ShutdownReason> {
        let deadline = Instant::now() + duration;
        let mut slot = self.inner.reason.lock_or_recover("shutdown.wait_timeout");
        loop {
            if let Some(reason) = slot.as_ref() {
                return Some(reason.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = match self.inner.condvar.wait_timeout(slot, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
