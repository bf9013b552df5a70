//! Cooperative cancellation for extraction runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared abort flag; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A token plus the run deadline, checked between steps and at the barrier
#[derive(Debug, Clone)]
pub(crate) struct CancelCheck {
    token: CancellationToken,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl CancelCheck {
    pub(crate) fn new(token: &CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token: token.clone(),
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
        }
    }

    /// Why the run must stop, if it must
    pub(crate) fn reason(&self) -> Option<String> {
        if self.token.is_cancelled() {
            return Some("cancelled by caller".to_string());
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Some(format!("timed out after {:.2}s", timeout.as_secs_f64()))
            }
            _ => None,
        }
    }
}
