use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Global run state: an active flag polled by relay loops and a cancellation
/// token the accept loop selects on. A fresh token is issued on every start so
/// the server can be stopped and started again.
#[derive(Debug, Default)]
pub struct Lifecycle {
    active: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the server active and return the token that will signal its stop.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();
        self.active.store(true, Ordering::Release);
        token
    }

    /// Request a stop. Returns false if the server was not running.
    pub fn stop(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        self.cancel.lock().unwrap().cancel();
        was_active
    }
}
