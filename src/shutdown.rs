/// Cooperative cancellation for the receive loops
///
/// Loops check the token once per iteration; nothing blocks on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    stopped: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
