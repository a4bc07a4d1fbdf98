use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag, polled between channels, items and actions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Trips the token on Ctrl+C. In-flight external calls are left to finish.
pub fn install_ctrlc_handler(token: &CancelToken) {
    let token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("vodkeep: stop requested, finishing the current step...");
        token.cancel();
    }) {
        log::warn!("could not install Ctrl+C handler: {}", e);
    }
}
