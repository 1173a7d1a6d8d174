//! One-shot gate used to hold an async call at a known point

use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once a call has reached the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call continue
    pub fn release(&self) {
        self.release.notify_one();
    }

    pub(crate) async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}
