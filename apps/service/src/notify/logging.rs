use async_trait::async_trait;
use tracing::info;

use super::{Notifier, NotifyError};

/// Notifier that only writes alerts to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        info!(recipient, message, "Alert (log notifier)");
        Ok(())
    }
}
