use std::time::Duration;

use async_trait::async_trait;

use lifecycle_core::Pacer;

/// Settle delays as tokio sleeps; the event loop's producers keep running.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
