use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use courier_api::{ProcessingError, RecordEnvelope};

/// Business processing applied to every record with valid content.
pub trait RecordHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        envelope: &'a RecordEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>>;
}

/// Stand-in for a downstream call: waits a fixed delay on the calling task.
#[derive(Debug, Clone, Default)]
pub struct SimulatedWorkload {
    delay: Duration,
}

impl SimulatedWorkload {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RecordHandler for SimulatedWorkload {
    fn handle<'a>(
        &'a self,
        envelope: &'a RecordEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            tracing::info!(
                id = %envelope.id(),
                content_length = envelope.content().len(),
                "successfully processed message"
            );
            Ok(())
        })
    }
}
