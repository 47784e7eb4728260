use std::sync::Arc;

use courier_api::{CommitError, ErrorSink, ExtractionError, RecordContext, RecordEnvelope, RecordError};

use crate::counters::ProcessingCounters;

const STATS_EVERY: u64 = 100;

/// Error sink that logs through `tracing` and counts failures.
///
/// Extraction failures are already counted by the extractor and are only
/// logged here.
#[derive(Debug, Clone)]
pub struct LoggingErrorSink {
    counters: Arc<ProcessingCounters>,
}

impl LoggingErrorSink {
    pub fn new(counters: Arc<ProcessingCounters>) -> Self {
        Self { counters }
    }

    fn log_statistics(&self) {
        let snapshot = self.counters.snapshot();
        if snapshot.processed % STATS_EVERY == 0 {
            tracing::info!(
                processed = snapshot.processed,
                errors = snapshot.errors,
                "processing statistics"
            );
        }
    }
}

impl ErrorSink for LoggingErrorSink {
    fn on_extraction_error(&self, context: &RecordContext, error: &ExtractionError) {
        if context.has_position() {
            tracing::error!(
                topic = context.topic.as_deref().unwrap_or("?"),
                partition = ?context.partition,
                offset = ?context.offset,
                error = %error,
                "error occurred for message"
            );
        } else {
            tracing::error!(%context, error = %error, "error occurred processing message");
        }
    }

    fn on_message_error(&self, envelope: &RecordEnvelope, error: &RecordError) {
        self.counters.record_error();
        tracing::error!(
            id = %envelope.id(),
            info = %envelope,
            kind = %error.kind(),
            error = %error,
            "failed to process message"
        );
        self.log_statistics();
    }

    fn on_commit_confirmed(&self, envelope: &RecordEnvelope) {
        tracing::debug!(id = %envelope.id(), info = %envelope, "manual commit confirmed");
        self.log_statistics();
    }

    fn on_commit_error(&self, envelope: &RecordEnvelope, error: &CommitError) {
        self.counters.record_error();
        tracing::error!(
            id = %envelope.id(),
            topic = %envelope.topic(),
            partition = envelope.partition(),
            offset = envelope.offset(),
            error = %error,
            "manual commit failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use courier_api::{InvalidContentError, ProcessingError};

    use super::*;

    #[test]
    fn counts_message_and_commit_errors_but_not_extraction() {
        let counters = Arc::new(ProcessingCounters::new());
        let sink = LoggingErrorSink::new(counters.clone());
        let env = RecordEnvelope::new("t", 0, 1, 0, None, "", 0);

        sink.on_extraction_error(&RecordContext::default(), &ExtractionError::MissingField("topic"));
        assert_eq!(counters.errors(), 0);

        sink.on_message_error(&env, &InvalidContentError { record_id: env.id().into() }.into());
        sink.on_message_error(&env, &ProcessingError::new(env.id(), "boom").into());
        sink.on_commit_error(&env, &CommitError::new("t", 0, 1, "rejected"));
        assert_eq!(counters.errors(), 3);

        sink.on_commit_confirmed(&env);
        assert_eq!(counters.errors(), 3);
        assert_eq!(counters.processed(), 0);
    }
}
