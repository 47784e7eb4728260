use crate::error::{CommitError, ExtractionError, RecordError};
use crate::record::{RecordContext, RecordEnvelope};

/// Receives failure and commit notifications from pipelines.
///
/// Implementations report; they never change what the pipeline does next.
pub trait ErrorSink: Send + Sync {
    /// Extraction failed. `context` holds whatever metadata was readable.
    fn on_extraction_error(&self, context: &RecordContext, error: &ExtractionError);

    /// Content validation or business processing failed.
    fn on_message_error(&self, envelope: &RecordEnvelope, error: &RecordError);

    fn on_commit_confirmed(&self, envelope: &RecordEnvelope);

    fn on_commit_error(&self, envelope: &RecordEnvelope, error: &CommitError);
}
