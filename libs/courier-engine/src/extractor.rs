use std::sync::Arc;

use courier_api::{ExtractionError, RawRecord, RecordContext, RecordEnvelope, now_ms};

use crate::counters::ProcessingCounters;

/// Builds record envelopes from raw broker records.
///
/// Counts every success as processed and every failure as an error; has no
/// other side effects.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    counters: Arc<ProcessingCounters>,
}

impl MetadataExtractor {
    pub fn new(counters: Arc<ProcessingCounters>) -> Self {
        Self { counters }
    }

    pub fn extract(&self, raw: &RawRecord) -> Result<RecordEnvelope, ExtractionError> {
        match build_envelope(raw, now_ms()) {
            Ok(envelope) => {
                tracing::info!(
                    id = %envelope.id(),
                    topic = %envelope.topic(),
                    partition = envelope.partition(),
                    offset = envelope.offset(),
                    produced_at = envelope.produced_at(),
                    content_length = envelope.content().len(),
                    "received message"
                );
                self.counters.record_processed();
                Ok(envelope)
            }
            Err(e) => {
                tracing::error!(context = %RecordContext::from_raw(raw), error = %e, "error extracting message metadata");
                self.counters.record_error();
                Err(e)
            }
        }
    }

    /// Best-effort metadata for error reports. Never fails and never counts.
    pub fn describe(&self, raw: &RawRecord) -> RecordContext {
        RecordContext::from_raw(raw)
    }
}

fn build_envelope(raw: &RawRecord, processed_at: i64) -> Result<RecordEnvelope, ExtractionError> {
    let topic = raw.topic.as_deref().ok_or(ExtractionError::MissingField("topic"))?;
    let partition = raw.partition.ok_or(ExtractionError::MissingField("partition"))?;
    let offset = raw.offset.ok_or(ExtractionError::MissingField("offset"))?;

    if partition < 0 {
        return Err(ExtractionError::NegativeField {
            field: "partition",
            value: i64::from(partition),
        });
    }
    if offset < 0 {
        return Err(ExtractionError::NegativeField { field: "offset", value: offset });
    }

    let content = raw
        .body
        .as_deref()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();

    Ok(RecordEnvelope::new(
        topic,
        partition,
        offset,
        raw.timestamp_ms.unwrap_or(0),
        raw.key.clone(),
        content,
        processed_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> (MetadataExtractor, Arc<ProcessingCounters>) {
        let counters = Arc::new(ProcessingCounters::new());
        (MetadataExtractor::new(counters.clone()), counters)
    }

    #[test]
    fn builds_envelope_and_counts_processed() {
        let (extractor, counters) = extractor();
        let before = now_ms();
        let raw = RawRecord::new("t", 2, 57)
            .with_timestamp(1_700_000_000_000)
            .with_key("k")
            .with_body("hello");

        let env = extractor.extract(&raw).unwrap();

        assert_eq!(env.id(), "t-2-57");
        assert_eq!(env.content(), "hello");
        assert_eq!(env.key(), Some("k"));
        assert_eq!(env.produced_at(), 1_700_000_000_000);
        assert!(env.processed_at() >= before);
        assert_eq!(counters.processed(), 1);
        assert_eq!(counters.errors(), 0);
    }

    #[test]
    fn missing_partition_fails_and_counts_one_error() {
        let (extractor, counters) = extractor();
        let raw = RawRecord {
            topic: Some("t".into()),
            offset: Some(3),
            body: Some(b"x".to_vec()),
            ..RawRecord::default()
        };

        let err = extractor.extract(&raw).unwrap_err();

        assert_eq!(err, ExtractionError::MissingField("partition"));
        assert_eq!(counters.errors(), 1);
        assert_eq!(counters.processed(), 0);
    }

    #[test]
    fn negative_offset_is_rejected() {
        let (extractor, _) = extractor();
        let err = extractor.extract(&RawRecord::new("t", 0, -1)).unwrap_err();
        assert_eq!(err, ExtractionError::NegativeField { field: "offset", value: -1 });
    }

    #[test]
    fn absent_body_and_key_are_allowed() {
        let (extractor, _) = extractor();
        let env = extractor.extract(&RawRecord::new("t", 0, 0)).unwrap();
        assert_eq!(env.content(), "");
        assert_eq!(env.key(), None);
    }

    #[test]
    fn describe_does_not_touch_counters() {
        let (extractor, counters) = extractor();
        let ctx = extractor.describe(&RawRecord::default());
        assert_eq!(ctx, RecordContext::default());
        assert_eq!(counters.snapshot().errors, 0);
    }
}
