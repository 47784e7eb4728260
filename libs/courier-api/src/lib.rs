pub mod broker;
pub mod error;
pub mod record;
pub mod sink;

pub use broker::{BrokerClient, BrokerConnector, Subscription};
pub use error::{
    BrokerError, CommitError, ExtractionError, InvalidContentError, ProcessingError, RecordError,
    RecordErrorKind,
};
pub use record::{RawRecord, RecordContext, RecordEnvelope};
pub use sink::ErrorSink;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
