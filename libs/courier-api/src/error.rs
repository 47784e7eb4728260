use std::fmt;

/// Raw record could not be turned into an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("raw record is missing mandatory field '{0}'")]
    MissingField(&'static str),

    #[error("raw record field '{field}' is negative: {value}")]
    NegativeField { field: &'static str, value: i64 },
}

/// Payload rejected before any business work ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("message {record_id}: content cannot be empty")]
pub struct InvalidContentError {
    pub record_id: String,
}

/// Business logic failed for a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("message {record_id}: {message}")]
pub struct ProcessingError {
    pub record_id: String,
    pub message: String,
}

impl ProcessingError {
    pub fn new(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            message: message.into(),
        }
    }
}

/// Broker rejected (or timed out on) an offset commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("commit {topic}/{partition}@{offset}: {message}")]
pub struct CommitError {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub message: String,
}

impl CommitError {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            message: message.into(),
        }
    }
}

/// Broker client failure outside the life cycle of a single record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("connect ({topic}): {message}")]
    Connect { topic: String, message: String },

    #[error("poll ({topic}): {message}")]
    Poll { topic: String, message: String },
}

/// Category of a record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordErrorKind {
    Extraction,
    InvalidContent,
    Processing,
    Commit,
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordErrorKind::Extraction => f.write_str("extraction"),
            RecordErrorKind::InvalidContent => f.write_str("invalid_content"),
            RecordErrorKind::Processing => f.write_str("processing"),
            RecordErrorKind::Commit => f.write_str("commit"),
        }
    }
}

/// Every way a single record can end without being committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    InvalidContent(#[from] InvalidContentError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl RecordError {
    pub fn kind(&self) -> RecordErrorKind {
        match self {
            RecordError::Extraction(_) => RecordErrorKind::Extraction,
            RecordError::InvalidContent(_) => RecordErrorKind::InvalidContent,
            RecordError::Processing(_) => RecordErrorKind::Processing,
            RecordError::Commit(_) => RecordErrorKind::Commit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        let e: RecordError = ExtractionError::MissingField("partition").into();
        assert_eq!(e.kind(), RecordErrorKind::Extraction);
        assert_eq!(e.to_string(), "raw record is missing mandatory field 'partition'");

        let e: RecordError = CommitError::new("t", 1, 4, "timed out").into();
        assert_eq!(e.kind(), RecordErrorKind::Commit);
        assert_eq!(e.kind().to_string(), "commit");
        assert_eq!(e.to_string(), "commit t/1@4: timed out");
    }
}
