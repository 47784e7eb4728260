use std::fmt;

use serde::Serialize;

/// A record exactly as a broker client hands it over.
///
/// Only `topic`, `partition` and `offset` are mandatory. Everything is
/// optional at this level so that malformed deliveries can still be
/// described in error reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    /// Broker-assigned timestamp, epoch milliseconds.
    pub timestamp_ms: Option<i64>,
    pub key: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl RawRecord {
    /// Raw record with all three mandatory coordinates present.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: Some(topic.into()),
            partition: Some(partition),
            offset: Some(offset),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Immutable envelope around one consumed record.
///
/// Built once by the metadata extractor and shared by reference afterwards;
/// there is no way to mutate it after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEnvelope {
    id: String,
    content: String,
    topic: String,
    partition: i32,
    offset: i64,
    produced_at: i64,
    key: Option<String>,
    processed_at: i64,
}

impl RecordEnvelope {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        produced_at: i64,
        key: Option<String>,
        content: impl Into<String>,
        processed_at: i64,
    ) -> Self {
        let topic = topic.into();
        Self {
            id: Self::record_id(&topic, partition, offset),
            content: content.into(),
            topic,
            partition,
            offset,
            produced_at,
            key,
            processed_at,
        }
    }

    /// Deterministic id: `topic-partition-offset`.
    pub fn record_id(topic: &str, partition: i32, offset: i64) -> String {
        format!("{topic}-{partition}-{offset}")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Broker timestamp, epoch milliseconds (0 when the broker sent none).
    pub fn produced_at(&self) -> i64 {
        self.produced_at
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Wall-clock time the extractor finished, epoch milliseconds.
    pub fn processed_at(&self) -> i64 {
        self.processed_at
    }

    pub fn context(&self) -> RecordContext {
        RecordContext {
            topic: Some(self.topic.clone()),
            partition: Some(self.partition),
            offset: Some(self.offset),
            produced_at: Some(self.produced_at),
        }
    }
}

impl fmt::Display for RecordEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topic: {}, partition: {}, offset: {}, timestamp: {}",
            self.topic, self.partition, self.offset, self.produced_at
        )
    }
}

/// Whatever could be recovered about a record for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordContext {
    pub topic: Option<String>,
    pub partition: Option<i32>,
    pub offset: Option<i64>,
    pub produced_at: Option<i64>,
}

impl RecordContext {
    pub fn from_raw(raw: &RawRecord) -> Self {
        Self {
            topic: raw.topic.clone(),
            partition: raw.partition,
            offset: raw.offset,
            produced_at: raw.timestamp_ms,
        }
    }

    /// True when the partition coordinates are known.
    pub fn has_position(&self) -> bool {
        self.partition.is_some() && self.offset.is_some()
    }
}

impl fmt::Display for RecordContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn part<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "?".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "topic={}, partition={}, offset={}",
            part(&self.topic),
            part(&self.partition),
            part(&self.offset)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_built_from_coordinates() {
        let env = RecordEnvelope::new("t", 2, 57, 1_000, None, "body", 2_000);
        assert_eq!(env.id(), "t-2-57");
        assert_eq!(env.id(), RecordEnvelope::record_id("t", 2, 57));
    }

    #[test]
    fn envelope_serializes_in_camel_case() {
        let env = RecordEnvelope::new("orders", 0, 5, 10, Some("k".into()), "x", 20);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["id"], "orders-0-5");
        assert_eq!(json["producedAt"], 10);
        assert_eq!(json["processedAt"], 20);
        assert_eq!(json["key"], "k");
    }

    #[test]
    fn context_renders_missing_parts() {
        let raw = RawRecord {
            topic: Some("orders".into()),
            offset: Some(9),
            ..RawRecord::default()
        };
        let ctx = RecordContext::from_raw(&raw);
        assert!(!ctx.has_position());
        assert_eq!(ctx.to_string(), "topic=orders, partition=?, offset=9");
    }
}
