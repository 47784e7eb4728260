//! Kafka broker adapter built on rdkafka's `StreamConsumer`.
//!
//! Each route gets its own consumer subscribed to exactly one topic, so a
//! slow topic never holds back another. Offsets are committed manually and
//! synchronously after a record has been processed, on the blocking pool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};

use courier_api::{BrokerClient, BrokerConnector, BrokerError, CommitError, RawRecord, Subscription};
use courier_engine::config::KafkaSettings;

// ---------------------------------------------------------------------------
// KafkaConnector
// ---------------------------------------------------------------------------

pub struct KafkaConnector {
    settings: KafkaSettings,
}

impl KafkaConnector {
    pub fn new(settings: KafkaSettings) -> Self {
        if let Some(registry) = &settings.schema_registry {
            tracing::info!(url = %registry.url, "schema registry configured");
        }
        Self { settings }
    }

    /// Effective client properties of one route's consumer.
    fn route_properties(&self, subscription: &Subscription, redact: bool) -> Vec<(&'static str, String)> {
        let mut props = if redact {
            self.settings.redacted_properties()
        } else {
            self.settings.client_properties()
        };
        props.retain(|(key, _)| *key != "group.id");
        props.push(("group.id", subscription.group_id.clone()));
        props.push(("client.id", subscription.route_id.clone()));
        props
    }

    fn client_config(&self, subscription: &Subscription) -> ClientConfig {
        let mut config = ClientConfig::new();
        for (key, value) in self.route_properties(subscription, false) {
            config.set(key, value);
        }
        config
    }
}

impl BrokerConnector for KafkaConnector {
    fn connect(&self, subscription: &Subscription) -> Result<Arc<dyn BrokerClient>, BrokerError> {
        let connect_err = |e: rdkafka::error::KafkaError| BrokerError::Connect {
            topic: subscription.topic.clone(),
            message: e.to_string(),
        };

        let consumer: StreamConsumer = self.client_config(subscription).create().map_err(connect_err)?;
        consumer.subscribe(&[subscription.topic.as_str()]).map_err(connect_err)?;

        tracing::info!(
            route = %subscription.route_id,
            topic = %subscription.topic,
            group = %subscription.group_id,
            properties = ?self.route_properties(subscription, true),
            "kafka consumer subscribed"
        );
        Ok(Arc::new(KafkaClient {
            consumer: Arc::new(consumer),
            topic: subscription.topic.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// KafkaClient
// ---------------------------------------------------------------------------

pub struct KafkaClient {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl BrokerClient for KafkaClient {
    /// Waits for the next message; never returns `Ok(None)`.
    fn poll(&self) -> Pin<Box<dyn Future<Output = Result<Option<RawRecord>, BrokerError>> + Send + '_>> {
        Box::pin(async move {
            let msg = self.consumer.recv().await.map_err(|e| BrokerError::Poll {
                topic: self.topic.clone(),
                message: e.to_string(),
            })?;

            Ok(Some(RawRecord {
                topic: Some(msg.topic().to_string()),
                partition: Some(msg.partition()),
                offset: Some(msg.offset()),
                timestamp_ms: msg.timestamp().to_millis(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                body: msg.payload().map(<[u8]>::to_vec),
            }))
        })
    }

    fn commit(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommitError>> + Send + '_>> {
        let topic = topic.to_string();
        let consumer = self.consumer.clone();
        Box::pin(async move {
            let failed = |message: String| CommitError::new(topic.as_str(), partition, offset, message);

            let mut tpl = TopicPartitionList::new();
            tpl.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))
                .map_err(|e| failed(e.to_string()))?;

            off_runtime(move || consumer.commit(&tpl, CommitMode::Sync))
                .await
                .map_err(failed)
        })
    }
}

/// Runs a blocking librdkafka call on tokio's blocking pool so the calling
/// worker stays free for other routes.
async fn off_runtime<T, F>(call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> KafkaResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| format!("blocking task: {e}"))?
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use courier_engine::config::SecuritySettings;

    use super::*;

    #[tokio::test]
    async fn blocking_commit_leaves_the_runtime_free() {
        let commit = tokio::spawn(off_runtime(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }));

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        assert_eq!(commit.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn blocking_call_errors_are_propagated() {
        let result: Result<(), String> =
            off_runtime(|| Err(rdkafka::error::KafkaError::Canceled)).await;
        assert!(result.is_err());
    }

    #[test]
    fn client_config_overrides_group_per_subscription() {
        let connector = KafkaConnector::new(KafkaSettings {
            group_id: "configured".into(),
            ..KafkaSettings::default()
        });
        let subscription = Subscription {
            topic: "orders".into(),
            route_id: "kafka-consumer-route-orders".into(),
            group_id: "configured".into(),
        };

        let config = connector.client_config(&subscription);

        assert_eq!(config.get("group.id"), Some("configured"));
        assert_eq!(config.get("client.id"), Some("kafka-consumer-route-orders"));
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("bootstrap.servers"), Some("localhost:9092"));
    }

    #[test]
    fn logged_route_properties_hide_the_password() {
        let connector = KafkaConnector::new(KafkaSettings {
            security: Some(SecuritySettings {
                protocol: Some("SASL_SSL".into()),
                sasl_mechanism: Some("PLAIN".into()),
                sasl_username: Some("svc".into()),
                sasl_password: Some("hunter2".into()),
            }),
            ..KafkaSettings::default()
        });
        let subscription = Subscription {
            topic: "payments".into(),
            route_id: "kafka-consumer-route-payments".into(),
            group_id: "courier-consumer-group".into(),
        };

        let logged = connector.route_properties(&subscription, true);
        let applied = connector.client_config(&subscription);

        assert!(logged.contains(&("sasl.password", "****".to_string())));
        assert!(logged.contains(&("client.id", "kafka-consumer-route-payments".to_string())));
        assert_eq!(logged.iter().filter(|(k, _)| *k == "group.id").count(), 1);
        assert_eq!(applied.get("sasl.password"), Some("hunter2"));
    }
}
