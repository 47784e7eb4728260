use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    /// HTTP API port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Broker client implementation.
    #[serde(default)]
    pub broker: BrokerKind,

    #[serde(default)]
    pub kafka: KafkaSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

fn default_api_port() -> u16 {
    8080
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            broker: BrokerKind::default(),
            kafka: KafkaSettings::default(),
            pipeline: PipelineSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl CourierConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.kafka.validate().map_err(|e| e.with_context("kafka"))?;
        if self.cache.capacity == 0 {
            return Err(EngineError::Config("cache: capacity must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Kafka,
    /// In-process broker, nothing is consumed unless fed programmatically.
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

// ---------------------------------------------------------------------------
// Kafka consumer settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Legacy single topic, used only when nothing else is configured.
    #[serde(default = "default_topic")]
    pub topic: Option<String>,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub topic1: Option<String>,
    #[serde(default)]
    pub topic2: Option<String>,
    #[serde(default)]
    pub topic3: Option<String>,
    #[serde(default)]
    pub topic4: Option<String>,
    #[serde(default)]
    pub topic5: Option<String>,

    #[serde(default)]
    pub auto_offset_reset: OffsetReset,
    /// Must stay `false`: offsets are committed by the pipeline only.
    #[serde(default)]
    pub enable_auto_commit: bool,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u32,
    #[serde(default = "default_max_poll_records")]
    pub max_poll_records: u32,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u32,

    #[serde(default)]
    pub security: Option<SecuritySettings>,
    #[serde(default)]
    pub schema_registry: Option<SchemaRegistrySettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecuritySettings {
    pub protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRegistrySettings {
    pub url: String,
    /// `user:secret` for basic auth.
    #[serde(default)]
    pub basic_auth_user_info: Option<String>,
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".into()
}
fn default_group_id() -> String {
    "courier-consumer-group".into()
}
fn default_topic() -> Option<String> {
    Some("test-topic".into())
}
fn default_topics() -> Vec<String> {
    vec!["test-topic".into()]
}
fn default_session_timeout_ms() -> u32 {
    30_000
}
fn default_max_poll_records() -> u32 {
    10
}
fn default_max_poll_interval_ms() -> u32 {
    300_000
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            group_id: default_group_id(),
            topic: default_topic(),
            topics: default_topics(),
            topic1: None,
            topic2: None,
            topic3: None,
            topic4: None,
            topic5: None,
            auto_offset_reset: OffsetReset::default(),
            enable_auto_commit: false,
            session_timeout_ms: default_session_timeout_ms(),
            max_poll_records: default_max_poll_records(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            security: None,
            schema_registry: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl KafkaSettings {
    /// Effective topic set: the `topics` list, then the individual slots not
    /// already present, then the legacy `topic` if nothing else is set.
    pub fn all_topics(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();

        for topic in &self.topics {
            let topic = topic.trim();
            if !topic.is_empty() && !all.iter().any(|t| t == topic) {
                all.push(topic.to_string());
            }
        }

        let slots = [&self.topic1, &self.topic2, &self.topic3, &self.topic4, &self.topic5];
        for slot in slots {
            if let Some(topic) = non_blank(slot) {
                if !all.iter().any(|t| t == topic) {
                    all.push(topic.to_string());
                }
            }
        }

        if all.is_empty() {
            if let Some(topic) = non_blank(&self.topic) {
                all.push(topic.to_string());
            }
        }

        all
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.enable_auto_commit {
            return Err(EngineError::Config(
                "enable_auto_commit must be false, offsets are committed manually".into(),
            ));
        }
        if self.bootstrap_servers.trim().is_empty() {
            return Err(EngineError::Config("bootstrap_servers is empty".into()));
        }
        if self.group_id.trim().is_empty() {
            return Err(EngineError::Config("group_id is empty".into()));
        }
        if self.all_topics().is_empty() {
            return Err(EngineError::Config("no topics configured".into()));
        }
        if self.max_poll_records == 0 {
            return Err(EngineError::Config("max_poll_records must be at least 1".into()));
        }
        Ok(())
    }

    /// Broker client properties for a consumer of this group.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("group.id", self.group_id.clone()),
            ("auto.offset.reset", self.auto_offset_reset.as_str().to_string()),
            ("enable.auto.commit", "false".to_string()),
            ("session.timeout.ms", self.session_timeout_ms.to_string()),
            ("max.poll.interval.ms", self.max_poll_interval_ms.to_string()),
            ("queued.min.messages", self.max_poll_records.to_string()),
        ];

        if let Some(security) = &self.security {
            if let Some(protocol) = non_blank(&security.protocol) {
                props.push(("security.protocol", protocol.to_string()));
            }
            if let Some(mechanism) = non_blank(&security.sasl_mechanism) {
                props.push(("sasl.mechanism", mechanism.to_string()));
            }
            if let Some(username) = non_blank(&security.sasl_username) {
                props.push(("sasl.username", username.to_string()));
            }
            if let Some(password) = security.sasl_password.as_ref().filter(|p| !p.is_empty()) {
                props.push(("sasl.password", password.clone()));
            }
        }

        props
    }

    /// Same as `client_properties` with secrets masked, for logging.
    pub fn redacted_properties(&self) -> Vec<(&'static str, String)> {
        self.client_properties()
            .into_iter()
            .map(|(k, v)| if k == "sasl.password" { (k, "****".to_string()) } else { (k, v) })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pipeline and cache settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Simulated business work per record.
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,
    /// Pause after a poll that returned nothing.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    /// Pause after a failed poll.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// How long shutdown waits for pipelines before aborting them.
    #[serde(default = "default_shutdown_drain_ms")]
    pub shutdown_drain_ms: u64,
    /// Upper bound on a single offset commit; expiry is a commit failure.
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,
}

fn default_processing_delay_ms() -> u64 {
    100
}
fn default_idle_backoff_ms() -> u64 {
    100
}
fn default_error_backoff_ms() -> u64 {
    1_000
}
fn default_shutdown_drain_ms() -> u64 {
    5_000
}
fn default_commit_timeout_ms() -> u64 {
    10_000
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            processing_delay_ms: default_processing_delay_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            shutdown_drain_ms: default_shutdown_drain_ms(),
            commit_timeout_ms: default_commit_timeout_ms(),
        }
    }
}

impl PipelineSettings {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_millis(self.shutdown_drain_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}
