use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use courier_api::{
    BrokerClient, BrokerConnector, BrokerError, CommitError, RawRecord, Subscription, now_ms,
};

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// An offset acknowledged by a client, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<RawRecord>>,
    next_offsets: HashMap<(String, i32), i64>,
    commits: Vec<CommittedOffset>,
    failing_commits: HashSet<String>,
    refused_topics: HashSet<String>,
    poll_failures: HashMap<String, usize>,
}

/// In-process broker: per-topic FIFO queues plus a commit log.
///
/// Failure injection covers the three broker-side failure points: connect,
/// poll and commit.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory broker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Append a well-formed record; returns its offset in the partition.
    pub fn publish(&self, topic: &str, partition: i32, key: Option<&str>, body: &str) -> i64 {
        let mut state = self.lock();
        let next = state.next_offsets.entry((topic.to_string(), partition)).or_insert(0);
        let offset = *next;
        *next += 1;

        let mut raw = RawRecord::new(topic, partition, offset)
            .with_timestamp(now_ms())
            .with_body(body);
        raw.key = key.map(str::to_string);

        state.queues.entry(topic.to_string()).or_default().push_back(raw);
        offset
    }

    /// Enqueue an arbitrary raw record, malformed ones included.
    pub fn push_raw(&self, topic: &str, raw: RawRecord) {
        self.lock().queues.entry(topic.to_string()).or_default().push_back(raw);
    }

    /// Records not yet polled from `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.lock().queues.get(topic).map_or(0, VecDeque::len)
    }

    pub fn commits(&self) -> Vec<CommittedOffset> {
        self.lock().commits.clone()
    }

    /// Offset of the last record committed on the partition.
    pub fn committed_offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.lock()
            .commits
            .iter()
            .rev()
            .find(|c| c.topic == topic && c.partition == partition)
            .map(|c| c.offset)
    }

    /// Make every commit on `topic` fail (or succeed again).
    pub fn fail_commits(&self, topic: &str, fail: bool) {
        let mut state = self.lock();
        if fail {
            state.failing_commits.insert(topic.to_string());
        } else {
            state.failing_commits.remove(topic);
        }
    }

    /// Make `MemoryConnector::connect` fail for `topic`.
    pub fn refuse_topic(&self, topic: &str) {
        self.lock().refused_topics.insert(topic.to_string());
    }

    /// Make the next `count` polls on `topic` fail.
    pub fn fail_polls(&self, topic: &str, count: usize) {
        self.lock().poll_failures.insert(topic.to_string(), count);
    }

    pub fn client(self: &Arc<Self>, topic: &str) -> Arc<dyn BrokerClient> {
        Arc::new(MemoryClient {
            broker: self.clone(),
            topic: topic.to_string(),
        })
    }

    fn poll_topic(&self, topic: &str) -> Result<Option<RawRecord>, BrokerError> {
        let mut state = self.lock();
        if let Some(remaining) = state.poll_failures.get_mut(topic) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrokerError::Poll {
                    topic: topic.to_string(),
                    message: "injected poll failure".into(),
                });
            }
        }
        Ok(state.queues.get_mut(topic).and_then(VecDeque::pop_front))
    }

    fn commit_offset(&self, topic: &str, partition: i32, offset: i64) -> Result<(), CommitError> {
        let mut state = self.lock();
        if state.failing_commits.contains(topic) {
            return Err(CommitError::new(topic, partition, offset, "injected commit failure"));
        }
        state.commits.push(CommittedOffset {
            topic: topic.to_string(),
            partition,
            offset,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryClient
// ---------------------------------------------------------------------------

pub struct MemoryClient {
    broker: Arc<MemoryBroker>,
    topic: String,
}

impl BrokerClient for MemoryClient {
    fn poll(&self) -> Pin<Box<dyn Future<Output = Result<Option<RawRecord>, BrokerError>> + Send + '_>> {
        Box::pin(async move { self.broker.poll_topic(&self.topic) })
    }

    fn commit(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommitError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { self.broker.commit_offset(&topic, partition, offset) })
    }
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

pub struct MemoryConnector {
    broker: Arc<MemoryBroker>,
}

impl MemoryConnector {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }
}

impl BrokerConnector for MemoryConnector {
    fn connect(&self, subscription: &Subscription) -> Result<Arc<dyn BrokerClient>, BrokerError> {
        if self.broker.lock().refused_topics.contains(&subscription.topic) {
            return Err(BrokerError::Connect {
                topic: subscription.topic.clone(),
                message: "injected connect failure".into(),
            });
        }
        tracing::debug!(route = %subscription.route_id, topic = %subscription.topic, "memory client connected");
        Ok(self.broker.client(&subscription.topic))
    }
}
