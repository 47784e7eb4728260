use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{BrokerError, CommitError};
use crate::record::RawRecord;

/// One topic consumed by one route under the shared consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub topic: String,
    pub route_id: String,
    pub group_id: String,
}

/// Consumer side of a broker, bound to a single topic.
///
/// Commits are manual: nothing is acknowledged until `commit` succeeds.
pub trait BrokerClient: Send + Sync {
    /// Next record for this client's topic, or `None` when nothing is
    /// available right now.
    fn poll(&self) -> Pin<Box<dyn Future<Output = Result<Option<RawRecord>, BrokerError>> + Send + '_>>;

    /// Acknowledge `offset` (the offset of the processed record) on
    /// `partition`.
    fn commit(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), CommitError>> + Send + '_>>;
}

/// Creates a broker client per route.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self, subscription: &Subscription) -> Result<Arc<dyn BrokerClient>, BrokerError>;
}
