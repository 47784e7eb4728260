use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use courier_api::{BrokerConnector, BrokerError, Subscription};

use crate::config::KafkaSettings;
use crate::error::EngineError;
use crate::pipeline::{CommitGate, PipelineContext, ProcessingPipeline};

const ROUTE_PREFIX: &str = "kafka-consumer-route-";

/// Route id for a topic: every non-alphanumeric character becomes `-`.
pub fn route_id(topic: &str) -> String {
    let safe: String = topic
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{ROUTE_PREFIX}{safe}")
}

/// One running pipeline.
struct RouteSlot {
    subscription: Subscription,
    token: CancellationToken,
    gate: Arc<CommitGate>,
    handle: JoinHandle<()>,
}

/// A route that could not be started.
#[derive(Debug)]
pub struct RouteFailure {
    pub subscription: Subscription,
    pub error: BrokerError,
}

/// Starts one independent pipeline per configured topic.
pub struct TopicRouteSupervisor;

impl TopicRouteSupervisor {
    /// Validated subscriptions, one per topic, in configuration order.
    pub fn plan(settings: &KafkaSettings) -> Result<Vec<Subscription>, EngineError> {
        settings.validate().map_err(|e| e.with_context("kafka"))?;

        let topics = settings.all_topics();
        tracing::info!(count = topics.len(), topics = ?topics, "configuring kafka consumers");

        let mut subscriptions: Vec<Subscription> = Vec::with_capacity(topics.len());
        for topic in topics {
            let base = route_id(&topic);
            let mut id = base.clone();
            let mut n = 2;
            while subscriptions.iter().any(|s| s.route_id == id) {
                id = format!("{base}-{n}");
                n += 1;
            }
            subscriptions.push(Subscription {
                topic,
                route_id: id,
                group_id: settings.group_id.clone(),
            });
        }
        Ok(subscriptions)
    }

    /// Connect and spawn a pipeline for every subscription.
    ///
    /// A route that fails to connect is recorded in the returned set and
    /// does not stop the others.
    pub fn start(
        subscriptions: Vec<Subscription>,
        connector: &dyn BrokerConnector,
        ctx: &PipelineContext,
        token: &CancellationToken,
    ) -> RouteSet {
        let mut set = RouteSet::default();

        for subscription in subscriptions {
            let client = match connector.connect(&subscription) {
                Ok(client) => client,
                Err(error) => {
                    tracing::error!(
                        route = %subscription.route_id,
                        topic = %subscription.topic,
                        error = %error,
                        "failed to start route"
                    );
                    set.failures.push(RouteFailure { subscription, error });
                    continue;
                }
            };

            let route_token = token.child_token();
            let pipeline = ProcessingPipeline::new(subscription.clone(), client, ctx.clone());
            let gate = pipeline.gate();
            let handle = tokio::spawn(pipeline.run(route_token.clone()));

            tracing::info!(
                route = %subscription.route_id,
                topic = %subscription.topic,
                group = %subscription.group_id,
                "spawned route"
            );
            set.routes.push(RouteSlot {
                subscription,
                token: route_token,
                gate,
                handle,
            });
        }

        set
    }
}

/// Running routes, addressable by route id.
#[derive(Default)]
pub struct RouteSet {
    routes: Vec<RouteSlot>,
    failures: Vec<RouteFailure>,
}

impl std::fmt::Debug for RouteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSet")
            .field("routes", &self.route_ids())
            .field("failures", &self.failures)
            .finish()
    }
}

impl RouteSet {
    pub fn route_ids(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.subscription.route_id.clone()).collect()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.routes.iter().map(|r| r.subscription.clone()).collect()
    }

    pub fn failures(&self) -> &[RouteFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn is_running(&self, route_id: &str) -> bool {
        self.routes
            .iter()
            .any(|r| r.subscription.route_id == route_id && !r.handle.is_finished())
    }

    /// Stop a single route and wait for its pipeline to finish.
    /// Returns `false` if no such route exists.
    pub async fn stop_route(&mut self, route_id: &str) -> bool {
        let Some(idx) = self.routes.iter().position(|r| r.subscription.route_id == route_id) else {
            return false;
        };
        let slot = self.routes.remove(idx);
        slot.token.cancel();
        if let Err(e) = slot.handle.await {
            tracing::error!(route = %route_id, error = %e, "route task failed");
        }
        tracing::info!(route = %route_id, "route stopped");
        true
    }

    /// Cancel every route, wait up to `drain`, then abort the rest.
    ///
    /// A route that is still committing a cached record is never aborted;
    /// it is awaited until its commit resolves or times out.
    pub async fn shutdown(self, drain: Duration) {
        for slot in &self.routes {
            slot.token.cancel();
        }

        let deadline = tokio::time::Instant::now() + drain;
        for slot in self.routes {
            let route = slot.subscription.route_id;
            let mut handle = slot.handle;
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(%route, error = %e, "route task failed"),
                Err(_) if slot.gate.close() => {
                    tracing::warn!(%route, "route did not stop in time, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
                Err(_) => {
                    tracing::warn!(%route, "route is finishing an in-flight commit");
                    if let Err(e) = handle.await {
                        tracing::error!(%route, error = %e, "route task failed");
                    }
                }
            }
        }
        tracing::info!("all routes shut down");
    }
}
