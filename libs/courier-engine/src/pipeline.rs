use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courier_api::{
    BrokerClient, CommitError, ErrorSink, InvalidContentError, ProcessingError, RawRecord,
    RecordEnvelope, RecordError, Subscription,
};

use crate::cache::RecentRecordCache;
use crate::config::PipelineSettings;
use crate::counters::ProcessingCounters;
use crate::extractor::MetadataExtractor;
use crate::handler::{RecordHandler, SimulatedWorkload};
use crate::sink::LoggingErrorSink;

/// Collaborators shared by every pipeline. Cloned once per route.
#[derive(Clone)]
pub struct PipelineContext {
    pub cache: Arc<RecentRecordCache>,
    pub counters: Arc<ProcessingCounters>,
    pub sink: Arc<dyn ErrorSink>,
    pub handler: Arc<dyn RecordHandler>,
    pub idle_backoff: Duration,
    pub error_backoff: Duration,
    pub commit_timeout: Duration,
}

impl PipelineContext {
    /// Logging sink and simulated workload wired to the given cache and
    /// counters.
    pub fn new(
        cache: Arc<RecentRecordCache>,
        counters: Arc<ProcessingCounters>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            sink: Arc::new(LoggingErrorSink::new(counters.clone())),
            handler: Arc::new(SimulatedWorkload::new(settings.processing_delay())),
            cache,
            counters,
            idle_backoff: settings.idle_backoff(),
            error_backoff: settings.error_backoff(),
            commit_timeout: settings.commit_timeout(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn RecordHandler>) -> Self {
        self.handler = handler;
        self
    }
}

const GATE_OPEN: u8 = 0;
const GATE_IN_FLIGHT: u8 = 1;
const GATE_CLOSED: u8 = 2;

/// Marks the window between caching a record and reporting its commit.
///
/// A pipeline task may only be aborted after `close` succeeds; once closed,
/// the pipeline caches nothing further.
#[derive(Debug, Default)]
pub(crate) struct CommitGate(AtomicU8);

impl CommitGate {
    fn enter(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn leave(&self) {
        let _ = self
            .0
            .compare_exchange(GATE_IN_FLIGHT, GATE_OPEN, Ordering::AcqRel, Ordering::Acquire);
    }

    /// `false` while a record is between cache insert and commit report.
    pub(crate) fn close(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Consumption loop of one topic: extract → process → cache → commit.
///
/// Records are handled one at a time, so within a partition a commit is
/// always resolved before the next record is started.
pub struct ProcessingPipeline {
    subscription: Subscription,
    client: Arc<dyn BrokerClient>,
    extractor: MetadataExtractor,
    ctx: PipelineContext,
    gate: Arc<CommitGate>,
}

impl ProcessingPipeline {
    pub fn new(subscription: Subscription, client: Arc<dyn BrokerClient>, ctx: PipelineContext) -> Self {
        Self {
            subscription,
            client,
            extractor: MetadataExtractor::new(ctx.counters.clone()),
            ctx,
            gate: Arc::new(CommitGate::default()),
        }
    }

    pub(crate) fn gate(&self) -> Arc<CommitGate> {
        self.gate.clone()
    }

    pub fn route_id(&self) -> &str {
        &self.subscription.route_id
    }

    pub fn topic(&self) -> &str {
        &self.subscription.topic
    }

    /// Take one record through the whole pipeline.
    ///
    /// Every failure is reported to the error sink before it is returned.
    /// The envelope is cached once processing succeeds, even if the commit
    /// then fails.
    pub async fn process_record(&self, raw: RawRecord) -> Result<Arc<RecordEnvelope>, RecordError> {
        let envelope = match self.extractor.extract(&raw) {
            Ok(envelope) => Arc::new(envelope),
            Err(e) => {
                let context = self.extractor.describe(&raw);
                self.ctx.sink.on_extraction_error(&context, &e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.process(&envelope).await {
            self.ctx.sink.on_message_error(&envelope, &e);
            return Err(e);
        }

        if !self.gate.enter() {
            let e = RecordError::from(ProcessingError::new(envelope.id(), "pipeline is shutting down"));
            self.ctx.sink.on_message_error(&envelope, &e);
            return Err(e);
        }
        self.ctx.cache.insert(envelope.clone());
        let committed = self.commit(&envelope).await;
        self.gate.leave();

        match committed {
            Ok(()) => {
                self.ctx.sink.on_commit_confirmed(&envelope);
                tracing::debug!(route = %self.route_id(), id = %envelope.id(), "committed");
                Ok(envelope)
            }
            Err(e) => {
                self.ctx.sink.on_commit_error(&envelope, &e);
                Err(e.into())
            }
        }
    }

    async fn process(&self, envelope: &RecordEnvelope) -> Result<(), RecordError> {
        tracing::info!(route = %self.route_id(), id = %envelope.id(), "processing message");

        if envelope.content().is_empty() {
            return Err(InvalidContentError { record_id: envelope.id().to_string() }.into());
        }
        self.ctx.handler.handle(envelope).await?;
        Ok(())
    }

    async fn commit(&self, envelope: &RecordEnvelope) -> Result<(), CommitError> {
        let pending = self
            .client
            .commit(envelope.topic(), envelope.partition(), envelope.offset());
        match tokio::time::timeout(self.ctx.commit_timeout, pending).await {
            Ok(result) => result,
            Err(_) => Err(CommitError::new(
                envelope.topic(),
                envelope.partition(),
                envelope.offset(),
                format!("commit timed out after {:?}", self.ctx.commit_timeout),
            )),
        }
    }

    /// Poll and process until `token` is cancelled.
    ///
    /// Cancellation is only observed between records. A supervisor abort can
    /// drop a record before it reaches the cache; a cached record always runs
    /// to its commit or failure report.
    pub async fn run(self, token: CancellationToken) {
        let route = self.route_id().to_string();
        tracing::info!(%route, topic = %self.topic(), "pipeline started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                polled = self.client.poll() => polled,
            };

            let pause = match polled {
                Ok(Some(raw)) => {
                    if let Err(e) = self.process_record(raw).await {
                        tracing::warn!(%route, kind = %e.kind(), error = %e, "record not committed, continuing");
                    }
                    continue;
                }
                Ok(None) => self.ctx.idle_backoff,
                Err(e) => {
                    tracing::error!(%route, error = %e, "poll error");
                    self.ctx.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = token.cancelled() => break,
            }
        }

        tracing::info!(%route, "pipeline stopped");
    }
}
