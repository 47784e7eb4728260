use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_api::BrokerConnector;
use courier_api_server::AppState;
use courier_broker_memory::{MemoryBroker, MemoryConnector};
use courier_engine::config::{BrokerKind, CourierConfig, KafkaSettings};
use courier_engine::{PipelineContext, ProcessingCounters, RecentRecordCache, TopicRouteSupervisor};

use crate::config::ConfigArgs;
use crate::error::ServerError;

pub async fn run(args: ConfigArgs) -> Result<(), ServerError> {
    tracing::info!("courier-server starting");

    // --- Load config ---
    let config = CourierConfig::load(&args.config)?;
    tracing::info!(config = %args.config, broker = ?config.broker, "loaded config");

    let token = CancellationToken::new();

    // --- Shared state ---
    let cache = Arc::new(RecentRecordCache::new(config.cache.capacity));
    let counters = Arc::new(ProcessingCounters::new());
    let ctx = PipelineContext::new(cache.clone(), counters.clone(), &config.pipeline);

    // --- Routes ---
    let connector = connector(&config)?;
    let subscriptions = TopicRouteSupervisor::plan(&config.kafka)?;
    let routes = TopicRouteSupervisor::start(subscriptions, connector.as_ref(), &ctx, &token);

    if routes.is_empty() {
        return Err(ServerError::NoRoutes);
    }
    if !routes.failures().is_empty() {
        tracing::warn!(
            failed = routes.failures().len(),
            running = routes.route_ids().len(),
            "some routes failed to start"
        );
    }

    // --- API server ---
    let state = AppState {
        cache,
        counters: counters.clone(),
        routes: Arc::new(routes.subscriptions()),
    };
    let api_port = config.api_port;
    let api_token = token.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = courier_api_server::run(api_port, state, api_token).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    tracing::info!(routes = ?routes.route_ids(), "server ready");

    // --- Wait for Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    routes.shutdown(config.pipeline.shutdown_drain()).await;

    token.cancel();
    let _ = api_handle.await;

    let totals = counters.snapshot();
    tracing::info!(processed = totals.processed, errors = totals.errors, "shutdown complete");
    Ok(())
}

fn connector(config: &CourierConfig) -> Result<Box<dyn BrokerConnector>, ServerError> {
    match config.broker {
        BrokerKind::Memory => {
            tracing::warn!("using in-memory broker, nothing will be consumed from kafka");
            Ok(Box::new(MemoryConnector::new(Arc::new(MemoryBroker::new()))))
        }
        BrokerKind::Kafka => kafka_connector(&config.kafka),
    }
}

#[cfg(feature = "kafka")]
fn kafka_connector(settings: &KafkaSettings) -> Result<Box<dyn BrokerConnector>, ServerError> {
    Ok(Box::new(courier_broker_kafka::KafkaConnector::new(settings.clone())))
}

#[cfg(not(feature = "kafka"))]
fn kafka_connector(_settings: &KafkaSettings) -> Result<Box<dyn BrokerConnector>, ServerError> {
    Err(ServerError::BrokerUnavailable("kafka"))
}
