#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    Engine(#[from] courier_engine::EngineError),

    #[error("broker '{0}' is not available in this build")]
    BrokerUnavailable(&'static str),

    #[error("no route could be started")]
    NoRoutes,

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
