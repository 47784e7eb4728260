pub mod cache;
pub mod config;
pub mod counters;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod pipeline;
pub mod sink;
pub mod supervisor;

pub use cache::{DashboardStats, RecentRecordCache};
pub use counters::{CounterSnapshot, ProcessingCounters};
pub use error::EngineError;
pub use pipeline::{PipelineContext, ProcessingPipeline};
pub use supervisor::{RouteSet, TopicRouteSupervisor};
