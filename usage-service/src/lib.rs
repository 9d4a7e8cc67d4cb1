pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod runner;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
pub use runner::run_query;
