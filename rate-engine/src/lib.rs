//! Resolves per-reading prices and carbon intensities from time-of-use rule sets
//! and aggregates the results into paginated, grouped buckets.

pub mod aggregate;
pub mod catalog;
pub mod derive;
pub mod domain;
pub mod engine;
pub mod error;
pub mod local_time;
pub mod query;
pub mod resolver;
pub mod synth;
pub mod window;

pub use aggregate::{AggregateBucket, AggregateFn, AggregatePage, Aggregator, GroupBy, Interval, Metric, PartialAggregate};
pub use catalog::Catalog;
pub use derive::CostCarbonComputer;
pub use engine::{Engine, QueryPlan};
pub use error::{EngineError, Result};
pub use query::{AggregationQuery, QueryDefaults};
pub use resolver::{CarbonResolver, RateResolver};
pub use synth::ReadingSynthesizer;
