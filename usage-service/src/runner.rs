use std::{path::PathBuf, sync::Arc, time::Instant};

use rate_engine::{domain::Reading, AggregatePage, AggregationQuery, Engine};
use time::OffsetDateTime;

use crate::{
    config::EngineConfig,
    metrics_server::QUERY_DURATION,
    pipeline::{EnvelopeStream, Pipeline, PipelineError, Source},
    sinks::AggregateSink,
    sources::{ReadingCsvFileSource, SyntheticReadingSource},
    transform::ReadingValidation,
};

/// Where a query's readings come from.
pub enum ReadingSource {
    Synthetic(SyntheticReadingSource),
    Csv(ReadingCsvFileSource),
}

#[async_trait::async_trait]
impl Source<Reading> for ReadingSource {
    async fn stream(&self) -> EnvelopeStream<Reading> {
        match self {
            Self::Synthetic(s) => s.stream().await,
            Self::Csv(s) => s.stream().await,
        }
    }
}

/// Runs one aggregation query through the source → validation → aggregate pipeline.
///
/// Without `readings_csv`, readings are synthesized for the catalog meters the query selects.
pub async fn run_query(
    engine: &Engine,
    cfg: &EngineConfig,
    query: &AggregationQuery,
    readings_csv: Option<PathBuf>,
    now: OffsetDateTime,
) -> Result<AggregatePage, PipelineError> {
    let started = Instant::now();
    let plan = Arc::new(engine.plan(query, now)?);

    let source = match readings_csv {
        Some(path) => ReadingSource::Csv(ReadingCsvFileSource::new(path, engine.catalog().clone())),
        None => ReadingSource::Synthetic(SyntheticReadingSource::for_plan(&plan, cfg.noise_seed)),
    };

    let pipeline: Pipeline<_, Reading, _> = Pipeline {
        source,
        transforms: vec![Arc::new(ReadingValidation)],
        sink: AggregateSink::new(plan, cfg.workers, cfg.channel_capacity),
    };

    let page = pipeline.run().await?;
    let cache_key = query.cache_key(engine.defaults(), now)?;

    let elapsed = started.elapsed();
    metrics::histogram!(QUERY_DURATION).record(elapsed.as_secs_f64());
    tracing::info!(
        cache_key = %cache_key,
        groups = page.total_groups,
        excluded = page.excluded_records,
        elapsed_ms = elapsed.as_millis() as u64,
        "query complete"
    );

    Ok(page)
}
