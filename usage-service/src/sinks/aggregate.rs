use std::sync::Arc;

use futures::StreamExt;
use rate_engine::{domain::Reading, AggregatePage, PartialAggregate, QueryPlan};
use tokio::sync::mpsc;

use crate::{
    metrics_server::{EXCLUDED_RECORDS, READINGS_DERIVED},
    pipeline::{Envelope, PipelineError, Sink},
};

fn shard_index(key: &str, workers: usize) -> usize {
    use std::hash::{Hash, Hasher};

    let mut h = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut h);
    (h.finish() as usize) % workers.max(1)
}

/// Derives and aggregates readings on `workers` tasks, sharded by meter id,
/// then merges the partial aggregates into one page.
pub struct AggregateSink {
    plan: Arc<QueryPlan>,
    workers: usize,
    channel_capacity: usize,
}

impl AggregateSink {
    pub fn new(plan: Arc<QueryPlan>, workers: usize, channel_capacity: usize) -> Self {
        Self {
            plan,
            workers: workers.max(1),
            channel_capacity: channel_capacity.max(1),
        }
    }
}

async fn derive_worker(plan: Arc<QueryPlan>, mut rx: mpsc::Receiver<Envelope<Reading>>) -> Result<PartialAggregate, PipelineError> {
    let computer = plan.computer();
    let mut partial = PartialAggregate::default();
    let mut derived = 0u64;

    while let Some(env) = rx.recv().await {
        let record = computer.derive(&env.payload)?;
        plan.accumulate(&mut partial, &record)?;
        derived += 1;
    }

    metrics::counter!(READINGS_DERIVED).increment(derived);
    Ok(partial)
}

#[async_trait::async_trait]
impl Sink<Reading> for AggregateSink {
    type Output = AggregatePage;

    async fn run<S>(&self, mut input: S) -> Result<AggregatePage, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut txs = Vec::with_capacity(self.workers);
        let mut joins = Vec::with_capacity(self.workers);

        for _ in 0..self.workers {
            let (tx, rx) = mpsc::channel::<Envelope<Reading>>(self.channel_capacity);
            txs.push(tx);
            joins.push(tokio::spawn(derive_worker(self.plan.clone(), rx)));
        }

        let mut skipped = 0u64;
        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(PipelineError::Transform(e)) => {
                    tracing::warn!(error = %e, "dropping invalid reading");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !self.plan.admits(&env.payload) {
                skipped += 1;
                continue;
            }

            let idx = shard_index(&env.payload.meter_id, self.workers);
            if txs[idx].send(env).await.is_err() {
                // The worker stopped early; its join result carries the reason.
                break;
            }
        }

        drop(txs);

        let mut merged = PartialAggregate::default();
        for j in joins {
            match j.await {
                Ok(Ok(partial)) => merged.merge(partial),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(PipelineError::Sink(format!("derive worker join error: {e}"))),
            }
        }

        if merged.excluded() > 0 {
            metrics::counter!(EXCLUDED_RECORDS).increment(merged.excluded());
            tracing::warn!(excluded = merged.excluded(), "records with unresolved meter or site left out of groups");
        }
        tracing::debug!(skipped, groups = merged.group_count(), "aggregation complete");

        Ok(self.plan.finish(merged)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rate_engine::{AggregationQuery, Catalog, Engine, GroupBy, Interval, QueryDefaults};
    use time::macros::datetime;

    fn engine() -> Engine {
        Engine::new(Catalog::demo(), QueryDefaults::default())
    }

    fn query() -> AggregationQuery {
        AggregationQuery {
            from: Some(datetime!(2025-09-15 00:00:00 UTC)),
            to: Some(datetime!(2025-09-22 00:00:00 UTC)),
            interval: Interval::OneDay,
            group_by: GroupBy::Utility,
            metric: rate_engine::Metric::Cost,
            ..Default::default()
        }
    }

    #[test]
    fn shard_index_is_stable_and_bounded() {
        assert_eq!(shard_index("m1", 4), shard_index("m1", 4));
        assert!(shard_index("m3", 3) < 3);
        assert_eq!(shard_index("anything", 0), 0);
    }

    #[tokio::test]
    async fn parallel_result_matches_sequential_engine() {
        let engine = engine();
        let now = datetime!(2025-09-22 00:00:00 UTC);
        let plan = engine.plan(&query(), now).unwrap();
        let readings = engine.synthesize(&plan, Some(11)).unwrap();
        let expected = engine.run(&query(), Some(readings.as_slice()), now, None).unwrap();

        let sink = AggregateSink::new(Arc::new(plan), 3, 8);
        let input = futures::stream::iter(readings.into_iter().map(|r| Ok(Envelope::now(r))));
        let page = sink.run(input).await.unwrap();

        assert_eq!(page.total_groups, expected.total_groups);
        assert_eq!(page.standing_charge_per_day, Some(0.45));
        for (a, b) in page.buckets.iter().zip(&expected.buckets) {
            assert_eq!((a.bucket_start, &a.group_key, a.sample_count), (b.bucket_start, &b.group_key, b.sample_count));
            assert!((a.aggregate - b.aggregate).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn invalid_readings_are_dropped_but_source_errors_abort() {
        let plan = Arc::new(engine().plan(&query(), datetime!(2025-09-22 00:00:00 UTC)).unwrap());
        let good = Reading {
            meter_id: "m1".to_string(),
            ts: datetime!(2025-09-16 12:00:00 UTC),
            value: 1.0,
            unit: "kWh".to_string(),
        };

        let input = futures::stream::iter(vec![
            Err(PipelineError::Transform("negative".to_string())),
            Ok(Envelope::now(good.clone())),
        ]);
        let page = AggregateSink::new(plan.clone(), 2, 4).run(input).await.unwrap();
        assert_eq!(page.buckets.len(), 1);
        assert_eq!(page.buckets[0].aggregate, 0.28);

        let input = futures::stream::iter(vec![
            Ok(Envelope::now(good)),
            Err(PipelineError::Source("disk on fire".to_string())),
        ]);
        let err = AggregateSink::new(plan, 2, 4).run(input).await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }
}
