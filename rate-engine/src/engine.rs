use std::collections::BTreeMap;

use chrono_tz::Tz;
use time::OffsetDateTime;

use crate::{
    aggregate::{AggregateFn, AggregatePage, Aggregator, PartialAggregate},
    catalog::Catalog,
    derive::CostCarbonComputer,
    domain::{DerivedRecord, Meter, Reading, RuleSet, Utility},
    error::Result,
    local_time,
    query::{AggregationQuery, QueryDefaults},
    synth::ReadingSynthesizer,
};

/// A query resolved against a catalog: everything a worker needs, owned.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    tz: Tz,
    tariff: RuleSet,
    carbon_profile: RuleSet,
    from: OffsetDateTime,
    to: OffsetDateTime,
    meter_id: Option<String>,
    site_id: Option<String>,
    utility: Option<Utility>,
    meters: BTreeMap<String, Meter>,
    aggregator: Aggregator,
    aggregate: AggregateFn,
    page: u32,
    page_size: u32,
}

impl QueryPlan {
    pub fn new(catalog: &Catalog, query: &AggregationQuery, defaults: &QueryDefaults, now: OffsetDateTime) -> Result<Self> {
        query.validate()?;
        let tz = local_time::parse_timezone(query.tz_or(defaults))?;
        let tariff = catalog.tariff(query.tariff_id_or(defaults))?.clone();
        let carbon_profile = catalog.carbon_profile(query.carbon_profile_id_or(defaults))?.clone();
        let (from, to) = query.time_range(now)?;

        Ok(Self {
            tz,
            tariff,
            carbon_profile,
            from,
            to,
            meter_id: query.meter_id.clone(),
            site_id: query.site_id.clone(),
            utility: query.utility,
            meters: catalog.meters.iter().map(|m| (m.id.clone(), m.clone())).collect(),
            aggregator: Aggregator::new(catalog, query.interval, query.group_by, query.metric),
            aggregate: query.aggregate,
            page: query.page,
            page_size: query.page_size,
        })
    }

    pub fn range(&self) -> (OffsetDateTime, OffsetDateTime) {
        (self.from, self.to)
    }

    fn admits_meter(&self, meter_id: &str) -> bool {
        if self.meter_id.as_deref().is_some_and(|id| id != meter_id) {
            return false;
        }
        if self.site_id.is_none() && self.utility.is_none() {
            return true;
        }
        // Site and utility filters need the catalog entry.
        let Some(meter) = self.meters.get(meter_id) else {
            return false;
        };
        self.site_id.as_deref().map_or(true, |site| meter.site_id == site)
            && self.utility.map_or(true, |u| meter.utility == u)
    }

    /// Whether a reading falls inside the query's range and meter filters.
    pub fn admits(&self, reading: &Reading) -> bool {
        reading.ts >= self.from && reading.ts <= self.to && self.admits_meter(&reading.meter_id)
    }

    /// Catalog meters the query selects, in id order.
    pub fn meters_in_scope(&self) -> impl Iterator<Item = &Meter> {
        self.meters.values().filter(|m| self.admits_meter(&m.id))
    }

    pub fn computer(&self) -> CostCarbonComputer<'_> {
        CostCarbonComputer::new(&self.tariff, &self.carbon_profile, self.tz)
    }

    pub fn derive(&self, reading: &Reading) -> Result<DerivedRecord> {
        self.computer().derive(reading)
    }

    pub fn accumulate(&self, partial: &mut PartialAggregate, record: &DerivedRecord) -> Result<()> {
        self.aggregator.accumulate(partial, record)
    }

    pub fn finish(&self, partial: PartialAggregate) -> Result<AggregatePage> {
        let mut page = partial.finish(self.aggregate, self.page, self.page_size)?;
        page.standing_charge_per_day = self.tariff.daily_charge;
        Ok(page)
    }
}

/// Single-threaded entry point over an explicit catalog.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    catalog: Catalog,
    defaults: QueryDefaults,
}

impl Engine {
    pub fn new(catalog: Catalog, defaults: QueryDefaults) -> Self {
        Self { catalog, defaults }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    pub fn plan(&self, query: &AggregationQuery, now: OffsetDateTime) -> Result<QueryPlan> {
        QueryPlan::new(&self.catalog, query, &self.defaults, now)
    }

    /// Synthesizes readings for every catalog meter the plan selects.
    pub fn synthesize(&self, plan: &QueryPlan, seed: Option<u64>) -> Result<Vec<Reading>> {
        let (from, to) = plan.range();
        let mut synth = ReadingSynthesizer::new(seed);
        let mut readings = Vec::new();
        for meter in plan.meters_in_scope() {
            readings.extend(synth.generate(&meter.id, meter.utility, from, to)?);
        }
        Ok(readings)
    }

    /// Runs a query end to end. Without `readings`, synthetic ones are generated.
    pub fn run(
        &self,
        query: &AggregationQuery,
        readings: Option<&[Reading]>,
        now: OffsetDateTime,
        seed: Option<u64>,
    ) -> Result<AggregatePage> {
        let plan = self.plan(query, now)?;
        let synthesized;
        let readings: &[Reading] = match readings {
            Some(r) => r,
            None => {
                synthesized = self.synthesize(&plan, seed)?;
                &synthesized
            }
        };

        let computer = plan.computer();
        let mut partial = PartialAggregate::default();
        for reading in readings.iter().filter(|r| plan.admits(r)) {
            let record = computer.derive(reading)?;
            plan.accumulate(&mut partial, &record)?;
        }
        if partial.excluded() > 0 {
            tracing::debug!(excluded = partial.excluded(), "records excluded from grouping");
        }
        plan.finish(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::{GroupBy, Interval, Metric},
        error::EngineError,
    };
    use time::macros::datetime;

    fn reading(meter_id: &str, ts: OffsetDateTime, value: f64) -> Reading {
        Reading {
            meter_id: meter_id.to_string(),
            ts,
            value,
            unit: "kWh".to_string(),
        }
    }

    fn engine() -> Engine {
        Engine::new(Catalog::demo(), QueryDefaults::default())
    }

    const NOW: OffsetDateTime = datetime!(2025-09-17 00:00:00 UTC);

    #[test]
    fn cost_sum_over_supplied_readings() {
        let readings = vec![
            // 13:00 BST Tuesday, peak.
            reading("m1", datetime!(2025-09-16 12:00:00 UTC), 2.0),
            // 23:30 BST Tuesday, off-peak.
            reading("m1", datetime!(2025-09-16 22:30:00 UTC), 1.0),
        ];
        let query = AggregationQuery {
            from: Some(datetime!(2025-09-16 00:00:00 UTC)),
            to: Some(datetime!(2025-09-17 00:00:00 UTC)),
            interval: Interval::OneDay,
            metric: Metric::Cost,
            ..Default::default()
        };

        let page = engine().run(&query, Some(readings.as_slice()), NOW, None).unwrap();
        assert_eq!(page.buckets.len(), 1);
        assert!((page.buckets[0].aggregate - (2.0 * 0.28 + 0.18)).abs() < 1e-12);
        assert_eq!(page.standing_charge_per_day, Some(0.45));
    }

    #[test]
    fn readings_outside_range_or_filters_are_ignored() {
        let readings = vec![
            reading("m1", datetime!(2025-09-16 12:00:00 UTC), 1.0),
            reading("m3", datetime!(2025-09-16 12:00:00 UTC), 1.0),
            reading("m1", datetime!(2025-09-18 12:00:00 UTC), 1.0),
        ];
        let query = AggregationQuery {
            site_id: Some("site_london".to_string()),
            from: Some(datetime!(2025-09-16 00:00:00 UTC)),
            to: Some(datetime!(2025-09-17 00:00:00 UTC)),
            interval: Interval::OneDay,
            ..Default::default()
        };

        let page = engine().run(&query, Some(readings.as_slice()), NOW, None).unwrap();
        assert_eq!(page.buckets[0].sample_count, 1);
    }

    #[test]
    fn synthesizes_catalog_meters_when_no_readings_given() {
        let query = AggregationQuery {
            utility: Some(Utility::Electricity),
            from: Some(datetime!(2025-01-01 00:00:00 UTC)),
            to: Some(datetime!(2025-01-01 01:00:00 UTC)),
            group_by: GroupBy::Meter,
            ..Default::default()
        };

        let page = engine().run(&query, None, NOW, Some(9)).unwrap();
        let keys: Vec<_> = page.buckets.iter().map(|b| b.group_key.as_str()).collect();
        // Two electricity meters, three 30-minute buckets each.
        assert_eq!(keys, vec!["m1", "m3", "m1", "m3", "m1", "m3"]);
        assert!(page.buckets.iter().all(|b| b.sample_count == 1));

        let again = engine().run(&query, None, NOW, Some(9)).unwrap();
        assert_eq!(page, again);
    }

    #[test]
    fn unknown_rule_set_and_timezone_fail_the_query() {
        let bad_tariff = AggregationQuery { tariff_id: Some("nope".to_string()), ..Default::default() };
        assert_eq!(
            engine().run(&bad_tariff, None, NOW, None).unwrap_err(),
            EngineError::UnknownRuleSetId("nope".to_string())
        );

        let bad_tz = AggregationQuery { tz: Some("Not/AZone".to_string()), ..Default::default() };
        assert!(matches!(engine().run(&bad_tz, None, NOW, None), Err(EngineError::InvalidTimezone(_))));
    }

    #[test]
    fn unknown_meters_count_as_excluded_when_grouping_by_site() {
        let readings = vec![
            reading("m1", datetime!(2025-09-16 12:00:00 UTC), 1.0),
            reading("stray", datetime!(2025-09-16 12:00:00 UTC), 1.0),
        ];
        let query = AggregationQuery {
            from: Some(datetime!(2025-09-16 00:00:00 UTC)),
            to: Some(datetime!(2025-09-17 00:00:00 UTC)),
            group_by: GroupBy::Site,
            ..Default::default()
        };

        let page = engine().run(&query, Some(readings.as_slice()), NOW, None).unwrap();
        assert_eq!(page.excluded_records, 1);
        assert_eq!(page.total_groups, 1);
    }
}
