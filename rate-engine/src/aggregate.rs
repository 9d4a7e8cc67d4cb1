use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    catalog::Catalog,
    domain::{DerivedRecord, Utility},
    error::{EngineError, Result},
};

pub const GROUP_ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub fn seconds(self) -> i64 {
        match self {
            Self::ThirtyMinutes => 30 * 60,
            Self::OneHour => 60 * 60,
            Self::OneDay => 24 * 60 * 60,
        }
    }

    /// Start of the UTC-aligned bucket containing `ts`.
    pub fn floor(self, ts: OffsetDateTime) -> Result<OffsetDateTime> {
        let width = self.seconds();
        let start = ts.unix_timestamp().div_euclid(width) * width;
        OffsetDateTime::from_unix_timestamp(start).map_err(|_| EngineError::InstantOutOfRange(ts))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    #[default]
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Meter,
    Site,
    Utility,
}

/// Which per-record figure is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Value,
    Cost,
    Carbon,
}

impl Metric {
    pub fn of(self, record: &DerivedRecord) -> f64 {
        match self {
            Self::Value => record.value,
            Self::Cost => record.cost_amount,
            Self::Carbon => record.carbon_grams,
        }
    }
}

/// Merge-associative running statistics for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// `None` for an empty accumulator.
    pub fn finish(&self, f: AggregateFn) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match f {
            AggregateFn::Sum => self.sum,
            // Always from merged (sum, count), never an average of averages.
            AggregateFn::Avg => self.sum / self.count as f64,
            AggregateFn::Min => self.min,
            AggregateFn::Max => self.max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    #[serde(with = "time::serde::rfc3339")]
    pub bucket_start: OffsetDateTime,
    pub group_key: String,
    pub aggregate: f64,
    pub sample_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatePage {
    pub buckets: Vec<AggregateBucket>,
    pub total_groups: usize,
    pub total_pages: usize,
    pub page: u32,
    pub page_size: u32,
    /// Records dropped because their meter or site could not be resolved.
    pub excluded_records: u64,
    /// Flat daily figure from the tariff; not prorated into any bucket.
    pub standing_charge_per_day: Option<f64>,
}

/// Per-worker partial result; merge any number of these in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialAggregate {
    groups: BTreeMap<(OffsetDateTime, String), Accumulator>,
    excluded: u64,
}

impl PartialAggregate {
    pub fn add(&mut self, bucket_start: OffsetDateTime, group_key: String, x: f64) {
        self.groups.entry((bucket_start, group_key)).or_default().push(x);
    }

    pub fn exclude(&mut self) {
        self.excluded += 1;
    }

    pub fn merge(&mut self, other: Self) {
        for (key, acc) in other.groups {
            self.groups.entry(key).or_default().merge(&acc);
        }
        self.excluded += other.excluded;
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn excluded(&self) -> u64 {
        self.excluded
    }

    /// Reduces every group and returns the requested page.
    ///
    /// Groups are ordered by bucket start, then group key.
    pub fn finish(self, f: AggregateFn, page: u32, page_size: u32) -> Result<AggregatePage> {
        check_pagination(page, page_size)?;

        let total_groups = self.groups.len();
        let page_len = page_size as usize;
        let offset = (page as usize - 1).saturating_mul(page_len);

        // BTreeMap iteration is already (bucket_start, group_key) ascending.
        let buckets = self
            .groups
            .into_iter()
            .skip(offset)
            .take(page_len)
            .filter_map(|((bucket_start, group_key), acc)| {
                acc.finish(f).map(|aggregate| AggregateBucket {
                    bucket_start,
                    group_key,
                    aggregate,
                    sample_count: acc.count,
                })
            })
            .collect();

        Ok(AggregatePage {
            buckets,
            total_groups,
            total_pages: total_groups.div_ceil(page_len),
            page,
            page_size,
            excluded_records: self.excluded,
            standing_charge_per_day: None,
        })
    }
}

pub fn check_pagination(page: u32, page_size: u32) -> Result<()> {
    if page < 1 || page_size < 1 {
        return Err(EngineError::InvalidPagination { page, page_size });
    }
    Ok(())
}

/// Buckets, groups and reduces derived records.
#[derive(Debug, Clone)]
pub struct Aggregator {
    interval: Interval,
    group_by: GroupBy,
    metric: Metric,
    meters: BTreeMap<String, (String, Utility)>,
}

impl Aggregator {
    pub fn new(catalog: &Catalog, interval: Interval, group_by: GroupBy, metric: Metric) -> Self {
        Self {
            interval,
            group_by,
            metric,
            meters: catalog.meter_index(),
        }
    }

    /// `None` when the join the grouping needs cannot be resolved.
    pub fn group_key(&self, meter_id: &str) -> Option<String> {
        match self.group_by {
            GroupBy::None => Some(GROUP_ALL.to_string()),
            GroupBy::Meter => Some(meter_id.to_string()),
            GroupBy::Site => self.meters.get(meter_id).map(|(site, _)| site.clone()),
            GroupBy::Utility => self.meters.get(meter_id).map(|(_, u)| u.to_string()),
        }
    }

    pub fn accumulate(&self, partial: &mut PartialAggregate, record: &DerivedRecord) -> Result<()> {
        let Some(key) = self.group_key(&record.meter_id) else {
            partial.exclude();
            return Ok(());
        };
        let bucket_start = self.interval.floor(record.ts)?;
        partial.add(bucket_start, key, self.metric.of(record));
        Ok(())
    }

    pub fn partial<'r>(&self, records: impl IntoIterator<Item = &'r DerivedRecord>) -> Result<PartialAggregate> {
        let mut partial = PartialAggregate::default();
        for record in records {
            self.accumulate(&mut partial, record)?;
        }
        Ok(partial)
    }

    /// `aggregate(records, interval, aggregateFn, groupBy, page, pageSize)`.
    pub fn aggregate<'r>(
        &self,
        records: impl IntoIterator<Item = &'r DerivedRecord>,
        f: AggregateFn,
        page: u32,
        page_size: u32,
    ) -> Result<AggregatePage> {
        check_pagination(page, page_size)?;
        self.partial(records)?.finish(f, page, page_size)
    }
}
