use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    aggregate::{check_pagination, AggregateFn, GroupBy, Interval, Metric},
    domain::Utility,
    error::{EngineError, Result},
};

pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_TARIFF_ID: &str = "tou_elec_v1";
pub const DEFAULT_CARBON_PROFILE_ID: &str = "uk_grid_profile_v1";
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Span used when the query leaves one or both ends of the range open.
pub const DEFAULT_SPAN: Duration = Duration::DAY;

/// Longest range a single query may cover.
pub const MAX_SPAN: Duration = Duration::days(366);

/// Fallbacks for the rule-set and timezone fields of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub tz: String,
    pub tariff_id: String,
    pub carbon_profile_id: String,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            tz: DEFAULT_TIMEZONE.to_string(),
            tariff_id: DEFAULT_TARIFF_ID.to_string(),
            carbon_profile_id: DEFAULT_CARBON_PROFILE_ID.to_string(),
        }
    }
}

/// The aggregation request, as validated by the caller's transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationQuery {
    #[serde(default)]
    pub meter_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub utility: Option<Utility>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub aggregate: AggregateFn,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub tariff_id: Option<String>,
    #[serde(default)]
    pub carbon_profile_id: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for AggregationQuery {
    fn default() -> Self {
        Self {
            meter_id: None,
            site_id: None,
            utility: None,
            from: None,
            to: None,
            interval: Interval::default(),
            aggregate: AggregateFn::default(),
            group_by: GroupBy::default(),
            metric: Metric::default(),
            page: default_page(),
            page_size: default_page_size(),
            tz: None,
            tariff_id: None,
            carbon_profile_id: None,
        }
    }
}

impl AggregationQuery {
    pub fn validate(&self) -> Result<()> {
        check_pagination(self.page, self.page_size)?;
        if self.page_size > MAX_PAGE_SIZE {
            return Err(EngineError::InvalidPagination {
                page: self.page,
                page_size: self.page_size,
            });
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if to < from {
                return Err(EngineError::InvalidRange { from, to });
            }
            if to - from > MAX_SPAN {
                return Err(EngineError::RangeTooLong { from, to });
            }
        }
        Ok(())
    }

    /// Closed `[from, to]` range, filling open ends relative to `now`.
    pub fn time_range(&self, now: OffsetDateTime) -> Result<(OffsetDateTime, OffsetDateTime)> {
        let before = |end: OffsetDateTime| end.checked_sub(DEFAULT_SPAN).ok_or(EngineError::InstantOutOfRange(end));
        let (from, to) = match (self.from, self.to) {
            (Some(from), Some(to)) => (from, to),
            (Some(from), None) => (
                from,
                from.checked_add(DEFAULT_SPAN).ok_or(EngineError::InstantOutOfRange(from))?,
            ),
            (None, Some(to)) => (before(to)?, to),
            (None, None) => (before(now)?, now),
        };
        if to < from {
            return Err(EngineError::InvalidRange { from, to });
        }
        if to - from > MAX_SPAN {
            return Err(EngineError::RangeTooLong { from, to });
        }
        Ok((from, to))
    }

    pub fn tz_or<'a>(&'a self, defaults: &'a QueryDefaults) -> &'a str {
        self.tz.as_deref().unwrap_or(&defaults.tz)
    }

    pub fn tariff_id_or<'a>(&'a self, defaults: &'a QueryDefaults) -> &'a str {
        self.tariff_id.as_deref().unwrap_or(&defaults.tariff_id)
    }

    pub fn carbon_profile_id_or<'a>(&'a self, defaults: &'a QueryDefaults) -> &'a str {
        self.carbon_profile_id.as_deref().unwrap_or(&defaults.carbon_profile_id)
    }

    /// Stable digest of the query with defaults applied and the range resolved
    /// against `now`, for result caching.
    pub fn cache_key(&self, defaults: &QueryDefaults, now: OffsetDateTime) -> Result<String> {
        let (from, to) = self.time_range(now)?;
        let mut h = blake3::Hasher::new();
        hash_opt_str(&mut h, self.meter_id.as_deref());
        hash_opt_str(&mut h, self.site_id.as_deref());
        hash_opt_str(&mut h, self.utility.map(Utility::as_str));
        hash_ts(&mut h, from);
        hash_ts(&mut h, to);
        h.update(&[self.interval as u8, self.aggregate as u8, self.group_by as u8, self.metric as u8]);
        h.update(&self.page.to_le_bytes());
        h.update(&self.page_size.to_le_bytes());
        hash_str(&mut h, self.tz_or(defaults));
        hash_str(&mut h, self.tariff_id_or(defaults));
        hash_str(&mut h, self.carbon_profile_id_or(defaults));
        Ok(h.finalize().to_hex().to_string())
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_opt_str(hasher: &mut blake3::Hasher, s: Option<&str>) {
    match s {
        Some(v) => {
            hasher.update(&[1]);
            hash_str(hasher, v);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_ts(hasher: &mut blake3::Hasher, ts: OffsetDateTime) {
    hasher.update(&ts.unix_timestamp_nanos().to_le_bytes());
}
