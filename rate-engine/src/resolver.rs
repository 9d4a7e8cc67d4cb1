use chrono_tz::Tz;
use time::OffsetDateTime;

use crate::{
    domain::RuleSet,
    error::{EngineError, Result},
    local_time::{self, LocalTime},
    window,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: f64,
    pub label: String,
    pub fallback: bool,
    pub local: LocalTime,
}

/// Resolves instants against one rule set in one timezone.
///
/// Deterministic for a given (instant, timezone, rule set), so costs can be recomputed idempotently.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    rule_set: &'a RuleSet,
    tz: Tz,
}

impl<'a> Resolver<'a> {
    pub fn new(rule_set: &'a RuleSet, tz: Tz) -> Self {
        Self { rule_set, tz }
    }

    pub fn rule_set(&self) -> &'a RuleSet {
        self.rule_set
    }

    pub fn resolve(&self, instant: OffsetDateTime) -> Result<Resolution> {
        let local = local_time::resolve(instant, self.tz)?;
        let m = window::match_window(local.minute_of_day(), local.weekday, &self.rule_set.windows)
            .ok_or_else(|| EngineError::EmptyRuleSet(self.rule_set.id.clone()))?;
        Ok(Resolution {
            value: m.value,
            label: m.label.to_string(),
            fallback: m.fallback,
            local,
        })
    }

    pub fn value_at(&self, instant: OffsetDateTime) -> Result<f64> {
        let local = local_time::resolve(instant, self.tz)?;
        window::match_window(local.minute_of_day(), local.weekday, &self.rule_set.windows)
            .map(|m| m.value)
            .ok_or_else(|| EngineError::EmptyRuleSet(self.rule_set.id.clone()))
    }
}

/// `rateFor` over a tariff: price per unit.
#[derive(Debug, Clone, Copy)]
pub struct RateResolver<'a>(Resolver<'a>);

impl<'a> RateResolver<'a> {
    pub fn new(tariff: &'a RuleSet, tz: Tz) -> Self {
        Self(Resolver::new(tariff, tz))
    }

    pub fn unit_rate(&self, instant: OffsetDateTime) -> Result<f64> {
        self.0.value_at(instant)
    }

    pub fn resolve(&self, instant: OffsetDateTime) -> Result<Resolution> {
        self.0.resolve(instant)
    }

    pub fn standing_charge_per_day(&self) -> Option<f64> {
        self.0.rule_set().daily_charge
    }
}

/// `rateFor` over a carbon profile: grams CO2 per unit.
#[derive(Debug, Clone, Copy)]
pub struct CarbonResolver<'a>(Resolver<'a>);

impl<'a> CarbonResolver<'a> {
    pub fn new(profile: &'a RuleSet, tz: Tz) -> Self {
        Self(Resolver::new(profile, tz))
    }

    pub fn intensity(&self, instant: OffsetDateTime) -> Result<f64> {
        self.0.value_at(instant)
    }

    pub fn resolve(&self, instant: OffsetDateTime) -> Result<Resolution> {
        self.0.resolve(instant)
    }
}

/// One-shot `rateFor(instant, timezoneId, ruleSet)`.
pub fn rate_for(instant: OffsetDateTime, timezone_id: &str, rule_set: &RuleSet) -> Result<f64> {
    let tz = local_time::parse_timezone(timezone_id)?;
    Resolver::new(rule_set, tz).value_at(instant)
}
