use chrono_tz::Tz;

use crate::{
    domain::{DerivedRecord, Reading, RuleSet},
    error::Result,
    local_time,
    resolver::{CarbonResolver, RateResolver},
};

/// Applies a tariff and a carbon profile to readings in one timezone.
#[derive(Debug, Clone, Copy)]
pub struct CostCarbonComputer<'a> {
    rates: RateResolver<'a>,
    carbon: CarbonResolver<'a>,
}

impl<'a> CostCarbonComputer<'a> {
    pub fn new(tariff: &'a RuleSet, carbon_profile: &'a RuleSet, tz: Tz) -> Self {
        Self {
            rates: RateResolver::new(tariff, tz),
            carbon: CarbonResolver::new(carbon_profile, tz),
        }
    }

    pub fn derive(&self, reading: &Reading) -> Result<DerivedRecord> {
        let unit_rate = self.rates.unit_rate(reading.ts)?;
        let carbon_intensity = self.carbon.intensity(reading.ts)?;
        Ok(DerivedRecord {
            meter_id: reading.meter_id.clone(),
            ts: reading.ts,
            value: reading.value,
            unit_rate,
            cost_amount: reading.value * unit_rate,
            carbon_intensity,
            carbon_grams: reading.value * carbon_intensity,
        })
    }

    pub fn derive_all<'r>(&self, readings: impl IntoIterator<Item = &'r Reading>) -> Result<Vec<DerivedRecord>> {
        readings.into_iter().map(|r| self.derive(r)).collect()
    }

    pub fn standing_charge_per_day(&self) -> Option<f64> {
        self.rates.standing_charge_per_day()
    }
}

/// One-shot `derive(reading, tariff, carbonProfile, timezoneId)`.
pub fn derive(reading: &Reading, tariff: &RuleSet, carbon_profile: &RuleSet, timezone_id: &str) -> Result<DerivedRecord> {
    let tz = local_time::parse_timezone(timezone_id)?;
    CostCarbonComputer::new(tariff, carbon_profile, tz).derive(reading)
}
