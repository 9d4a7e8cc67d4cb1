use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single metered value. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub value: f64,
    pub unit: String,
}

/// A reading with its resolved price and carbon intensity applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub value: f64,
    pub unit_rate: f64,
    pub cost_amount: f64,
    pub carbon_intensity: f64,
    pub carbon_grams: f64,
}
