use crate::{
    metrics_server::READINGS_REJECTED,
    pipeline::{Envelope, PipelineError, Transform},
};
use rate_engine::domain::Reading;
use time::macros::datetime;

/// Pure validation of a `Reading`.
///
/// Rules:
/// - value must be finite and non-negative.
/// - meter_id must not be blank.
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01).
pub fn validate_reading(env: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
    let r = &env.payload;

    if !r.value.is_finite() || r.value < 0.0 {
        return Err(PipelineError::Transform(format!(
            "reading for '{}' must be a non-negative number, got {}",
            r.meter_id, r.value
        )));
    }

    if r.meter_id.trim().is_empty() {
        return Err(PipelineError::Transform("meter_id must not be empty".to_string()));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if r.ts < min_ts || r.ts >= max_ts {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<Reading, Reading> for ReadingValidation {
    async fn apply(&self, input: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
        validate_reading(input).inspect_err(|_| {
            metrics::counter!(READINGS_REJECTED).increment(1);
        })
    }
}
