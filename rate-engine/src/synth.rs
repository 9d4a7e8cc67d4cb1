use rand::{rngs::StdRng, Rng, SeedableRng};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::{
    domain::{Reading, Utility},
    error::{EngineError, Result},
    query::MAX_SPAN,
};

/// Relative jitter applied to every synthetic value.
const NOISE: f64 = 0.10;

/// Produces synthetic readings at the utility's native resolution.
///
/// Values carry a random jitter. With a seed the sequence is reproducible; without one
/// the generator is seeded from OS entropy.
pub struct ReadingSynthesizer {
    rng: StdRng,
}

impl ReadingSynthesizer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// One reading per step boundary from `from` through `to`, both inclusive.
    ///
    /// Ranges longer than [`MAX_SPAN`] are rejected with `RangeTooLong`.
    pub fn generate(
        &mut self,
        meter_id: &str,
        utility: Utility,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Reading>> {
        if to < from {
            return Err(EngineError::InvalidRange { from, to });
        }
        if to - from > MAX_SPAN {
            return Err(EngineError::RangeTooLong { from, to });
        }

        let step = Duration::minutes(utility.step_minutes());
        let capacity = ((to - from).whole_minutes() / utility.step_minutes()) as usize + 1;
        let mut out = Vec::with_capacity(capacity);

        let mut ts = from.to_offset(UtcOffset::UTC);
        while ts <= to {
            let jitter = self.rng.gen_range(1.0 - NOISE..=1.0 + NOISE);
            out.push(Reading {
                meter_id: meter_id.to_string(),
                ts,
                value: (baseline(utility, ts) * jitter).max(0.0),
                unit: utility.default_unit().to_string(),
            });
            match ts.checked_add(step) {
                Some(next) => ts = next,
                None => break,
            }
        }

        tracing::trace!(meter_id, %utility, readings = out.len(), "synthesized readings");
        Ok(out)
    }
}

/// Typical consumption per step, before jitter.
fn baseline(utility: Utility, ts: OffsetDateTime) -> f64 {
    match utility {
        Utility::Electricity => match ts.hour() {
            0..=5 => 0.35,
            6..=8 => 0.8,
            9..=16 => 1.1,
            17..=20 => 1.4,
            _ => 0.6,
        },
        Utility::Gas => 45.0,
        Utility::Water => 2.5,
        Utility::Heat => 60.0,
    }
}
