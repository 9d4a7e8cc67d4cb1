use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use rate_engine::{catalog::Catalog, domain::Reading};
use time::OffsetDateTime;

use crate::{
    metrics_server::{CSV_PARSE_ERRORS, READINGS_RECEIVED},
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
};

/// CSV source for `Reading`.
///
/// Expected header columns (by name):
/// - ts (RFC3339 timestamp)
/// - meter_id
/// - value
/// - unit (optional; taken from the meter's utility when blank or absent)
pub struct ReadingCsvFileSource {
    path: PathBuf,
    catalog: Catalog,
}

impl ReadingCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, catalog: Catalog) -> Self {
        Self {
            path: path.into(),
            catalog,
        }
    }
}

fn record_to_reading(record: &StringRecord, headers: &StringRecord, catalog: &Catalog) -> Result<Reading, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let ts_str = get("ts")?;
    let ts = OffsetDateTime::parse(ts_str.trim(), &time::format_description::well_known::Rfc3339)
        .map_err(|e| PipelineError::Source(format!("invalid ts '{ts_str}': {e}")))?;

    let meter_id = get("meter_id")?.trim().to_string();

    let value_str = get("value")?;
    let value: f64 = value_str
        .trim()
        .parse()
        .map_err(|e| PipelineError::Source(format!("invalid value '{value_str}': {e}")))?;

    let unit = match get("unit").map(str::trim) {
        Ok(u) if !u.is_empty() => u.to_string(),
        _ => catalog
            .meter(&meter_id)
            .map(|m| m.utility.default_unit())
            .unwrap_or("kWh")
            .to_string(),
    };

    Ok(Reading {
        meter_id,
        ts,
        value,
        unit,
    })
}

#[async_trait::async_trait]
impl Source<Reading> for ReadingCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<Reading> {
        // This source uses a blocking CSV reader but is wrapped in a single async task.
        let path = self.path.clone();
        let catalog = self.catalog.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| PipelineError::Source(format!("failed to open CSV file '{}': {e}", path.display())))?;
            let mut rdr = csv::Reader::from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))?
                .clone();

            for result in rdr.records() {
                let record = result.map_err(|e| PipelineError::Source(format!(
                    "failed to read CSV record: {e}"
                )))?;

                let reading = match record_to_reading(&record, &headers, &catalog) {
                    Ok(r) => r,
                    Err(e) => {
                        metrics::counter!(CSV_PARSE_ERRORS).increment(1);
                        Err(e)?
                    }
                };

                metrics::counter!(READINGS_RECEIVED).increment(1);
                yield Envelope::now(reading);
            }
        };

        Box::pin(s)
    }
}
