use anyhow::{bail, Context, Result};
use rate_engine::{AggregationQuery, Engine};
use std::{env, fs, path::PathBuf};
use time::OffsetDateTime;
use usage_service::{config::AppConfig, metrics_server, observability, run_query};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: usage-service <query.json> [readings.csv]");
    }
    let query_path = &args[1];
    let readings_csv = args.get(2).map(PathBuf::from);

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let query_json = fs::read_to_string(query_path).with_context(|| format!("failed to read query '{query_path}'"))?;
    let query: AggregationQuery = serde_json::from_str(&query_json).context("invalid query JSON")?;

    let engine = Engine::new(cfg.load_catalog()?, cfg.defaults.clone());
    let page = run_query(&engine, &cfg.engine, &query, readings_csv, OffsetDateTime::now_utc()).await?;

    println!("{}", serde_json::to_string_pretty(&page)?);

    Ok(())
}
