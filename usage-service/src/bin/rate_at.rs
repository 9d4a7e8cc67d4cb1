use anyhow::{bail, Context, Result};
use rate_engine::{local_time, CarbonResolver, RateResolver};
use std::env;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use usage_service::{config::AppConfig, observability};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: rate_at <rfc3339_instant> [tz] [tariff_id] [carbon_profile_id]");
    }
    let instant = OffsetDateTime::parse(&args[1], &Rfc3339).with_context(|| format!("invalid instant '{}'", args[1]))?;

    let cfg = AppConfig::load()?;
    let catalog = cfg.load_catalog()?;
    let defaults = &cfg.defaults;

    let tz_id = args.get(2).unwrap_or(&defaults.tz);
    let tariff = catalog.tariff(args.get(3).unwrap_or(&defaults.tariff_id))?;
    let profile = catalog.carbon_profile(args.get(4).unwrap_or(&defaults.carbon_profile_id))?;
    let tz = local_time::parse_timezone(tz_id)?;

    let rate = RateResolver::new(tariff, tz).resolve(instant)?;
    let carbon = CarbonResolver::new(profile, tz).resolve(instant)?;
    let lt = rate.local;

    println!(
        "{:04}-{:02}-{:02} {:02}:{:02} {tz_id} (weekday {})",
        lt.year, lt.month, lt.day, lt.hour, lt.minute, lt.weekday
    );
    println!(
        "  {}: {} per unit [{}]{}",
        tariff.id,
        rate.value,
        rate.label,
        if rate.fallback { " (fallback)" } else { "" }
    );
    println!(
        "  {}: {} g/unit [{}]{}",
        profile.id,
        carbon.value,
        carbon.label,
        if carbon.fallback { " (fallback)" } else { "" }
    );
    if let Some(charge) = tariff.daily_charge {
        println!("  standing charge: {charge} per day");
    }

    Ok(())
}
