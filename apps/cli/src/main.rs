#![deny(warnings)]

//! Headless CLI: load or start a village save, run live ticks, print the
//! production rates and write the save back.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use village_core::{BalanceConfig, Catalogs};
use village_runtime::{now_epoch_ms, Simulation};

#[derive(Debug, Default)]
struct Args {
    save: Option<PathBuf>,
    ticks: u32,
    balance: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--save" => args.save = it.next().map(PathBuf::from),
            "--ticks" => args.ticks = it.next().and_then(|s| s.parse().ok()).unwrap_or(0),
            "--balance" => args.balance = it.next().map(PathBuf::from),
            "--catalog" => args.catalog = it.next().map(PathBuf::from),
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn load_catalogs(path: Option<&Path>) -> Result<Catalogs> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading catalog {}", p.display()))?;
            Ok(Catalogs::from_yaml_str(&text)?)
        }
        None => Ok(Catalogs::village_default()),
    }
}

fn load_balance(path: Option<&Path>) -> Result<BalanceConfig> {
    match path {
        Some(p) => BalanceConfig::load(p).with_context(|| format!("loading balance {}", p.display())),
        None => Ok(BalanceConfig::default()),
    }
}

fn format_epoch_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

fn main() -> Result<()> {
    // Logging setup; RUST_LOG overrides the info default.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        ?args,
        "starting CLI"
    );

    let config = load_balance(args.balance.as_deref())?;
    let catalogs = load_catalogs(args.catalog.as_deref())?;
    let now = now_epoch_ms();

    let existing = args.save.as_deref().filter(|p| p.exists());
    let mut sim = match existing {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading save {}", path.display()))?;
            let raw: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("save {} is not JSON", path.display()))?;
            let (sim, report) = Simulation::load(&raw, catalogs, config, now);
            match report {
                Some(report) => println!("Offline | {}", serde_json::to_string(&report)?),
                None => println!("Offline | none"),
            }
            sim
        }
        None => Simulation::new(catalogs, config, now),
    };
    for notice in sim.take_notices() {
        println!("Notice | {}", notice);
    }

    let dt = sim.config().tick_seconds;
    for _ in 0..args.ticks {
        for event in sim.tick(dt, now_epoch_ms()) {
            info!(?event, "tick event");
        }
    }

    let rates = sim.rates();
    let state = sim.state();
    println!(
        "Village OK | buildings: {} | population: {} | happiness: {:.0} | game time: {:.0}s",
        state.buildings.len(),
        state.population,
        state.happiness,
        state.game_time_seconds
    );
    let resources = &sim.catalogs().resources;
    for (kind, stock) in state.resources.iter() {
        let name = resources
            .get(kind.as_str())
            .map_or(kind.as_str(), |def| def.display_name());
        println!(
            "Rate | {:<10} stock: {:>10.2} | +{:.3}/s -{:.3}/s | net {:+.3}/s",
            name,
            stock,
            rates.production.get(kind).copied().unwrap_or(0.0),
            rates.consumption.get(kind).copied().unwrap_or(0.0),
            rates.net(kind.as_str())
        );
    }

    if let Some(path) = args.save.as_deref() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let envelope = sim.save(now_epoch_ms());
        std::fs::write(path, envelope.to_json()?)
            .with_context(|| format!("writing save {}", path.display()))?;
        println!(
            "Saved | {} | schema v{} | at {}",
            path.display(),
            envelope.schema_version,
            format_epoch_ms(envelope.saved_at_epoch_ms)
        );
    }

    Ok(())
}
