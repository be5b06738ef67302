//! Portwatch backfill - one-shot historical visit detection
//!
//! Streams the full position history ordered by (vessel, timestamp) through
//! the same transition rules and idempotent writer the live daemon uses,
//! with purely in-memory per-vessel state, then aggregates traffic. Safe to
//! re-run: every record write is an upsert by deterministic id.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use portwatch::infra::{Config, Metrics};
use portwatch::io::{
    load_geofences, MemoryPositions, MemoryRecordStore, MemoryTrafficStore, RecordExport,
    VisitRecordStore,
};
use portwatch::services::state_machine::DebounceParams;
use portwatch::services::{
    BackfillDriver, DomainSpec, FeatureSelector, GeofenceIndex, TrafficAggregator,
};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Portwatch backfill - seed or repair visit history
#[derive(Parser, Debug)]
#[command(name = "portwatch-backfill", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Clear all traffic buckets and re-aggregate every record
    #[arg(long)]
    rebuild_traffic: bool,

    /// Required alongside --rebuild-traffic
    #[arg(long)]
    confirm: bool,
}

fn domain_specs(config: &Config) -> Vec<DomainSpec> {
    let mut specs = Vec::new();
    if config.ports_enabled() {
        specs.push(DomainSpec {
            name: "ports".to_string(),
            id_prefix: "pc".to_string(),
            selector: FeatureSelector::Category(config.port_category().to_string()),
        });
    }
    if config.areas_enabled() {
        specs.push(DomainSpec {
            name: "areas".to_string(),
            id_prefix: "ac".to_string(),
            selector: FeatureSelector::GroupedKinds {
                groups: config.area_groups().to_vec(),
                kind_keywords: config.area_kind_keywords().to_vec(),
            },
        });
    }
    specs
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    if args.rebuild_traffic && !args.confirm {
        anyhow::bail!("refusing to rebuild traffic: pass --confirm to proceed");
    }

    let config = Config::load_from_path(&args.config);
    info!(config_file = %config.config_file(), "backfill starting");

    let features = load_geofences(config.catalog_path()).context("loading geofence catalog")?;
    let index = GeofenceIndex::new(features);

    let source = MemoryPositions::from_jsonl_file(config.positions_path())
        .context("loading position history")?;

    let params = DebounceParams {
        hits_in: config.hits_in(),
        hits_out: config.hits_out(),
        slow_sog_knots: config.slow_sog_knots(),
        nav_status_moored: config.nav_status_moored(),
    };

    let metrics = Metrics::new();
    let export = RecordExport::new(config.export_path());
    let now = Utc::now();

    for spec in domain_specs(&config) {
        let records = MemoryRecordStore::new();
        let traffic = MemoryTrafficStore::new();

        let driver = BackfillDriver::new(&spec, &index, params.clone(), &records, &metrics);
        let summary = driver
            .run(&source, now)
            .with_context(|| format!("backfilling {}", spec.name))?;

        let aggregator =
            TrafficAggregator::new(&records, &traffic, config.bucket_hours(), &metrics);
        let aggregated = if args.rebuild_traffic {
            aggregator.rebuild()
        } else {
            aggregator.run_once()
        }
        .with_context(|| format!("aggregating {}", spec.name))?;

        let exported = export.write_records(&records.all()?);
        info!(
            domain = %spec.name,
            visits = %summary.finalized.len(),
            open_states = %summary.open_states,
            aggregated = %aggregated,
            exported = %exported,
            "backfill_domain_complete"
        );
    }

    metrics.snapshot().log();
    info!("backfill complete");
    Ok(())
}
