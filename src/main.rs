//! Portwatch - vessel visit detection and traffic aggregation
//!
//! Watches a stream of AIS position reports, decides per vessel whether it
//! is inside a governed geofence (ports, dock/terminal sub-areas), produces
//! idempotent visit records through a debounced entry/exit state machine,
//! and rolls finalized visits into fixed-window traffic counts.
//!
//! Module structure:
//! - `domain/` - Core business types (Observation, VisitState, VisitRecord)
//! - `io/` - External interfaces (stores, catalog, positions, export)
//! - `services/` - Business logic (geofence, state machine, drivers)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use portwatch::infra::{Config, Metrics};
use portwatch::io::{
    load_geofences, MemoryPositions, MemoryRecordStore, MemoryStateStore, MemoryTrafficStore,
    RecordExport,
};
use portwatch::services::{
    DomainSpec, FeatureSelector, GeofenceIndex, LiveDriver, TrafficAggregator,
};
use portwatch::services::state_machine::DebounceParams;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Portwatch - maritime visit detection engine
#[derive(Parser, Debug)]
#[command(name = "portwatch", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Run a single pass of every job and exit (for external schedulers)
    #[arg(long)]
    once: bool,
}

/// Per-domain stores plus the [`DomainSpec`] that selects its catalog features
struct DomainEngine {
    spec: DomainSpec,
    states: MemoryStateStore,
    records: MemoryRecordStore,
    traffic: MemoryTrafficStore,
}

impl DomainEngine {
    fn new(spec: DomainSpec) -> Self {
        Self {
            spec,
            states: MemoryStateStore::new(),
            records: MemoryRecordStore::new(),
            traffic: MemoryTrafficStore::new(),
        }
    }
}

fn build_domains(config: &Config) -> Vec<DomainEngine> {
    let mut domains = Vec::new();
    if config.ports_enabled() {
        domains.push(DomainEngine::new(DomainSpec {
            name: "ports".to_string(),
            id_prefix: "pc".to_string(),
            selector: FeatureSelector::Category(config.port_category().to_string()),
        }));
    }
    if config.areas_enabled() {
        domains.push(DomainEngine::new(DomainSpec {
            name: "areas".to_string(),
            id_prefix: "ac".to_string(),
            selector: FeatureSelector::GroupedKinds {
                groups: config.area_groups().to_vec(),
                kind_keywords: config.area_kind_keywords().to_vec(),
            },
        }));
    }
    domains
}

fn live_pass(
    config: &Config,
    index: &GeofenceIndex,
    source: &MemoryPositions,
    domains: &[DomainEngine],
    metrics: &Metrics,
    export: &RecordExport,
) {
    let params = DebounceParams {
        hits_in: config.hits_in(),
        hits_out: config.hits_out(),
        slow_sog_knots: config.slow_sog_knots(),
        nav_status_moored: config.nav_status_moored(),
    };

    for engine in domains {
        let driver = LiveDriver::new(
            &engine.spec,
            index,
            params.clone(),
            &engine.states,
            &engine.records,
            metrics,
            config.live_recent_minutes(),
            config.live_scan_limit(),
        );
        match driver.run_once(source, Utc::now()) {
            Ok(summary) => {
                if !summary.finalized.is_empty() {
                    export.write_records(&summary.finalized);
                }
            }
            // Abort this domain's pass cleanly; the next interval retries
            Err(e) => error!(domain = %engine.spec.name, error = %format!("{e:#}"), "live_pass_failed"),
        }
    }
}

fn aggregation_pass(config: &Config, domains: &[DomainEngine], metrics: &Metrics) {
    for engine in domains {
        let aggregator = TrafficAggregator::new(
            &engine.records,
            &engine.traffic,
            config.bucket_hours(),
            metrics,
        );
        if let Err(e) = aggregator.run_once() {
            error!(domain = %engine.spec.name, error = %format!("{e:#}"), "aggregation_pass_failed");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("portwatch starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        hits_in = %config.hits_in(),
        hits_out = %config.hits_out(),
        recent_minutes = %config.live_recent_minutes(),
        scan_limit = %config.live_scan_limit(),
        bucket_hours = %config.bucket_hours(),
        ports_enabled = %config.ports_enabled(),
        areas_enabled = %config.areas_enabled(),
        "config_loaded"
    );

    // An unavailable catalog is fatal: nothing can be classified without it
    let features = load_geofences(config.catalog_path()).context("loading geofence catalog")?;
    let index = GeofenceIndex::new(features);

    let source = MemoryPositions::from_jsonl_file(config.positions_path())
        .context("loading position reports")?;

    let domains = build_domains(&config);
    if domains.is_empty() {
        anyhow::bail!("no geofencing domain enabled in config");
    }

    let metrics = Metrics::new();
    let export = RecordExport::new(config.export_path());

    if args.once {
        live_pass(&config, &index, &source, &domains, &metrics, &export);
        aggregation_pass(&config, &domains, &metrics);
        metrics.snapshot().log();
        info!("portwatch single pass complete");
        return Ok(());
    }

    let mut live_interval =
        tokio::time::interval(std::time::Duration::from_secs(config.live_interval_secs()));
    let mut aggregation_interval = tokio::time::interval(std::time::Duration::from_secs(
        config.aggregation_interval_secs(),
    ));
    let mut metrics_interval =
        tokio::time::interval(std::time::Duration::from_secs(config.metrics_interval_secs()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown_signal_received");
                break;
            }
            _ = live_interval.tick() => {
                live_pass(&config, &index, &source, &domains, &metrics, &export);
            }
            _ = aggregation_interval.tick() => {
                aggregation_pass(&config, &domains, &metrics);
            }
            _ = metrics_interval.tick() => {
                metrics.snapshot().log();
            }
        }
    }

    info!("portwatch shutdown complete");
    Ok(())
}
