//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Accumulated inside hits required to confirm an entry
    #[serde(default = "default_hits_in")]
    pub hits_in: u32,
    /// Consecutive outside hits required to confirm an exit
    #[serde(default = "default_hits_out")]
    pub hits_out: u32,
    /// Speed over ground below this many knots earns a bonus hit
    #[serde(default = "default_slow_sog_knots")]
    pub slow_sog_knots: f64,
    /// Navigational status code earning a bonus hit (5 = moored)
    #[serde(default = "default_nav_status_moored")]
    pub nav_status_moored: i32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            hits_in: default_hits_in(),
            hits_out: default_hits_out(),
            slow_sog_knots: default_slow_sog_knots(),
            nav_status_moored: default_nav_status_moored(),
        }
    }
}

fn default_hits_in() -> u32 {
    3
}

fn default_hits_out() -> u32 {
    3
}

fn default_slow_sog_knots() -> f64 {
    0.5
}

fn default_nav_status_moored() -> i32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Only scan observations from this many recent minutes
    #[serde(default = "default_recent_minutes")]
    pub recent_minutes: i64,
    /// Upper bound on reports scanned per pass
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    /// Seconds between live passes
    #[serde(default = "default_live_interval_secs")]
    pub interval_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            recent_minutes: default_recent_minutes(),
            scan_limit: default_scan_limit(),
            interval_secs: default_live_interval_secs(),
        }
    }
}

fn default_recent_minutes() -> i64 {
    15
}

fn default_scan_limit() -> usize {
    5000
}

fn default_live_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Traffic window size in hours (day-aligned)
    #[serde(default = "default_bucket_hours")]
    pub bucket_hours: u32,
    /// Seconds between aggregation passes
    #[serde(default = "default_aggregation_interval_secs")]
    pub interval_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bucket_hours: default_bucket_hours(),
            interval_secs: default_aggregation_interval_secs(),
        }
    }
}

fn default_bucket_hours() -> u32 {
    6
}

fn default_aggregation_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainsConfig {
    #[serde(default = "default_true")]
    pub ports_enabled: bool,
    #[serde(default = "default_true")]
    pub areas_enabled: bool,
    /// Feature `type` attribute that marks a port polygon
    #[serde(default = "default_port_category")]
    pub port_category: String,
    /// Area group labels served by the sub-area domain
    #[serde(default = "default_area_groups")]
    pub area_groups: Vec<String>,
    /// Lowercase keywords matched against sub-area feature types
    #[serde(default = "default_area_kind_keywords")]
    pub area_kind_keywords: Vec<String>,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            ports_enabled: true,
            areas_enabled: true,
            port_category: default_port_category(),
            area_groups: default_area_groups(),
            area_kind_keywords: default_area_kind_keywords(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port_category() -> String {
    "Port".to_string()
}

fn default_area_groups() -> Vec<String> {
    vec![
        "Liverpool Dock Estate".to_string(),
        "Birkenhead Dock Estate".to_string(),
        "West Bank Lower Tranmere".to_string(),
    ]
}

fn default_area_kind_keywords() -> Vec<String> {
    ["dock", "terminal", "facility", "facilities", "lock"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// GeoJSON catalog of port and sub-area polygons
    #[serde(default = "default_catalog_path")]
    pub catalog: String,
    /// JSONL file of raw position reports
    #[serde(default = "default_positions_path")]
    pub positions: String,
    /// JSONL export of finalized visit records
    #[serde(default = "default_export_path")]
    pub export: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog_path(),
            positions: default_positions_path(),
            export: default_export_path(),
        }
    }
}

fn default_catalog_path() -> String {
    "data/port_areas.geojson".to_string()
}

fn default_positions_path() -> String {
    "data/positions.jsonl".to_string()
}

fn default_export_path() -> String {
    "out/visits.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    detection: DetectionConfig,
    live: LiveConfig,
    aggregation: AggregationConfig,
    domains: DomainsConfig,
    paths: PathsConfig,
    metrics: MetricsConfig,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            live: LiveConfig::default(),
            aggregation: AggregationConfig::default(),
            domains: DomainsConfig::default(),
            paths: PathsConfig::default(),
            metrics: MetricsConfig::default(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            detection: toml_config.detection,
            live: toml_config.live,
            aggregation: toml_config.aggregation,
            domains: toml_config.domains,
            paths: toml_config.paths,
            metrics: toml_config.metrics,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {e:#}. Using defaults.");
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn hits_in(&self) -> u32 {
        self.detection.hits_in
    }

    pub fn hits_out(&self) -> u32 {
        self.detection.hits_out
    }

    pub fn slow_sog_knots(&self) -> f64 {
        self.detection.slow_sog_knots
    }

    pub fn nav_status_moored(&self) -> i32 {
        self.detection.nav_status_moored
    }

    pub fn live_recent_minutes(&self) -> i64 {
        self.live.recent_minutes
    }

    pub fn live_scan_limit(&self) -> usize {
        self.live.scan_limit
    }

    pub fn live_interval_secs(&self) -> u64 {
        self.live.interval_secs
    }

    pub fn bucket_hours(&self) -> u32 {
        self.aggregation.bucket_hours
    }

    pub fn aggregation_interval_secs(&self) -> u64 {
        self.aggregation.interval_secs
    }

    pub fn ports_enabled(&self) -> bool {
        self.domains.ports_enabled
    }

    pub fn areas_enabled(&self) -> bool {
        self.domains.areas_enabled
    }

    pub fn port_category(&self) -> &str {
        &self.domains.port_category
    }

    pub fn area_groups(&self) -> &[String] {
        &self.domains.area_groups
    }

    pub fn area_kind_keywords(&self) -> &[String] {
        &self.domains.area_kind_keywords
    }

    pub fn catalog_path(&self) -> &str {
        &self.paths.catalog
    }

    pub fn positions_path(&self) -> &str {
        &self.paths.positions
    }

    pub fn export_path(&self) -> &str {
        &self.paths.export
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics.interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to override debounce thresholds
    #[cfg(test)]
    pub fn with_hits(mut self, hits_in: u32, hits_out: u32) -> Self {
        self.detection.hits_in = hits_in;
        self.detection.hits_out = hits_out;
        self
    }
}
