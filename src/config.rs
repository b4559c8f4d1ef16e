//! Project configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a YAML (`.yaml`/`.yml`) or TOML (`.toml`) file
//! 2. environment variables prefixed with `AMMETER_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use ammeter_daq::config::ProjectConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // AMMETER_TESTING__SAMPLING__SAMPLING_FREQUENCY_HZ=10 overrides the file
//! let config = ProjectConfig::load("config/test_config.yaml")?;
//! println!("{} Hz", config.testing.sampling.sampling_frequency_hz);
//! # Ok(())
//! # }
//! ```

use crate::logging::{parse_log_level, LogFormat, TracingConfig};
use ammeter_analysis::Metric;
use ammeter_driver::{AmmeterClient, AmmeterKind};
use ammeter_faults::{FaultInjector, FaultProfile, FaultRng};
use ammeter_core::SamplingPlan;
use ammeter_storage::{ResultStore, SaveFormat};
use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "AMMETER_";

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The extension is neither YAML nor TOML.
    #[error("unsupported configuration format: {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    /// The document could not be parsed or does not match the schema.
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    /// The document parsed but violates a rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// Top-level project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Sampling plan
    pub testing: TestingConfig,
    /// Instruments, keyed by kind (`greenlee`, `entes`, `circutor`)
    pub ammeters: BTreeMap<String, AmmeterConfig>,
    /// Analysis options
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Run directory options
    #[serde(default)]
    pub result_management: ResultManagementConfig,
    /// DogStatsD export
    #[serde(default)]
    pub datadog: DatadogConfig,
    /// Synthetic faults
    #[serde(default)]
    pub fault_injection: FaultInjectionConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `testing` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestingConfig {
    /// Sampling bounds and rate
    pub sampling: SamplingConfig,
}

/// `testing.sampling` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Stop after this many ticks
    #[serde(default)]
    pub measurements_count: Option<u64>,
    /// Stop after this many seconds
    #[serde(default)]
    pub total_duration_seconds: Option<f64>,
    /// Ticks per second
    pub sampling_frequency_hz: f64,
}

/// One entry of the `ammeters` section; unset fields take the kind's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmmeterConfig {
    /// Host name or address
    #[serde(default)]
    pub host: Option<String>,
    /// TCP port
    #[serde(default)]
    pub port: Option<u16>,
    /// Request command
    #[serde(default)]
    pub command: Option<String>,
    /// Connect and reply timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// `analysis` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Statistics reported per instrument
    #[serde(default = "default_metrics")]
    pub statistical_metrics: Vec<String>,
    /// Plot settings
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

/// `analysis.visualization` section. Accepted for compatibility; no plots are
/// produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Whether plots were requested
    #[serde(default)]
    pub enabled: bool,
    /// Requested plot kinds
    #[serde(default)]
    pub plot_types: Vec<String>,
}

/// `result_management` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultManagementConfig {
    /// Root of the run directories
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
    /// `json` or `csv`
    #[serde(default = "default_save_format")]
    pub save_format: String,
    /// Keys kept in `metadata.json`; empty keeps all
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<String>,
}

/// `datadog` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatadogConfig {
    /// Send metrics
    #[serde(default)]
    pub enabled: bool,
    /// Agent host
    #[serde(default = "default_statsd_host")]
    pub host: String,
    /// Agent UDP port
    #[serde(default = "default_statsd_port")]
    pub port: u16,
    /// Metric name prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// `fault_injection` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultInjectionConfig {
    /// Apply the profile
    #[serde(default)]
    pub enabled: bool,
    /// RNG seed; OS entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Drop probability
    #[serde(default)]
    pub drop_prob: f64,
    /// Delay probability
    #[serde(default)]
    pub delay_prob: f64,
    /// Smallest injected delay
    #[serde(default)]
    pub delay_ms_min: u64,
    /// Largest injected delay
    #[serde(default)]
    pub delay_ms_max: u64,
    /// Corruption probability
    #[serde(default)]
    pub corrupt_prob: f64,
    /// Outlier probability
    #[serde(default)]
    pub outlier_prob: f64,
    /// Outlier multiplier
    #[serde(default = "default_outlier_scale")]
    pub outlier_scale: f64,
}

/// `logging` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty, compact or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_metrics() -> Vec<String> {
    Metric::ALL.iter().map(|m| m.as_str().to_string()).collect()
}

fn default_save_path() -> PathBuf {
    PathBuf::from("results")
}

fn default_save_format() -> String {
    "json".to_string()
}

fn default_metadata_fields() -> Vec<String> {
    ["timestamp", "test_duration", "sampling_frequency", "ammeter_type"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_statsd_host() -> String {
    "127.0.0.1".to_string()
}

fn default_statsd_port() -> u16 {
    8125
}

fn default_namespace() -> String {
    "ammeter_test".to_string()
}

fn default_outlier_scale() -> f64 {
    ammeter_faults::profile::DEFAULT_OUTLIER_SCALE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            statistical_metrics: default_metrics(),
            visualization: VisualizationConfig::default(),
        }
    }
}

impl Default for ResultManagementConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            save_format: default_save_format(),
            metadata_fields: default_metadata_fields(),
        }
    }
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_statsd_host(),
            port: default_statsd_port(),
            namespace: default_namespace(),
        }
    }
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: None,
            drop_prob: 0.0,
            delay_prob: 0.0,
            delay_ms_min: 0,
            delay_ms_max: 0,
            corrupt_prob: 0.0,
            outlier_prob: 0.0,
            outlier_scale: default_outlier_scale(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ProjectConfig {
    /// Load, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path.as_ref())?.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered sources, without extraction.
    pub fn figment(path: &Path) -> Result<Figment, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let figment = match ext.as_deref() {
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Check every rule that cannot be expressed in the schema.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.ammeters.is_empty() {
            return invalid("no ammeters configured".to_string());
        }
        for (key, ammeter) in &self.ammeters {
            if ammeter.timeout_ms == Some(0) {
                return invalid(format!("ammeters.{}.timeout_ms must be positive", key));
            }
        }
        self.clients()?;

        self.sampling_plan()?;
        self.fault_profile()?;

        SaveFormat::from_str(&self.result_management.save_format)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.metrics()?;

        parse_log_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        LogFormat::from_str(&self.logging.format).map_err(ConfigError::Invalid)?;

        Ok(())
    }

    /// Sampling plan of the `testing.sampling` section.
    pub fn sampling_plan(&self) -> Result<SamplingPlan, ConfigError> {
        let s = &self.testing.sampling;
        let duration = s
            .total_duration_seconds
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "total_duration_seconds must be a non-negative number of representable size, got {} ({})",
                        secs, e
                    ))
                })
            })
            .transpose()?;
        SamplingPlan::new(s.measurements_count, duration, s.sampling_frequency_hz)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Configured instruments, in the fixed sampling order.
    pub fn clients(&self) -> Result<Vec<AmmeterClient>, ConfigError> {
        let mut by_kind = BTreeMap::new();
        for (key, ammeter) in &self.ammeters {
            let kind = AmmeterKind::from_str(key).map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if by_kind.insert(kind, ammeter).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "ammeter '{}' is configured more than once",
                    kind
                )));
            }
        }
        // BTreeMap over AmmeterKind iterates in sampling order.
        Ok(by_kind
            .into_iter()
            .map(|(kind, cfg)| {
                let mut client = AmmeterClient::new(kind);
                if let Some(host) = &cfg.host {
                    client = client.with_host(host.clone());
                }
                if let Some(port) = cfg.port {
                    client = client.with_port(port);
                }
                if let Some(command) = &cfg.command {
                    client = client.with_command(command.clone());
                }
                if let Some(ms) = cfg.timeout_ms {
                    client = client.with_timeout(Duration::from_millis(ms));
                }
                client
            })
            .collect())
    }

    /// Fault profile of the `fault_injection` section, enabled or not.
    pub fn fault_profile(&self) -> Result<FaultProfile, ConfigError> {
        let f = &self.fault_injection;
        FaultProfile::builder()
            .drop_prob(f.drop_prob)
            .delay_prob(f.delay_prob)
            .delay_range(
                Duration::from_millis(f.delay_ms_min),
                Duration::from_millis(f.delay_ms_max),
            )
            .corrupt_prob(f.corrupt_prob)
            .outlier_prob(f.outlier_prob)
            .outlier_scale(f.outlier_scale)
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Injector and RNG for the run. Disabled injection yields the identity.
    pub fn fault_injector(&self) -> Result<(FaultInjector, FaultRng), ConfigError> {
        let rng = FaultRng::new(self.fault_injection.seed);
        if !self.fault_injection.enabled {
            return Ok((FaultInjector::disabled(), rng));
        }
        Ok((FaultInjector::new(self.fault_profile()?), rng))
    }

    /// Selected statistics.
    pub fn metrics(&self) -> Result<Vec<Metric>, ConfigError> {
        self.analysis
            .statistical_metrics
            .iter()
            .map(|m| Metric::from_str(m).map_err(|e| ConfigError::Invalid(e.to_string())))
            .collect()
    }

    /// Store configured by `result_management` and `analysis`.
    pub fn result_store(&self) -> Result<ResultStore, ConfigError> {
        let rm = &self.result_management;
        let format =
            SaveFormat::from_str(&rm.save_format).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(ResultStore::new(&rm.save_path, format)
            .with_metrics(self.metrics()?)
            .with_metadata_fields(rm.metadata_fields.clone()))
    }

    /// Tracing setup of the `logging` section.
    pub fn tracing_config(&self) -> Result<TracingConfig, ConfigError> {
        TracingConfig::from_logging(&self.logging).map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL: &str = r#"
testing:
  sampling:
    measurements_count: 15
    sampling_frequency_hz: 5
ammeters:
  circutor: {}
  greenlee:
    port: 6000
"#;

    fn minimal() -> ProjectConfig {
        let mut ammeters = BTreeMap::new();
        ammeters.insert("entes".to_string(), AmmeterConfig::default());
        ProjectConfig {
            testing: TestingConfig {
                sampling: SamplingConfig {
                    measurements_count: Some(5),
                    total_duration_seconds: None,
                    sampling_frequency_hz: 5.0,
                },
            },
            ammeters,
            analysis: AnalysisConfig::default(),
            result_management: ResultManagementConfig::default(),
            datadog: DatadogConfig::default(),
            fault_injection: FaultInjectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_yaml_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("test_config.yaml", MINIMAL)?;
            let config = ProjectConfig::load("test_config.yaml").map_err(|e| e.to_string())?;

            assert_eq!(config.testing.sampling.measurements_count, Some(15));
            assert_eq!(config.result_management.save_format, "json");
            assert_eq!(config.datadog.port, 8125);
            assert!(!config.fault_injection.enabled);
            assert_eq!(config.logging.level, "info");

            let clients = config.clients().map_err(|e| e.to_string())?;
            let ids: Vec<_> = clients.iter().map(|c| c.kind()).collect();
            assert_eq!(ids, vec![AmmeterKind::Greenlee, AmmeterKind::Circutor]);
            assert_eq!(clients[0].address(), "localhost:6000");
            assert_eq!(clients[1].address(), "localhost:5002");
            assert_eq!(clients[1].command(), "MEASURE_CIRCUTOR -get_measurement");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("test_config.yaml", MINIMAL)?;
            jail.set_env("AMMETER_TESTING__SAMPLING__SAMPLING_FREQUENCY_HZ", "10");
            jail.set_env("AMMETER_FAULT_INJECTION__DROP_PROB", "0.25");
            let config = ProjectConfig::load("test_config.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.testing.sampling.sampling_frequency_hz, 10.0);
            assert_eq!(config.fault_injection.drop_prob, 0.25);
            Ok(())
        });
    }

    #[test]
    fn test_toml_is_accepted() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[testing.sampling]
total_duration_seconds = 3.0
sampling_frequency_hz = 2.0

[ammeters.entes]
host = "10.0.0.5"
"#,
            )?;
            let config = ProjectConfig::load("config.toml").map_err(|e| e.to_string())?;
            let plan = config.sampling_plan().map_err(|e| e.to_string())?;
            assert_eq!(plan.duration(), Some(Duration::from_secs(3)));
            assert_eq!(plan.count(), None);
            Ok(())
        });
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        Jail::expect_with(|jail| {
            assert!(matches!(
                ProjectConfig::load("absent.yaml"),
                Err(ConfigError::NotFound(_))
            ));
            jail.create_file("config.ini", "x=1")?;
            assert!(matches!(
                ProjectConfig::load("config.ini"),
                Err(ConfigError::UnsupportedFormat(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_valid_minimal() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_rejects_no_ammeters_and_unknown_kind() {
        let mut config = minimal();
        config.ammeters.clear();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.ammeters.insert("fluke".to_string(), AmmeterConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_sampling() {
        let mut config = minimal();
        config.testing.sampling.measurements_count = None;
        assert!(config.validate().is_err(), "no bound");

        let mut config = minimal();
        config.testing.sampling.sampling_frequency_hz = 0.0;
        assert!(config.validate().is_err(), "zero frequency");

        let mut config = minimal();
        config.testing.sampling.total_duration_seconds = Some(-1.0);
        assert!(config.validate().is_err(), "negative duration");

        let mut config = minimal();
        config.testing.sampling.total_duration_seconds = Some(1e30);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "oversized duration");

        let mut config = minimal();
        config.testing.sampling.total_duration_seconds = Some(f64::NAN);
        assert!(config.validate().is_err(), "NaN duration");

        let mut config = minimal();
        config.testing.sampling.sampling_frequency_hz = 1e-20;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "unschedulable period");
    }

    #[test]
    fn test_rejects_same_kind_twice() {
        let mut config = minimal();
        config.ammeters.insert("Entes".to_string(), AmmeterConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"), "{}", err);
        assert!(config.clients().is_err());
    }

    #[test]
    fn test_rejects_bad_faults() {
        let mut config = minimal();
        config.fault_injection.drop_prob = 1.5;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.fault_injection.delay_ms_min = 50;
        config.fault_injection.delay_ms_max = 10;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.fault_injection.outlier_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_output_settings() {
        let mut config = minimal();
        config.result_management.save_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.analysis.statistical_metrics.push("kurtosis".to_string());
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.ammeters.insert("greenlee".to_string(), AmmeterConfig {
            timeout_ms: Some(0),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_faults_give_identity_injector() {
        let mut config = minimal();
        config.fault_injection.drop_prob = 1.0;
        config.fault_injection.seed = Some(3);
        let (injector, rng) = config.fault_injector().unwrap();
        assert!(!injector.is_enabled());
        assert_eq!(rng.seed(), 3);

        config.fault_injection.enabled = true;
        let (injector, _) = config.fault_injector().unwrap();
        assert!(injector.is_enabled());
        assert_eq!(injector.profile().drop_prob(), 1.0);
    }
}
