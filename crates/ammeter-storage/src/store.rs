//! Run directory writer.
//!
//! Layout of one run:
//!
//! ```text
//! <save_path>/<YYYYmmdd_HHMMSS>_<uuid8>/
//!     config.json
//!     measurements.json | measurements.csv
//!     summary.json
//!     metadata.json
//! ```

use crate::error::{Result, StorageError};
use ammeter_analysis::{Metric, RunResult, StatisticalSummary};
use ammeter_core::Measurement;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// On-disk format of the raw measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// `measurements.json`, one array of records.
    #[default]
    Json,
    /// `measurements.csv`, header plus one row per record.
    Csv,
}

impl FromStr for SaveFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SaveFormat::Json),
            "csv" => Ok(SaveFormat::Csv),
            other => Err(StorageError::UnknownFormat(other.to_string())),
        }
    }
}

const CSV_HEADER: [&str; 11] = [
    "instrument_id",
    "sequence_index",
    "timestamp",
    "value",
    "latency_s",
    "ok",
    "error_kind",
    "dropped",
    "delayed",
    "corrupted",
    "outlier",
];

/// Writes completed runs below a root directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    format: SaveFormat,
    metrics: Vec<Metric>,
    metadata_fields: Vec<String>,
}

impl ResultStore {
    /// Store writing below `root` in `format`, reporting every metric and
    /// every metadata field.
    pub fn new(root: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            root: root.into(),
            format,
            metrics: Metric::ALL.to_vec(),
            metadata_fields: Vec::new(),
        }
    }

    /// Restrict the per-instrument statistics written to `summary.json`.
    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Restrict `metadata.json` to these keys. Empty keeps everything.
    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.metadata_fields = fields;
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Measurement format.
    pub fn format(&self) -> SaveFormat {
        self.format
    }

    /// Create a fresh, uniquely named run directory.
    pub fn create_run_dir(&self) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        let dir = self.root.join(format!("{}_{}", stamp, &suffix[..8]));
        fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "Created run directory");
        Ok(dir)
    }

    /// Write `config.json`.
    pub fn write_config_snapshot<C: Serialize + ?Sized>(&self, dir: &Path, config: &C) -> Result<PathBuf> {
        write_json(&dir.join("config.json"), config)
    }

    /// Write the raw measurements in the configured format.
    pub fn write_measurements(&self, dir: &Path, result: &RunResult) -> Result<PathBuf> {
        let measurements = result.run().interleaved();
        match self.format {
            SaveFormat::Json => write_json(&dir.join("measurements.json"), &measurements),
            SaveFormat::Csv => {
                let path = dir.join("measurements.csv");
                let mut writer = csv::Writer::from_path(&path)?;
                writer.write_record(CSV_HEADER)?;
                for m in &measurements {
                    writer.write_record(csv_row(m))?;
                }
                writer.flush()?;
                debug!(path = %path.display(), rows = measurements.len(), "Wrote CSV");
                Ok(path)
            }
        }
    }

    /// Write `summary.json`.
    pub fn write_summary(&self, dir: &Path, result: &RunResult) -> Result<PathBuf> {
        write_json(&dir.join("summary.json"), &self.summary_document(result))
    }

    /// Write `metadata.json`, keeping only the configured fields when set.
    pub fn write_metadata(&self, dir: &Path, metadata: &BTreeMap<String, Value>) -> Result<PathBuf> {
        let filtered: BTreeMap<&String, &Value> = metadata
            .iter()
            .filter(|(k, _)| self.metadata_fields.is_empty() || self.metadata_fields.contains(k))
            .collect();
        write_json(&dir.join("metadata.json"), &filtered)
    }

    /// Write a complete run directory and return its path.
    pub fn save<C: Serialize + ?Sized>(
        &self,
        result: &RunResult,
        config: &C,
        metadata: &BTreeMap<String, Value>,
    ) -> Result<PathBuf> {
        let dir = self.create_run_dir()?;
        self.write_config_snapshot(&dir, config)?;
        self.write_measurements(&dir, result)?;
        self.write_summary(&dir, result)?;
        self.write_metadata(&dir, metadata)?;
        info!(path = %dir.display(), "Saved run");
        Ok(dir)
    }

    fn summary_document(&self, result: &RunResult) -> Value {
        let run = result.run();
        let analysis = result.analysis();

        let per_meter: Map<String, Value> = analysis
            .per_instrument
            .iter()
            .map(|s| (s.instrument_id.clone(), self.meter_entry(s)))
            .collect();

        let pairwise: Map<String, Value> = analysis
            .pairwise
            .iter()
            .map(|p| {
                (
                    p.key(),
                    json!({
                        "paired_count": p.paired_count,
                        "mae": p.mae,
                        "rmse": p.rmse,
                        "correlation": p.correlation,
                    }),
                )
            })
            .collect();

        json!({
            "generated_at": Utc::now().to_rfc3339(),
            "sampling_plan": run.plan(),
            "run": {
                "instrument_order": run.instrument_ids(),
                "ticks_completed": run.ticks_completed(),
                "cancelled": run.was_cancelled(),
                "overruns": run.overruns(),
                "started_at": run.started_at().to_rfc3339(),
                "finished_at": run.finished_at().to_rfc3339(),
                "total_measurements": run.total_measurements(),
            },
            "per_meter": per_meter,
            "pairwise": pairwise,
            "ranking": analysis.ranking,
        })
    }

    fn meter_entry(&self, s: &StatisticalSummary) -> Value {
        let mut entry = Map::new();
        entry.insert("total".into(), json!(s.total));
        entry.insert("ok_count".into(), json!(s.ok_count));
        entry.insert("success_rate".into(), json!(s.success_rate));
        entry.insert("error_counts".into(), json!(s.error_counts));
        entry.insert("suspected_corrupted".into(), json!(s.suspected_corrupted));
        entry.insert("statistical_outliers".into(), json!(s.statistical_outliers));
        for metric in &self.metrics {
            entry.insert(metric.as_str().into(), json!(s.metric(*metric)));
        }
        Value::Object(entry)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    debug!(path = %path.display(), "Wrote JSON");
    Ok(path.to_path_buf())
}

fn csv_row(m: &Measurement) -> [String; 11] {
    let tags = m.faults();
    [
        m.instrument_id().to_string(),
        m.sequence_index().to_string(),
        m.timestamp().to_rfc3339(),
        m.value().map(|v| v.to_string()).unwrap_or_default(),
        m.latency().as_secs_f64().to_string(),
        m.is_ok().to_string(),
        m.error_kind().map(|k| k.as_str().to_string()).unwrap_or_default(),
        tags.dropped.to_string(),
        tags.delayed.to_string(),
        tags.corrupted.to_string(),
        tags.outlier.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!("json".parse::<SaveFormat>().unwrap(), SaveFormat::Json);
        assert_eq!(" CSV ".parse::<SaveFormat>().unwrap(), SaveFormat::Csv);
        assert!(matches!(
            "parquet".parse::<SaveFormat>(),
            Err(StorageError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_csv_row_of_failure_leaves_value_empty() {
        let m = Measurement::failure(
            "entes",
            3,
            ammeter_core::ErrorKind::NoData,
            std::time::Duration::from_millis(5),
        );
        let row = csv_row(&m);
        assert_eq!(row[0], "entes");
        assert_eq!(row[1], "3");
        assert_eq!(row[3], "");
        assert_eq!(row[5], "false");
        assert_eq!(row[6], "no_data");
    }
}
