//! End-to-end project execution.
//!
//! [`run_project`] wires a loaded [`ProjectConfig`] into the pipeline:
//! clients → sampler (faults, metrics, Ctrl-C) → analysis → run directory.

use crate::config::ProjectConfig;
use crate::metrics::StatsdSink;
use ammeter_analysis::RunResult;
use ammeter_core::{Ammeter, Measurement};
use ammeter_driver::{EmulatorBehavior, EmulatorServer};
use ammeter_sampler::{CancelHandle, MetricsSink, Sampler};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Directory holding the persisted run.
    pub run_dir: PathBuf,
    /// Sampled data and its analysis.
    pub result: RunResult,
}

/// Sample, analyse and persist one run as configured.
///
/// Ctrl-C stops sampling after the tick in progress; the partial run is still
/// analysed and saved.
pub async fn run_project(config: &ProjectConfig) -> Result<RunOutcome> {
    let plan = config.sampling_plan()?;
    let clients = config.clients()?;
    let (injector, rng) = config.fault_injector()?;
    let store = config.result_store()?;
    let seed = rng.seed();

    if config.analysis.visualization.enabled {
        warn!(
            plot_types = ?config.analysis.visualization.plot_types,
            "Plot generation is not available; visualization settings ignored"
        );
    }

    let instruments: Vec<Box<dyn Ammeter>> = clients
        .into_iter()
        .map(|c| Box::new(c) as Box<dyn Ammeter>)
        .collect();

    let mut sampler = Sampler::new(instruments, plan)
        .context("Failed to set up sampler")?
        .with_faults(injector, rng);

    match StatsdSink::from_config(&config.datadog) {
        Ok(Some(sink)) => {
            let sink: Arc<dyn MetricsSink> = Arc::new(sink);
            sampler = sampler.with_metrics(sink);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "StatsD sink unavailable; continuing without metrics"),
    }

    info!(
        frequency_hz = plan.frequency_hz(),
        count = ?plan.count(),
        duration = ?plan.duration(),
        fault_injection = config.fault_injection.enabled,
        seed,
        "Starting run"
    );

    let ctrl_c = spawn_ctrl_c_watcher(sampler.cancel_handle());
    let run = sampler.run().await;
    ctrl_c.abort();

    let result = RunResult::from_run(run);
    let metadata = run_metadata(config, &result, seed);
    let run_dir = store
        .save(&result, config, &metadata)
        .context("Failed to save run")?;

    if let Some(best) = result.analysis().ranking.best() {
        info!(best = %best.instrument_id, score = best.score, "Run complete");
    }

    Ok(RunOutcome { run_dir, result })
}

fn spawn_ctrl_c_watcher(handle: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after current tick");
                handle.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    })
}

/// Metadata describing a finished run; filtered by the store on write.
pub fn run_metadata(config: &ProjectConfig, result: &RunResult, seed: u64) -> BTreeMap<String, Value> {
    let run = result.run();
    let elapsed = run.finished_at() - run.started_at();
    let test_duration = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6;

    let mut meta = BTreeMap::new();
    meta.insert("timestamp".to_string(), json!(run.started_at().to_rfc3339()));
    meta.insert("test_duration".to_string(), json!(test_duration));
    meta.insert("sampling_frequency".to_string(), json!(run.plan().frequency_hz()));
    meta.insert("ammeter_type".to_string(), json!(run.instrument_ids()));
    meta.insert("measurements_count".to_string(), json!(run.plan().count()));
    meta.insert("ticks_completed".to_string(), json!(run.ticks_completed()));
    meta.insert("cancelled".to_string(), json!(run.was_cancelled()));
    meta.insert("fault_injection".to_string(), json!(config.fault_injection.enabled));
    meta.insert("fault_seed".to_string(), json!(seed));
    meta
}

/// One measurement per configured instrument, in sampling order.
pub async fn measure_all(config: &ProjectConfig) -> Result<Vec<Measurement>> {
    let mut out = Vec::new();
    for client in config.clients()? {
        out.push(client.measure_once().await);
    }
    Ok(out)
}

/// Start one emulator per configured instrument on its configured address.
pub async fn spawn_emulators(config: &ProjectConfig) -> Result<Vec<EmulatorServer>> {
    let mut servers = Vec::new();
    for client in config.clients()? {
        let address = client.address();
        let server = EmulatorServer::spawn(client.kind(), address.as_str(), EmulatorBehavior::Normal, None)
            .await
            .with_context(|| format!("Failed to start {} emulator on {}", client.kind(), address))?;
        servers.push(server);
    }
    Ok(servers)
}

/// Serve the configured emulators until Ctrl-C.
pub async fn emulate(config: &ProjectConfig) -> Result<()> {
    let servers = spawn_emulators(config).await?;
    info!(count = servers.len(), "Emulators running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down emulators");
    drop(servers);
    Ok(())
}
