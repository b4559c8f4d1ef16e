//! The sampling loop.
//!
//! Tick `n` targets `t0 + n * period`. Targets are always computed from the
//! run start, so a slow tick shortens the following sleep instead of shifting
//! every later tick. When a tick finishes past the next target, the next tick
//! starts immediately and the overrun is counted.

use crate::cancel::CancelHandle;
use crate::metrics::MetricsSink;
use ammeter_core::{Ammeter, DaqError, InstrumentSeries, Result, SampledRun, SamplingPlan};
use ammeter_faults::{FaultInjector, FaultRng};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Upper bound on the per-series preallocation.
const MAX_PREALLOCATED: usize = 100_000;

/// Runs one sampling plan across a fixed, ordered set of instruments.
pub struct Sampler {
    instruments: Vec<Box<dyn Ammeter>>,
    plan: SamplingPlan,
    injector: FaultInjector,
    rng: FaultRng,
    metrics: Option<Arc<dyn MetricsSink>>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Sampler {
    /// Sampler polling `instruments` in the given order.
    ///
    /// Rejects an empty instrument list and duplicate instrument ids.
    pub fn new(instruments: Vec<Box<dyn Ammeter>>, plan: SamplingPlan) -> Result<Self> {
        if instruments.is_empty() {
            return Err(DaqError::Configuration(
                "sampler needs at least one instrument".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for instrument in &instruments {
            if !seen.insert(instrument.instrument_id()) {
                return Err(DaqError::Configuration(format!(
                    "duplicate instrument id '{}'",
                    instrument.instrument_id()
                )));
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        Ok(Self {
            instruments,
            plan,
            injector: FaultInjector::disabled(),
            rng: FaultRng::new(Some(0)),
            metrics: None,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    /// Route every measurement through `injector`, drawing from `rng`.
    pub fn with_faults(mut self, injector: FaultInjector, rng: FaultRng) -> Self {
        self.injector = injector;
        self.rng = rng;
        self
    }

    /// Report every finalized measurement to `sink`.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Handle that stops the run between ticks.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(Arc::clone(&self.cancel_tx))
    }

    /// Plan this sampler executes.
    pub fn plan(&self) -> &SamplingPlan {
        &self.plan
    }

    /// Execute the plan. Consumes the sampler; the collected sequences move
    /// into the returned run.
    pub async fn run(mut self) -> SampledRun {
        let plan = self.plan;
        let capacity = expected_ticks(&plan).min(MAX_PREALLOCATED);
        let mut series: Vec<InstrumentSeries> = self
            .instruments
            .iter()
            .map(|i| InstrumentSeries::with_capacity(i.instrument_id(), capacity))
            .collect();

        info!(
            instruments = self.instruments.len(),
            frequency_hz = plan.frequency_hz(),
            count = ?plan.count(),
            duration_s = ?plan.duration().map(|d| d.as_secs_f64()),
            faults = self.injector.is_enabled(),
            seed = self.rng.seed(),
            "Sampling run started"
        );

        let started_at = Utc::now();
        let t0 = Instant::now();
        let mut n: u64 = 0;
        let mut overruns: u64 = 0;
        let mut cancelled = false;

        loop {
            if *self.cancel_rx.borrow_and_update() {
                cancelled = true;
                break;
            }
            if plan.should_stop(n, t0.elapsed()) {
                break;
            }

            debug!(tick = n, "Tick");
            for (instrument, s) in self.instruments.iter().zip(series.iter_mut()) {
                let real = instrument.measure(n).await;
                let m = self.injector.apply(real, &mut self.rng);
                if let Some(sink) = &self.metrics {
                    sink.record(&m);
                }
                s.push(m);
            }
            n += 1;

            if plan.count().is_some_and(|count| n >= count) {
                break;
            }

            let Some(next_target) = plan
                .target_offset(n)
                .and_then(|offset| t0.checked_add(offset))
            else {
                warn!(tick = n, "Next tick target is beyond the clock range, stopping");
                break;
            };
            let now = Instant::now();
            if now >= next_target {
                overruns += 1;
                debug!(
                    tick = n - 1,
                    late_ms = (now - next_target).as_secs_f64() * 1000.0,
                    "Tick overran next target"
                );
                continue;
            }

            tokio::select! {
                _ = sleep_until(next_target) => {}
                _ = self.cancel_rx.changed() => {}
            }
        }

        let finished_at = Utc::now();
        if cancelled {
            warn!(ticks = n, "Sampling run cancelled");
        }
        info!(
            ticks = n,
            overruns,
            elapsed_s = t0.elapsed().as_secs_f64(),
            "Sampling run finished"
        );

        SampledRun::new(plan, series)
            .with_timing(started_at, finished_at)
            .with_cancelled(cancelled)
            .with_overruns(overruns)
    }
}

fn expected_ticks(plan: &SamplingPlan) -> usize {
    let by_duration = plan
        .duration()
        .map(|d| (d.as_secs_f64() * plan.frequency_hz()).ceil() as u64 + 1);
    match (plan.count(), by_duration) {
        (Some(c), Some(d)) => c.min(d) as usize,
        (Some(c), None) => c as usize,
        (None, Some(d)) => d as usize,
        (None, None) => 0,
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field(
                "instruments",
                &self.instruments.iter().map(|i| i.instrument_id()).collect::<Vec<_>>(),
            )
            .field("plan", &self.plan)
            .field("injector", &self.injector)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
