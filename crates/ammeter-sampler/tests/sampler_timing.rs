//! Sampler behaviour under a paused clock, with in-process fakes.

use ammeter_core::{Ammeter, ErrorKind, Measurement, SamplingPlan};
use ammeter_faults::{FaultInjector, FaultProfile, FaultRng};
use ammeter_sampler::{MetricsSink, Sampler};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Answers a fixed value after a fixed busy time, recording when each
/// request started.
struct FakeAmmeter {
    id: String,
    value: Option<f64>,
    busy: Duration,
    starts: Arc<Mutex<Vec<Instant>>>,
}

impl FakeAmmeter {
    fn new(id: &str, value: f64) -> Self {
        Self {
            id: id.to_string(),
            value: Some(value),
            busy: Duration::ZERO,
            starts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(id: &str) -> Self {
        Self {
            value: None,
            ..Self::new(id, 0.0)
        }
    }

    fn busy(mut self, busy: Duration) -> Self {
        self.busy = busy;
        self
    }
}

#[async_trait]
impl Ammeter for FakeAmmeter {
    fn instrument_id(&self) -> &str {
        &self.id
    }

    async fn measure(&self, sequence_index: u64) -> Measurement {
        self.starts.lock().unwrap().push(Instant::now());
        if !self.busy.is_zero() {
            tokio::time::sleep(self.busy).await;
        }
        match self.value {
            Some(v) => Measurement::success(&self.id, sequence_index, v, self.busy),
            None => Measurement::failure(&self.id, sequence_index, ErrorKind::Timeout, self.busy),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<(String, u64)>>,
}

impl MetricsSink for RecordingSink {
    fn record(&self, m: &Measurement) {
        self.seen
            .lock()
            .unwrap()
            .push((m.instrument_id().to_string(), m.sequence_index()));
    }
}

fn boxed(fakes: Vec<FakeAmmeter>) -> Vec<Box<dyn Ammeter>> {
    fakes.into_iter().map(|f| Box::new(f) as Box<dyn Ammeter>).collect()
}

fn trio() -> Vec<Box<dyn Ammeter>> {
    boxed(vec![
        FakeAmmeter::new("greenlee", 0.10),
        FakeAmmeter::new("entes", 0.11),
        FakeAmmeter::new("circutor", 0.012),
    ])
}

#[tokio::test(start_paused = true)]
async fn test_count_bound_is_exact() {
    let plan = SamplingPlan::with_count(7, 10.0).unwrap();
    let run = Sampler::new(trio(), plan).unwrap().run().await;

    assert_eq!(run.ticks_completed(), 7);
    assert!(!run.was_cancelled());
    assert_eq!(run.overruns(), 0);
    for s in run.series() {
        assert_eq!(s.len(), 7);
        let seqs: Vec<u64> = s.measurements().iter().map(|m| m.sequence_index()).collect();
        assert_eq!(seqs, (0..7).collect::<Vec<_>>());
        assert!(s.measurements().iter().all(|m| m.instrument_id() == s.instrument_id()));
    }
    assert_eq!(run.instrument_ids(), vec!["greenlee", "entes", "circutor"]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_count_collects_nothing() {
    let plan = SamplingPlan::with_count(0, 5.0).unwrap();
    let run = Sampler::new(trio(), plan).unwrap().run().await;
    assert_eq!(run.ticks_completed(), 0);
    assert_eq!(run.series().len(), 3);
    assert!(run.series().iter().all(|s| s.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_next_target_ends_run() {
    // A 1e19 s period is a valid plan, but tick 1 lies past the clock's range.
    let plan = SamplingPlan::with_count(5, 1e-19).unwrap();
    let run = Sampler::new(trio(), plan).unwrap().run().await;
    assert_eq!(run.ticks_completed(), 1);
    assert_eq!(run.total_measurements(), 3);
    assert!(!run.was_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_duration_bound_tick_count() {
    let plan = SamplingPlan::with_duration(Duration::from_secs(2), 5.0).unwrap();
    let run = Sampler::new(trio(), plan).unwrap().run().await;
    let ticks = run.ticks_completed();
    assert!((9..=11).contains(&ticks), "got {} ticks", ticks);
    assert!(run.series().iter().all(|s| s.len() as u64 == ticks));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_fixed_targets() {
    let fake = FakeAmmeter::new("greenlee", 0.1).busy(Duration::from_millis(50));
    let starts = Arc::clone(&fake.starts);
    let plan = SamplingPlan::with_count(20, 5.0).unwrap();

    let run = Sampler::new(boxed(vec![fake]), plan).unwrap().run().await;
    assert_eq!(run.ticks_completed(), 20);
    assert_eq!(run.overruns(), 0);

    let starts = starts.lock().unwrap();
    let t0 = starts[0];
    for (n, start) in starts.iter().enumerate() {
        let expected = Duration::from_millis(200 * n as u64);
        let actual = *start - t0;
        let err = if actual > expected { actual - expected } else { expected - actual };
        assert!(err <= Duration::from_millis(1), "tick {} at {:?}", n, actual);
    }
}

#[tokio::test(start_paused = true)]
async fn test_overrun_catches_up_without_sleeping() {
    let fake = FakeAmmeter::new("entes", 0.1).busy(Duration::from_millis(300));
    let starts = Arc::clone(&fake.starts);
    let plan = SamplingPlan::with_count(5, 5.0).unwrap();

    let run = Sampler::new(boxed(vec![fake]), plan).unwrap().run().await;
    assert_eq!(run.ticks_completed(), 5);
    assert_eq!(run.overruns(), 4);

    let starts = starts.lock().unwrap();
    let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.iter().all(|g| *g == Duration::from_millis(300)), "{:?}", gaps);
}

#[tokio::test(start_paused = true)]
async fn test_slow_instrument_is_absorbed_by_schedule() {
    let plan = SamplingPlan::with_count(10, 2.0).unwrap();
    let fakes = vec![
        FakeAmmeter::new("greenlee", 0.1).busy(Duration::from_millis(300)),
        FakeAmmeter::new("entes", 0.1),
    ];
    let started = Instant::now();
    let run = Sampler::new(boxed(fakes), plan).unwrap().run().await;
    assert_eq!(run.overruns(), 0);
    // Last tick starts at 9 * 500ms and takes 300ms.
    assert_eq!(started.elapsed(), Duration::from_millis(4800));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_ticks_keeps_partial_run() {
    let plan = SamplingPlan::with_duration(Duration::from_secs(60), 10.0).unwrap();
    let sampler = Sampler::new(trio(), plan).unwrap();
    let handle = sampler.cancel_handle();

    let task = tokio::spawn(sampler.run());
    tokio::time::sleep(Duration::from_millis(1050)).await;
    handle.cancel();
    let run = task.await.unwrap();

    assert!(run.was_cancelled());
    let ticks = run.ticks_completed();
    assert!((10..=12).contains(&ticks), "got {} ticks", ticks);
    assert!(run.series().iter().all(|s| s.len() as u64 == ticks));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start() {
    let plan = SamplingPlan::with_count(100, 1.0).unwrap();
    let sampler = Sampler::new(trio(), plan).unwrap();
    sampler.cancel_handle().cancel();
    let run = sampler.run().await;
    assert!(run.was_cancelled());
    assert_eq!(run.total_measurements(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seeded_drops_are_reproducible() {
    let profile = FaultProfile::builder().drop_prob(0.3).build().unwrap();
    let plan = SamplingPlan::with_count(150, 5.0).unwrap();

    let run = Sampler::new(trio(), plan)
        .unwrap()
        .with_faults(FaultInjector::new(profile), FaultRng::new(Some(42)))
        .run()
        .await;

    let drops = run
        .interleaved()
        .iter()
        .filter(|m| m.error_kind() == Some(ErrorKind::FaultDrop))
        .count();

    // Replay the same decision stream directly through the injector.
    let injector = FaultInjector::new(profile);
    let mut rng = FaultRng::new(Some(42));
    let mut expected = 0;
    for n in 0..150 {
        for id in ["greenlee", "entes", "circutor"] {
            let m = injector.apply(Measurement::success(id, n, 0.1, Duration::ZERO), &mut rng);
            if m.error_kind() == Some(ErrorKind::FaultDrop) {
                expected += 1;
            }
        }
    }

    assert_eq!(drops, expected);
    let ratio = drops as f64 / 450.0;
    assert!((0.2..0.4).contains(&ratio), "drop ratio {}", ratio);

    let again = Sampler::new(trio(), plan)
        .unwrap()
        .with_faults(FaultInjector::new(profile), FaultRng::new(Some(42)))
        .run()
        .await;
    let pattern = |r: &ammeter_core::SampledRun| {
        r.interleaved().iter().map(|m| m.is_ok()).collect::<Vec<_>>()
    };
    assert_eq!(pattern(&run), pattern(&again));
}

#[tokio::test(start_paused = true)]
async fn test_full_corruption_differs_from_baseline() {
    let plan = SamplingPlan::with_count(30, 5.0).unwrap();
    let baseline = Sampler::new(trio(), plan).unwrap().run().await;
    let corrupted = Sampler::new(trio(), plan)
        .unwrap()
        .with_faults(
            FaultInjector::new(FaultProfile::builder().corrupt_prob(1.0).build().unwrap()),
            FaultRng::new(Some(3)),
        )
        .run()
        .await;

    for (b, c) in baseline.interleaved().iter().zip(corrupted.interleaved()) {
        assert!(c.is_ok());
        assert_eq!(c.error_kind(), None);
        assert_ne!(c.value(), b.value());
        assert!(c.faults().corrupted);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_recorded_not_fatal() {
    let plan = SamplingPlan::with_count(4, 5.0).unwrap();
    let fakes = vec![
        FakeAmmeter::new("greenlee", 0.1),
        FakeAmmeter::failing("entes"),
        FakeAmmeter::new("circutor", 0.01),
    ];
    let run = Sampler::new(boxed(fakes), plan).unwrap().run().await;

    let entes = run.series_for("entes").unwrap();
    assert_eq!(entes.len(), 4);
    assert!(entes
        .measurements()
        .iter()
        .all(|m| !m.is_ok() && m.error_kind() == Some(ErrorKind::Timeout)));
    assert_eq!(run.series_for("circutor").unwrap().ok_values().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_sink_sees_every_measurement_in_order() {
    let sink = Arc::new(RecordingSink::default());
    let plan = SamplingPlan::with_count(2, 5.0).unwrap();
    Sampler::new(trio(), plan)
        .unwrap()
        .with_metrics(sink.clone())
        .run()
        .await;

    let seen = sink.seen.lock().unwrap().clone();
    let expected: Vec<(String, u64)> = (0..2)
        .flat_map(|n| ["greenlee", "entes", "circutor"].map(|id| (id.to_string(), n)))
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_rejects_bad_instrument_sets() {
    let plan = SamplingPlan::with_count(1, 1.0).unwrap();
    assert!(Sampler::new(Vec::new(), plan).is_err());
    let dupes = boxed(vec![FakeAmmeter::new("entes", 0.1), FakeAmmeter::new("entes", 0.2)]);
    assert!(Sampler::new(dupes, plan).is_err());
}
