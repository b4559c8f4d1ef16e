//! Analysis over whole runs.

use ammeter_analysis::{analyze, RunResult};
use ammeter_core::{ErrorKind, InstrumentSeries, Measurement, SampledRun, SamplingPlan};
use std::time::Duration;

fn series_from(id: &str, values: impl IntoIterator<Item = Option<f64>>) -> InstrumentSeries {
    let mut s = InstrumentSeries::new(id);
    for (i, v) in values.into_iter().enumerate() {
        s.push(match v {
            Some(v) => Measurement::success(id, i as u64, v, Duration::from_millis(2)),
            None => Measurement::failure(id, i as u64, ErrorKind::Timeout, Duration::from_secs(2)),
        });
    }
    s
}

fn wave(base: f64, amplitude: f64, n: usize) -> Vec<Option<f64>> {
    (0..n)
        .map(|i| Some(base + amplitude * ((i as f64) * 0.7).sin()))
        .collect()
}

fn three_meter_run() -> SampledRun {
    let plan = SamplingPlan::with_count(15, 5.0).unwrap();
    SampledRun::new(
        plan,
        vec![
            series_from("greenlee", wave(0.10, 0.010, 15)),
            series_from("entes", wave(0.10, 0.012, 15)),
            series_from("circutor", wave(0.10, 0.050, 15)),
        ],
    )
}

#[test]
fn test_all_ok_scenario_ranks_every_instrument() {
    let result = RunResult::from_run(three_meter_run());
    let run = result.run();
    assert_eq!(run.series().len(), 3);
    for s in run.series() {
        assert_eq!(s.len(), 15);
        assert!(s.measurements().iter().all(Measurement::is_ok));
    }

    let analysis = result.analysis();
    assert_eq!(analysis.per_instrument.len(), 3);
    assert_eq!(analysis.pairwise.len(), 3);
    assert!(analysis.pairwise.iter().all(|p| p.paired_count == 15));

    let ranks: Vec<usize> = analysis.ranking.entries().iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    let scores: Vec<f64> = analysis.ranking.entries().iter().map(|e| e.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // The noisiest instrument disagrees most and is least stable.
    assert_eq!(analysis.ranking.order().last(), Some(&"circutor"));
}

#[test]
fn test_analysis_is_idempotent() {
    let run = three_meter_run();
    let first = analyze(&run);
    let second = analyze(&run);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_dead_instrument_still_reported() {
    let plan = SamplingPlan::with_count(5, 5.0).unwrap();
    let run = SampledRun::new(
        plan,
        vec![
            series_from("greenlee", wave(0.1, 0.01, 5)),
            series_from("entes", vec![None; 5]),
        ],
    );
    let result = RunResult::from_run(run);
    let analysis = result.analysis();

    let dead = analysis.summary_for("entes").unwrap();
    assert_eq!(dead.ok_count, 0);
    assert_eq!(dead.mean, None);
    assert_eq!(dead.std_dev, None);
    assert_eq!(dead.error_counts.get(&ErrorKind::Timeout), Some(&5));

    let pair = analysis.pair("entes", "greenlee").unwrap();
    assert_eq!(pair.paired_count, 0);
    assert_eq!(pair.mae, None);
    assert!(pair.rmse.map_or(true, f64::is_finite));

    assert_eq!(analysis.ranking.order(), vec!["greenlee", "entes"]);
    let json = serde_json::to_value(analysis).unwrap();
    assert!(json["pairwise"][0]["mae"].is_null());
}

#[test]
fn test_disjoint_successes_leave_agreement_undefined() {
    let plan = SamplingPlan::with_count(4, 5.0).unwrap();
    let run = SampledRun::new(
        plan,
        vec![
            series_from("greenlee", vec![Some(0.1), None, Some(0.1), None]),
            series_from("entes", vec![None, Some(0.1), None, Some(0.1)]),
        ],
    );
    let analysis = analyze(&run);
    let pair = &analysis.pairwise[0];
    assert_eq!(pair.mae, None);
    assert_eq!(pair.rmse, None);
    assert_eq!(pair.correlation, None);
    for entry in analysis.ranking.entries() {
        assert_eq!(entry.agreement_score, 0.5);
        assert!(entry.score.is_finite());
    }
}

#[test]
fn test_empty_run() {
    let plan = SamplingPlan::with_count(0, 5.0).unwrap();
    let run = SampledRun::new(plan, vec![InstrumentSeries::new("greenlee")]);
    let result = RunResult::from_run(run);
    let summary = &result.analysis().per_instrument[0];
    assert_eq!(summary.total, 0);
    assert_eq!(summary.success_rate, 0.0);
    assert_eq!(result.analysis().ranking.entries().len(), 1);
    let (run, _) = result.into_parts();
    assert_eq!(run.total_measurements(), 0);
}
