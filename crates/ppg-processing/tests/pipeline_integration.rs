//! End-to-end pipeline runs against simulated sensor data

use ppg_core::FeatureRecord;
use ppg_processing::{Pipeline, PipelineConfig, PipelineProfile};
use ppg_simulation::{FingerLift, NoiseConfig, PpgSimulator, PulsePattern, SimulatorConfig};

fn run(config: PipelineConfig, simulator: SimulatorConfig, seconds: f32) -> Vec<FeatureRecord> {
    let mut pipeline = Pipeline::new(config).unwrap();
    let mut simulator = PpgSimulator::new(simulator).unwrap();
    let block = simulator.generate(seconds).unwrap();
    pipeline.process_block(&block).unwrap()
}

fn noisy(pattern: PulsePattern) -> SimulatorConfig {
    SimulatorConfig {
        pattern,
        seed: Some(7),
        ..SimulatorConfig::default()
    }
}

fn every_sample(mut config: PipelineConfig) -> PipelineConfig {
    config.reporting.emit_interval_ms = 0;
    config
}

fn assert_record_ranges(records: &[FeatureRecord]) {
    for record in records {
        assert!((0.0..=150.0).contains(&record.bpm), "bpm {}", record.bpm);
        assert!(record.spo2 == 0.0 || (92.0..=100.0).contains(&record.spo2), "spo2 {}", record.spo2);
        assert!((0.0..=100.0).contains(&record.quality), "quality {}", record.quality);
        if !record.finger_detected {
            assert_eq!(record.bpm, 0.0);
            assert_eq!(record.spo2, 0.0);
            assert!(!record.hrv_ready);
        }
    }
}

#[test]
fn test_bandpass_edge_tracks_resting_rate() {
    let records = run(
        PipelineConfig::bandpass_edge(),
        noisy(PulsePattern::Steady { bpm: 72.0 }),
        30.0,
    );
    assert_record_ranges(&records);

    let last = records.last().unwrap();
    assert!(last.finger_detected);
    assert!((last.bpm - 72.0).abs() <= 3.0, "bpm {}", last.bpm);
    assert!(last.hrv_ready);
    assert!((last.ibi_ms.unwrap() - 833.0).abs() < 40.0);
}

#[test]
fn test_adaptive_baseline_tracks_resting_rate() {
    let records = run(
        PipelineConfig::adaptive_baseline(),
        SimulatorConfig::quiet(PulsePattern::Steady { bpm: 72.0 }),
        30.0,
    );
    assert_record_ranges(&records);

    let last = records.last().unwrap();
    assert!((last.bpm - 72.0).abs() <= 3.0, "bpm {}", last.bpm);
    assert!(last.quality > 0.0);
}

#[test]
fn test_batch_window_tracks_resting_rate() {
    let records = run(
        PipelineConfig::batch_window(),
        noisy(PulsePattern::Steady { bpm: 72.0 }),
        30.0,
    );
    assert_record_ranges(&records);

    let last = records.last().unwrap();
    assert!((last.bpm - 72.0).abs() <= 3.0, "bpm {}", last.bpm);
}

#[test]
fn test_profiles_agree_on_slow_rhythm() {
    for profile in [PipelineProfile::BandpassEdge, PipelineProfile::BatchWindow] {
        let records = run(
            PipelineConfig::for_profile(profile),
            SimulatorConfig::quiet(PulsePattern::Steady { bpm: 60.0 }),
            30.0,
        );
        let last = records.last().unwrap();
        assert!((last.bpm - 60.0).abs() <= 3.0, "{:?}: bpm {}", profile, last.bpm);
    }
}

#[test]
fn test_saturation_follows_target() {
    for target in [95.0, 98.0] {
        let simulator = SimulatorConfig {
            target_spo2: target,
            ..noisy(PulsePattern::default())
        };
        let records = run(PipelineConfig::default(), simulator, 30.0);
        let spo2 = records.last().unwrap().spo2;
        assert!((spo2 - target).abs() < 1.5, "target {} got {}", target, spo2);
    }
}

#[test]
fn test_finger_lift_clears_and_recovers() {
    let simulator = SimulatorConfig {
        finger_lifts: vec![FingerLift { start: 15.0, duration: 3.0 }],
        ..noisy(PulsePattern::default())
    };
    let records = run(every_sample(PipelineConfig::default()), simulator, 35.0);
    assert_record_ranges(&records);

    let before = records.iter().find(|r| r.timestamp_ms == 14_990).unwrap();
    assert!(before.finger_detected);
    assert!(before.bpm > 0.0);

    // Zeroed on the first sample without contact
    let lifted = records.iter().find(|r| r.timestamp_ms == 15_000).unwrap();
    assert!(!lifted.finger_detected);
    assert_eq!(lifted.bpm, 0.0);
    assert_eq!(lifted.hrv, 0.0);
    assert!(lifted.ibi_ms.is_none());

    // Nothing carries over from before the lift
    let placed = records.iter().find(|r| r.timestamp_ms == 18_000).unwrap();
    assert!(placed.finger_detected);
    assert_eq!(placed.bpm, 0.0);
    assert!(!placed.hrv_ready);

    let last = records.last().unwrap();
    assert!((last.bpm - 72.0).abs() <= 3.0, "bpm {}", last.bpm);
}

#[test]
fn test_lift_and_placement_emitted_despite_throttle() {
    let simulator = SimulatorConfig {
        finger_lifts: vec![FingerLift { start: 5.005, duration: 1.0 }],
        ..noisy(PulsePattern::default())
    };
    let records = run(PipelineConfig::default(), simulator, 8.0);

    // 5010 and 6010 fall between the 100 ms reporting ticks
    assert!(records.iter().any(|r| r.timestamp_ms == 5_010 && !r.finger_detected));
    assert!(records.iter().any(|r| r.timestamp_ms == 6_010 && r.finger_detected));
}

#[test]
fn test_variability_reflects_rhythm() {
    let steady = run(
        PipelineConfig::bandpass_edge(),
        SimulatorConfig::quiet(PulsePattern::Steady { bpm: 72.0 }),
        40.0,
    );
    let irregular = run(
        PipelineConfig::bandpass_edge(),
        SimulatorConfig::quiet(PulsePattern::Arrhythmic { bpm: 72.0, irregularity: 0.2 }),
        40.0,
    );

    let steady = steady.last().unwrap();
    let irregular = irregular.last().unwrap();
    assert!(steady.hrv_ready && irregular.hrv_ready);
    assert!(steady.sdnn < 20.0, "steady sdnn {}", steady.sdnn);
    assert!(irregular.sdnn > 60.0, "irregular sdnn {}", irregular.sdnn);
    assert!(irregular.hrv > steady.hrv);
}

#[test]
fn test_motion_artifacts_keep_outputs_bounded() {
    let simulator = SimulatorConfig {
        noise: NoiseConfig {
            motion_artifact_prob: 0.004,
            ..NoiseConfig::none()
        },
        ..SimulatorConfig::quiet(PulsePattern::default())
    };
    let mut pipeline = Pipeline::new(every_sample(PipelineConfig::default())).unwrap();
    let block = PpgSimulator::new(simulator).unwrap().generate(30.0).unwrap();
    let records = pipeline.process_block(&block).unwrap();

    assert_record_ranges(&records);
    assert!(pipeline.artifact_count() > 0);
}

#[test]
fn test_artifact_holdoff_freezes_outputs() {
    let config = every_sample(PipelineConfig::default());
    let holdoff_ms = config.artifact.holdoff_ms;
    let mut pipeline = Pipeline::new(config).unwrap();

    // Sensor shifts by 20k counts at 25 s
    let mut block = PpgSimulator::new(SimulatorConfig::quiet(PulsePattern::default()))
        .unwrap()
        .generate(27.0)
        .unwrap();
    for sample in block.samples.iter_mut().filter(|s| s.timestamp_ms >= 25_000) {
        sample.ir += 20_000;
    }
    let records = pipeline.process_block(&block).unwrap();

    let before = records.iter().find(|r| r.timestamp_ms == 24_990).unwrap();
    assert!(before.spo2 > 0.0);
    assert!(before.quality > 0.0);
    assert!(before.hrv_ready);

    let window: Vec<_> = records
        .iter()
        .filter(|r| (25_000..25_000 + holdoff_ms).contains(&r.timestamp_ms))
        .collect();
    assert_eq!(window.len() as u64, holdoff_ms / 10);
    for record in window {
        assert!(record.finger_detected);
        assert_eq!(record.quality, 0.0, "t {}", record.timestamp_ms);
        assert_eq!(record.spo2, before.spo2, "t {}", record.timestamp_ms);
        assert_eq!(record.bpm, before.bpm);
        assert_eq!(record.ibi_ms, before.ibi_ms);
        assert_eq!(record.hrv, before.hrv);
        assert_eq!(record.sdnn, before.sdnn);
    }
    assert_eq!(pipeline.artifact_count(), 1);
}

#[test]
fn test_config_round_trip_drives_pipeline() {
    let json = PipelineConfig::batch_window().to_json().unwrap();
    let config = PipelineConfig::from_json(&json).unwrap();
    assert_eq!(config.to_json().unwrap(), json);

    let pipeline = Pipeline::new(config).unwrap();
    assert_eq!(pipeline.strategy_names(), ("bandpass", "batch_window"));
}

#[test]
fn test_performance_summary_counts_samples() {
    let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let mut simulator = PpgSimulator::new(noisy(PulsePattern::default())).unwrap();

    let mut emitted = 0;
    for _ in 0..50 {
        let chunk = simulator.generate_chunk(0.1).unwrap();
        emitted += pipeline.process_block(&chunk).unwrap().len();
    }

    let summary = pipeline.performance_summary();
    assert_eq!(summary.samples_processed, 500);
    assert_eq!(summary.records_emitted, emitted as u64);
    assert_eq!(emitted, 50);
}
