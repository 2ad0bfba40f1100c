//! Sample-synchronous PPG feature pipeline

use crate::artifact::ArtifactGuard;
use crate::batch::BatchBeatDetector;
use crate::beat::EdgeBeatDetector;
use crate::conditioner::build_conditioner;
use crate::config::{DetectionStrategy, PipelineConfig, PipelineProfile};
use crate::heart_rate::HeartRateEstimator;
use crate::hrv::HrvEstimator;
use crate::processor::{
    BeatDetector, DetectorState, PerformanceSummary, ProcessingMetrics, SignalConditioner,
};
use crate::quality::{ContactChange, QualityGate};
use crate::spo2::Spo2Estimator;
use ppg_core::{FeatureRecord, PpgError, PpgResult, Sample, SampleBlock};
use tracing::{debug, info, trace, warn};

/// Quality gate, conditioner, beat detector and estimators driven one
/// sample at a time
///
/// All state is owned here and reset atomically inside `process` whenever
/// skin contact is lost or re-established.
pub struct Pipeline {
    config: PipelineConfig,
    gate: QualityGate,
    artifacts: ArtifactGuard,
    conditioner: Box<dyn SignalConditioner>,
    detector: Box<dyn BeatDetector>,
    heart_rate: HeartRateEstimator,
    hrv: HrvEstimator,
    spo2: Spo2Estimator,
    last_ibi_ms: Option<f32>,
    last_emit_ms: Option<u64>,
    performance: PerformanceSummary,
    budget_us: u64,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> PpgResult<Self> {
        config.validate()?;

        let conditioner = build_conditioner(&config.conditioner, config.sample_rate_hz)?;
        let detector: Box<dyn BeatDetector> = match config.detector.strategy {
            DetectionStrategy::Edge => Box::new(EdgeBeatDetector::new(config.detector.clone())),
            DetectionStrategy::BatchWindow => Box::new(BatchBeatDetector::new(
                config.detector.clone(),
                config.sample_rate_hz,
            )?),
        };

        debug!(
            name = %config.name,
            conditioner = conditioner.name(),
            detector = detector.name(),
            "pipeline created"
        );

        Ok(Pipeline {
            gate: QualityGate::new(config.quality.clone()),
            artifacts: ArtifactGuard::new(config.artifact.clone()),
            heart_rate: HeartRateEstimator::new(config.heart_rate.clone())?,
            hrv: HrvEstimator::new(config.hrv.clone())?,
            spo2: Spo2Estimator::new(config.spo2.clone())?,
            budget_us: (config.sample_period_ms() * 1000.0) as u64,
            conditioner,
            detector,
            config,
            last_ibi_ms: None,
            last_emit_ms: None,
            performance: PerformanceSummary::default(),
        })
    }

    /// Create a pipeline from one of the presets
    pub fn from_profile(profile: PipelineProfile) -> PpgResult<Self> {
        Self::new(PipelineConfig::for_profile(profile))
    }

    /// Process one sample, returning a record when one is due
    pub fn process(&mut self, sample: &Sample) -> Option<FeatureRecord> {
        let mut timer = ProcessingMetrics::start_timing();
        let record = self.process_sample(sample);
        timer.record(1, usize::from(record.is_some()));
        self.track(timer.finish());
        record
    }

    /// Process every sample of a block in order
    pub fn process_block(&mut self, block: &SampleBlock) -> PpgResult<Vec<FeatureRecord>> {
        if (block.sampling_rate() - self.config.sample_rate_hz).abs() > f32::EPSILON {
            return Err(PpgError::InvalidSamplingRate {
                rate: block.sampling_rate(),
                valid_range: format!("{}Hz", self.config.sample_rate_hz),
            });
        }

        let mut timer = ProcessingMetrics::start_timing();
        let records: Vec<FeatureRecord> = block
            .samples
            .iter()
            .filter_map(|sample| self.process_sample(sample))
            .collect();
        timer.record(block.len(), records.len());
        self.track(timer.finish());

        Ok(records)
    }

    fn process_sample(&mut self, sample: &Sample) -> Option<FeatureRecord> {
        let change = self.gate.update(sample);
        if let Some(change) = change {
            self.reset_estimators();
            match change {
                ContactChange::Placed => info!(timestamp_ms = sample.timestamp_ms, "finger placed"),
                ContactChange::Removed => info!(timestamp_ms = sample.timestamp_ms, "finger removed"),
            }
        }
        let contact_changed = change.is_some();

        if !self.gate.finger_detected() {
            return self.emit(FeatureRecord::no_contact(sample), contact_changed);
        }

        let in_artifact = self.artifacts.update(sample);
        self.heart_rate.check_silence(sample.timestamp_ms);

        if let Some(conditioned) = self.conditioner.condition(sample) {
            if let Some(beat) = self.detector.detect(sample.timestamp_ms, conditioned.ir) {
                if in_artifact {
                    trace!(timestamp_ms = beat.timestamp_ms, "beat discarded during artifact hold-off");
                } else {
                    self.heart_rate.on_beat(&beat);
                    self.hrv.push(beat.ibi_ms);
                    self.last_ibi_ms = Some(beat.ibi_ms);
                }
            }
        }

        let quality = if in_artifact {
            0.0
        } else {
            self.gate.score(sample, self.detector.pulse_amplitude())
        };
        let spo2 = self.spo2.update(sample.ir, sample.red, quality);
        let hrv = self.hrv.metrics();

        let record = FeatureRecord {
            timestamp_ms: sample.timestamp_ms,
            ir: sample.ir,
            red: sample.red,
            bpm: self.heart_rate.bpm(),
            hrv: hrv.rmssd,
            sdnn: hrv.sdnn,
            spo2,
            ibi_ms: self.last_ibi_ms,
            finger_detected: true,
            hrv_ready: hrv.ready,
            quality,
        };

        self.emit(record, contact_changed)
    }

    fn emit(&mut self, record: FeatureRecord, force: bool) -> Option<FeatureRecord> {
        let interval = self.config.reporting.emit_interval_ms;
        let due = force
            || interval == 0
            || self
                .last_emit_ms
                .map_or(true, |last| record.timestamp_ms.saturating_sub(last) >= interval);

        if due {
            self.last_emit_ms = Some(record.timestamp_ms);
            Some(record)
        } else {
            None
        }
    }

    fn track(&mut self, metrics: ProcessingMetrics) {
        if !metrics.meets_budget(self.budget_us) {
            warn!(
                processing_time_us = metrics.processing_time_us,
                samples = metrics.samples_processed,
                budget_us = self.budget_us,
                "processing exceeded the sample period"
            );
        }
        self.performance.update(&metrics, self.budget_us);
    }

    fn reset_estimators(&mut self) {
        self.conditioner.reset();
        self.detector.reset();
        self.artifacts.reset();
        self.heart_rate.reset();
        self.hrv.reset();
        self.spo2.reset();
        self.last_ibi_ms = None;
        debug!("estimator state reset");
    }

    /// Return the pipeline to its initial state
    pub fn reset(&mut self) {
        self.gate.reset();
        self.reset_estimators();
        self.last_emit_ms = None;
        self.performance = PerformanceSummary::default();
    }

    /// Get pipeline performance summary
    pub fn performance_summary(&self) -> PerformanceSummary {
        self.performance.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn finger_detected(&self) -> bool {
        self.gate.finger_detected()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.state()
    }

    /// Beats accepted since contact or the last silence reset
    pub fn beat_streak(&self) -> u32 {
        self.heart_rate.beat_streak()
    }

    /// Most recent SpO2 ratio of ratios
    pub fn spo2_ratio(&self) -> Option<f32> {
        self.spo2.ratio()
    }

    pub fn artifact_count(&self) -> u64 {
        self.artifacts.artifact_count()
    }

    /// Names of the active conditioner and detector
    pub fn strategy_names(&self) -> (&str, &str) {
        (self.conditioner.name(), self.detector.name())
    }
}
