//! Configuration management for the PPG pipeline
//!
//! Every tunable constant of the pipeline lives here, grouped per component,
//! with presets for the supported conditioning/detection strategies.

use ppg_core::{config_error, PpgError, PpgResult, RecordingMetadata};
use serde::{Deserialize, Serialize};

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Configuration name
    pub name: String,
    /// Preset this configuration was derived from
    pub profile: PipelineProfile,
    /// Nominal sampling rate of the sample source (Hz)
    pub sample_rate_hz: f32,
    pub quality: QualityConfig,
    pub conditioner: ConditionerConfig,
    pub detector: DetectorConfig,
    pub heart_rate: HeartRateConfig,
    pub hrv: HrvConfig,
    pub spo2: Spo2Config,
    pub artifact: ArtifactConfig,
    pub reporting: ReportingConfig,
}

/// Presets for the supported strategy combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineProfile {
    /// Fixed bandpass conditioner with continuous edge detection
    BandpassEdge,
    /// Adaptive baseline conditioner with continuous edge detection
    AdaptiveBaseline,
    /// Fixed bandpass conditioner with sliding-window batch detection
    BatchWindow,
    /// Hand-tuned configuration
    Custom,
}

/// Contact detection and quality scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Raw IR level above which a finger is considered present
    pub finger_threshold: u32,
    pub mode: QualityMode,
    /// Raw IR level that maps to a quality of 100 in intensity mode
    pub full_scale_intensity: u32,
    /// Perfusion index (percent) that maps to a quality of 100 in pulse-amplitude mode
    pub full_scale_perfusion: f32,
}

/// How the 0-100 quality score is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityMode {
    /// From the raw IR intensity above the finger threshold
    Intensity,
    /// From detected pulse amplitude relative to the IR baseline
    PulseAmplitude,
}

/// Baseline removal strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionerKind {
    Bandpass,
    AdaptiveBaseline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionerConfig {
    pub kind: ConditionerKind,
    pub bandpass: BandpassConfig,
    pub adaptive: EnvelopeConfig,
}

/// Corner frequencies of the fixed bandpass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandpassConfig {
    pub low_cutoff_hz: f32,
    pub high_cutoff_hz: f32,
}

/// Asymmetric baseline and decaying peak tracker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Samples averaged before the baseline starts tracking
    pub warmup_samples: usize,
    /// EMA weight when the signal is above the baseline
    pub rise_alpha: f32,
    /// EMA weight when the signal is below the baseline (slower)
    pub fall_alpha: f32,
    /// Per-sample decay of the peak toward the baseline
    pub peak_decay: f32,
}

/// Beat detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionStrategy {
    /// Derivative sign change against an adaptive threshold, every sample
    Edge,
    /// Local maxima over a sliding window, evaluated every few samples
    BatchWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub strategy: DetectionStrategy,
    /// Envelope used by the edge detector for its threshold
    pub envelope: EnvelopeConfig,
    /// Threshold position between baseline and peak
    pub threshold_ratio: f32,
    /// Minimum pulse amplitude in conditioned units
    pub min_amplitude: f32,
    /// Minimum time between accepted beats
    pub refractory_ms: u64,
    /// Shortest inter-beat interval reported
    pub ibi_min_ms: f32,
    /// Longest inter-beat interval reported
    pub ibi_max_ms: f32,
    pub batch: BatchConfig,
}

/// Sliding-window detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Samples held in the analysis window
    pub window_samples: usize,
    /// Samples between two evaluations
    pub step_samples: usize,
    /// Windows with less cardiac-band spectral purity yield no beats
    pub min_spectral_purity: f32,
}

/// Heart-rate smoothing method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HeartRateSmoothing {
    /// Mean of the last `window` instantaneous values
    RollingAverage { window: usize },
    /// EMA that ignores values more than `max_delta_bpm` away from it
    Exponential { alpha: f32, max_delta_bpm: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateConfig {
    pub smoothing: HeartRateSmoothing,
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Reset after this long without an accepted beat
    pub silence_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrvConfig {
    /// IBIs kept in the rolling window
    pub capacity: usize,
    /// Entries required before variability is reported
    pub min_ready: usize,
    /// Successive differences above this are treated as detector artifacts
    pub outlier_ms: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spo2Config {
    /// Decay of the DC trackers
    pub dc_decay: f32,
    /// Decay of the AC trackers
    pub ac_decay: f32,
    /// Saturation estimates averaged for output
    pub window_capacity: usize,
    /// Samples after contact before the first estimate
    pub warmup_samples: usize,
    /// Samples between estimates
    pub estimate_every: usize,
    /// spo2 = intercept - slope * R + calibration_offset
    pub intercept: f32,
    pub slope: f32,
    pub calibration_offset: f32,
    /// Band a raw estimate must land in to be accepted
    pub plausible_min: f32,
    pub plausible_max: f32,
    /// Band the smoothed output is clamped to
    pub clamp_min: f32,
    pub clamp_max: f32,
    /// Quality below which the last good value is held
    pub min_quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub enabled: bool,
    /// Jump size relative to the running mean absolute step
    pub jump_factor: f32,
    /// Absolute floor on the jump size (raw units)
    pub min_jump: f32,
    /// EMA weight of the running mean absolute step
    pub step_alpha: f32,
    /// Time after an artifact during which beats are discarded
    pub holdoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Minimum time between emitted records; 0 emits every sample
    pub emit_interval_ms: u64,
}

impl PipelineConfig {
    /// Bandpass conditioning with edge detection
    pub fn bandpass_edge() -> Self {
        PipelineConfig {
            name: "Bandpass edge".to_string(),
            profile: PipelineProfile::BandpassEdge,
            sample_rate_hz: 100.0,
            quality: QualityConfig::default(),
            conditioner: ConditionerConfig {
                kind: ConditionerKind::Bandpass,
                bandpass: BandpassConfig::default(),
                adaptive: EnvelopeConfig::baseline(),
            },
            detector: DetectorConfig::default(),
            heart_rate: HeartRateConfig {
                smoothing: HeartRateSmoothing::RollingAverage { window: 5 },
                ..HeartRateConfig::default()
            },
            hrv: HrvConfig::default(),
            spo2: Spo2Config::default(),
            artifact: ArtifactConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }

    /// Adaptive baseline conditioning with edge detection and stricter bounds
    pub fn adaptive_baseline() -> Self {
        PipelineConfig {
            name: "Adaptive baseline".to_string(),
            profile: PipelineProfile::AdaptiveBaseline,
            sample_rate_hz: 100.0,
            quality: QualityConfig {
                mode: QualityMode::PulseAmplitude,
                ..QualityConfig::default()
            },
            conditioner: ConditionerConfig {
                kind: ConditionerKind::AdaptiveBaseline,
                bandpass: BandpassConfig::default(),
                adaptive: EnvelopeConfig::baseline(),
            },
            detector: DetectorConfig {
                ibi_min_ms: 500.0,
                ibi_max_ms: 1500.0,
                ..DetectorConfig::default()
            },
            heart_rate: HeartRateConfig {
                silence_timeout_ms: 1800,
                ..HeartRateConfig::default()
            },
            hrv: HrvConfig::default(),
            spo2: Spo2Config::default(),
            artifact: ArtifactConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }

    /// Bandpass conditioning with sliding-window batch detection
    pub fn batch_window() -> Self {
        PipelineConfig {
            name: "Batch window".to_string(),
            profile: PipelineProfile::BatchWindow,
            sample_rate_hz: 100.0,
            quality: QualityConfig::default(),
            conditioner: ConditionerConfig {
                kind: ConditionerKind::Bandpass,
                bandpass: BandpassConfig::default(),
                adaptive: EnvelopeConfig::baseline(),
            },
            detector: DetectorConfig {
                strategy: DetectionStrategy::BatchWindow,
                ..DetectorConfig::default()
            },
            heart_rate: HeartRateConfig {
                smoothing: HeartRateSmoothing::RollingAverage { window: 4 },
                silence_timeout_ms: 3000,
                ..HeartRateConfig::default()
            },
            hrv: HrvConfig::default(),
            spo2: Spo2Config::default(),
            artifact: ArtifactConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }

    /// Create configuration for the given profile
    pub fn for_profile(profile: PipelineProfile) -> Self {
        match profile {
            PipelineProfile::BandpassEdge => Self::bandpass_edge(),
            PipelineProfile::AdaptiveBaseline => Self::adaptive_baseline(),
            PipelineProfile::BatchWindow => Self::batch_window(),
            PipelineProfile::Custom => Self::bandpass_edge(),
        }
    }

    /// Nominal sample period in milliseconds
    pub fn sample_period_ms(&self) -> f32 {
        1000.0 / self.sample_rate_hz
    }

    /// Validate entire configuration
    pub fn validate(&self) -> PpgResult<()> {
        RecordingMetadata::validate_sampling_rate(self.sample_rate_hz)?;

        self.quality.validate()?;
        self.conditioner.validate(self.sample_rate_hz)?;
        self.detector.validate()?;
        self.heart_rate.validate()?;
        self.hrv.validate()?;
        self.spo2.validate()?;
        self.artifact.validate()?;

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> PpgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON, validating it
    pub fn from_json(json: &str) -> PpgResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::bandpass_edge()
    }
}

impl QualityConfig {
    fn validate(&self) -> PpgResult<()> {
        if self.full_scale_intensity <= self.finger_threshold {
            return Err(config_error!("Full-scale intensity must exceed the finger threshold"));
        }
        if self.full_scale_perfusion <= 0.0 {
            return Err(config_error!("Full-scale perfusion index must be positive"));
        }
        Ok(())
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            finger_threshold: 50_000,
            mode: QualityMode::Intensity,
            full_scale_intensity: 200_000,
            full_scale_perfusion: 5.0,
        }
    }
}

impl ConditionerConfig {
    fn validate(&self, sample_rate_hz: f32) -> PpgResult<()> {
        let nyquist = sample_rate_hz / 2.0;
        let band = &self.bandpass;
        if band.low_cutoff_hz <= 0.0 || band.low_cutoff_hz >= band.high_cutoff_hz {
            return Err(config_error!("Bandpass low cutoff must be positive and below the high cutoff"));
        }
        if band.high_cutoff_hz >= nyquist {
            return Err(config_error!("Bandpass high cutoff must be less than Nyquist frequency"));
        }
        self.adaptive.validate("conditioner")
    }
}

impl Default for BandpassConfig {
    fn default() -> Self {
        Self {
            low_cutoff_hz: 0.5,
            high_cutoff_hz: 5.0,
        }
    }
}

impl EnvelopeConfig {
    /// Tracker for raw intensity baselines
    pub fn baseline() -> Self {
        Self {
            warmup_samples: 50,
            rise_alpha: 0.02,
            fall_alpha: 0.01,
            peak_decay: 0.997,
        }
    }

    fn validate(&self, owner: &str) -> PpgResult<()> {
        if self.warmup_samples == 0 {
            return Err(PpgError::InvalidCapacity {
                buffer: "envelope warm-up",
                requested: 0,
            });
        }
        let in_unit = |v: f32| v > 0.0 && v < 1.0;
        if !in_unit(self.rise_alpha) || !in_unit(self.fall_alpha) || !in_unit(self.peak_decay) {
            return Err(config_error!("{} envelope coefficients must lie in (0, 1)", owner));
        }
        if self.fall_alpha > self.rise_alpha {
            return Err(config_error!("{} envelope must pull down slower than it pulls up", owner));
        }
        Ok(())
    }
}

impl DetectorConfig {
    fn validate(&self) -> PpgResult<()> {
        self.envelope.validate("detector")?;

        if !(self.threshold_ratio > 0.0 && self.threshold_ratio < 1.0) {
            return Err(config_error!("Threshold ratio must lie in (0, 1)"));
        }
        if self.min_amplitude < 0.0 {
            return Err(config_error!("Minimum amplitude cannot be negative"));
        }
        if self.refractory_ms == 0 {
            return Err(config_error!("Refractory period must be greater than 0"));
        }
        if self.ibi_min_ms <= 0.0 || self.ibi_min_ms >= self.ibi_max_ms {
            return Err(config_error!(
                "IBI bounds [{}, {}]ms are not a valid range",
                self.ibi_min_ms, self.ibi_max_ms
            ));
        }

        let batch = &self.batch;
        if batch.window_samples < 16 {
            return Err(PpgError::InvalidCapacity {
                buffer: "batch window",
                requested: batch.window_samples,
            });
        }
        if batch.step_samples == 0 || batch.step_samples > batch.window_samples {
            return Err(config_error!("Batch step must be between 1 and the window size"));
        }
        if !(0.0..=1.0).contains(&batch.min_spectral_purity) {
            return Err(config_error!("Spectral purity threshold must lie in [0, 1]"));
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::Edge,
            envelope: EnvelopeConfig {
                warmup_samples: 50,
                rise_alpha: 0.01,
                fall_alpha: 0.005,
                peak_decay: 0.997,
            },
            threshold_ratio: 0.35,
            min_amplitude: 50.0,
            refractory_ms: 500,
            ibi_min_ms: 300.0,
            ibi_max_ms: 2000.0,
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_samples: 400,
            step_samples: 25,
            min_spectral_purity: 0.15,
        }
    }
}

impl HeartRateConfig {
    fn validate(&self) -> PpgResult<()> {
        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(config_error!("Heart-rate range must satisfy 0 < min < max"));
        }
        if self.silence_timeout_ms == 0 {
            return Err(config_error!("Silence timeout must be greater than 0"));
        }
        match self.smoothing {
            HeartRateSmoothing::RollingAverage { window } if window == 0 => {
                Err(PpgError::InvalidCapacity {
                    buffer: "heart-rate window",
                    requested: window,
                })
            }
            HeartRateSmoothing::Exponential { alpha, max_delta_bpm }
                if !(alpha > 0.0 && alpha <= 1.0) || max_delta_bpm <= 0.0 =>
            {
                Err(config_error!("Exponential smoothing needs alpha in (0, 1] and a positive delta"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            smoothing: HeartRateSmoothing::Exponential {
                alpha: 0.3,
                max_delta_bpm: 20.0,
            },
            min_bpm: 40.0,
            max_bpm: 150.0,
            silence_timeout_ms: 2500,
        }
    }
}

impl HrvConfig {
    fn validate(&self) -> PpgResult<()> {
        if self.capacity < 2 {
            return Err(PpgError::InvalidCapacity {
                buffer: "hrv window",
                requested: self.capacity,
            });
        }
        if self.min_ready < 2 || self.min_ready > self.capacity {
            return Err(config_error!("HRV readiness count must be between 2 and the window capacity"));
        }
        if self.outlier_ms <= 0.0 {
            return Err(config_error!("HRV outlier bound must be positive"));
        }
        Ok(())
    }
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            min_ready: 5,
            outlier_ms: 250.0,
        }
    }
}

impl Spo2Config {
    fn validate(&self) -> PpgResult<()> {
        let in_unit = |v: f32| v > 0.0 && v < 1.0;
        if !in_unit(self.dc_decay) || !in_unit(self.ac_decay) {
            return Err(config_error!("SpO2 tracker decays must lie in (0, 1)"));
        }
        if self.window_capacity == 0 {
            return Err(PpgError::InvalidCapacity {
                buffer: "spo2 window",
                requested: 0,
            });
        }
        if self.estimate_every == 0 {
            return Err(config_error!("SpO2 estimation interval must be at least one sample"));
        }
        if self.plausible_min >= self.plausible_max || self.clamp_min >= self.clamp_max {
            return Err(config_error!("SpO2 bands must have min below max"));
        }
        if self.clamp_min <= 0.0 || self.clamp_max > 100.0 {
            return Err(config_error!("SpO2 clamp band must lie within (0, 100]"));
        }
        Ok(())
    }
}

impl Default for Spo2Config {
    fn default() -> Self {
        Self {
            dc_decay: 0.999,
            ac_decay: 0.9,
            window_capacity: 25,
            warmup_samples: 50,
            estimate_every: 10,
            intercept: 110.0,
            slope: 25.0,
            calibration_offset: 0.0,
            plausible_min: 93.0,
            plausible_max: 99.5,
            clamp_min: 92.0,
            clamp_max: 100.0,
            min_quality: 10.0,
        }
    }
}

impl ArtifactConfig {
    fn validate(&self) -> PpgResult<()> {
        if self.jump_factor <= 1.0 || self.min_jump <= 0.0 {
            return Err(config_error!("Artifact jump factor must exceed 1 and the floor must be positive"));
        }
        if !(self.step_alpha > 0.0 && self.step_alpha < 1.0) {
            return Err(config_error!("Artifact step alpha must lie in (0, 1)"));
        }
        Ok(())
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jump_factor: 6.0,
            min_jump: 4000.0,
            step_alpha: 0.05,
            holdoff_ms: 500,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self { emit_interval_ms: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for profile in [
            PipelineProfile::BandpassEdge,
            PipelineProfile::AdaptiveBaseline,
            PipelineProfile::BatchWindow,
            PipelineProfile::Custom,
        ] {
            let config = PipelineConfig::for_profile(profile);
            assert!(config.validate().is_ok(), "{:?} preset should be valid", profile);
        }
    }

    #[test]
    fn test_adaptive_preset_is_stricter() {
        let config = PipelineConfig::adaptive_baseline();
        assert_eq!(config.conditioner.kind, ConditionerKind::AdaptiveBaseline);
        assert_eq!(config.detector.ibi_min_ms, 500.0);
        assert_eq!(config.detector.ibi_max_ms, 1500.0);
        assert_eq!(config.quality.mode, QualityMode::PulseAmplitude);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::bandpass_edge();
        assert!(config.validate().is_ok());

        config.sample_rate_hz = 5.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::bandpass_edge();
        config.conditioner.bandpass.high_cutoff_hz = 60.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::bandpass_edge();
        config.hrv.capacity = 0;
        assert!(matches!(config.validate(), Err(PpgError::InvalidCapacity { .. })));

        let mut config = PipelineConfig::bandpass_edge();
        config.detector.ibi_min_ms = 2500.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::bandpass_edge();
        config.detector.envelope.fall_alpha = 0.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::bandpass_edge();
        config.spo2.clamp_max = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_messages() {
        let mut config = PipelineConfig::bandpass_edge();
        config.detector.refractory_ms = 0;
        assert_eq!(
            config.validate(),
            Err(PpgError::ConfigurationError {
                message: "Refractory period must be greater than 0".to_string()
            })
        );

        let mut config = PipelineConfig::bandpass_edge();
        config.detector.ibi_min_ms = 2500.0;
        match config.validate() {
            Err(PpgError::ConfigurationError { message }) => assert!(message.contains("[2500, ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_heart_rate_smoothing_validation() {
        let mut config = PipelineConfig::bandpass_edge();
        config.heart_rate.smoothing = HeartRateSmoothing::RollingAverage { window: 0 };
        assert!(config.validate().is_err());

        config.heart_rate.smoothing = HeartRateSmoothing::Exponential {
            alpha: 1.5,
            max_delta_bpm: 20.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_serialization() {
        let config = PipelineConfig::batch_window();

        let json = config.to_json().unwrap();
        assert!(!json.is_empty());

        let deserialized = PipelineConfig::from_json(&json).unwrap();
        assert_eq!(config.name, deserialized.name);
        assert_eq!(config.profile, deserialized.profile);
        assert_eq!(deserialized.detector.strategy, DetectionStrategy::BatchWindow);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(PipelineConfig::from_json("{\"name\": 3}").is_err());

        let mut config = PipelineConfig::bandpass_edge();
        config.detector.refractory_ms = 0;
        let json = config.to_json().unwrap();
        assert!(PipelineConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_sample_period() {
        let config = PipelineConfig::default();
        assert!((config.sample_period_ms() - 10.0).abs() < 1e-6);
    }
}
