//! Red/IR pulse oximeter simulator with controllable saturation and noise

use crate::pulse_patterns::PulsePattern;
use ppg_core::{PpgError, PpgResult, RecordingMetadata, Sample, SampleBlock, SensorProfile};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use tracing::debug;

// Waveform shape: systolic wave, dicrotic component and respiratory modulation
const DICROTIC_GAIN: f32 = 0.25;
const DICROTIC_SHIFT: f32 = 0.6;
const RESPIRATION_GAIN: f32 = 0.08;
const RESPIRATION_HZ: f32 = 0.25;

// Baseline wander frequency
const WANDER_HZ: f32 = 0.05;

// Ambient light reaching the photodiode without a finger
const AMBIENT_IR: f32 = 1_200.0;
const AMBIENT_RED: f32 = 800.0;

// Per-sample decay of a motion artifact offset
const ARTIFACT_DECAY: f32 = 0.97;

/// Noise configuration for realistic PPG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise on the normalized pulse waveform
    pub pulse_noise: f32,
    /// Gaussian noise on each raw channel, in ADC counts
    pub sensor_noise: f32,
    /// Baseline wander as a fraction of the DC level
    pub baseline_wander: f32,
    /// Motion artifact probability per sample (0.0 to 1.0)
    pub motion_artifact_prob: f32,
    /// Peak motion artifact offset, in ADC counts
    pub motion_artifact_amp: f32,
}

impl NoiseConfig {
    /// Noise-free signal
    pub fn none() -> Self {
        Self {
            pulse_noise: 0.0,
            sensor_noise: 0.0,
            baseline_wander: 0.0,
            motion_artifact_prob: 0.0,
            motion_artifact_amp: 0.0,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            pulse_noise: 0.02,
            sensor_noise: 120.0,
            baseline_wander: 0.01,
            motion_artifact_prob: 0.0,
            motion_artifact_amp: 25_000.0,
        }
    }
}

/// Interval during which the finger is off the sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerLift {
    /// Start time in seconds
    pub start: f32,
    /// Duration in seconds
    pub duration: f32,
}

impl FingerLift {
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start && time < self.start + self.duration
    }
}

/// Configuration for PPG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Sensor the data claims to come from
    pub sensor: SensorProfile,
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Heart rate pattern to follow
    pub pattern: PulsePattern,
    /// Arterial saturation encoded in the red/IR perfusion ratio
    pub target_spo2: f32,
    /// IR DC level in ADC counts
    pub ir_dc: f32,
    /// IR pulse amplitude in ADC counts
    pub ir_ac: f32,
    /// Red DC level as a fraction of the IR DC level
    pub red_dc_ratio: f32,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Scheduled finger removals
    pub finger_lifts: Vec<FingerLift>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    /// Noise-free configuration following the given pattern
    pub fn quiet(pattern: PulsePattern) -> Self {
        Self {
            pattern,
            noise: NoiseConfig::none(),
            seed: Some(0),
            ..Self::default()
        }
    }

    /// Ratio of ratios that maps to the target saturation
    pub fn target_ratio(&self) -> f32 {
        (110.0 - self.target_spo2) / 25.0
    }

    pub fn validate(&self) -> PpgResult<()> {
        RecordingMetadata::validate_sampling_rate(self.sampling_rate)?;

        if !(70.0..=100.0).contains(&self.target_spo2) {
            return Err(simulation_error(format!(
                "Target SpO2 {} outside 70-100%",
                self.target_spo2
            )));
        }

        let peak = self.ir_dc + 2.0 * self.ir_ac;
        if self.ir_ac <= 0.0 || self.ir_dc <= 2.0 * self.ir_ac {
            return Err(simulation_error(format!(
                "IR DC {} must exceed twice the pulse amplitude {}",
                self.ir_dc, self.ir_ac
            )));
        }
        if peak > self.sensor.full_scale() as f32 {
            return Err(simulation_error(format!(
                "IR peak {} exceeds {} full scale",
                peak, self.sensor
            )));
        }

        if !(0.0..=1.0).contains(&self.red_dc_ratio) || self.red_dc_ratio == 0.0 {
            return Err(simulation_error(format!(
                "Red DC ratio {} must be in (0, 1]",
                self.red_dc_ratio
            )));
        }

        let noise = &self.noise;
        if noise.pulse_noise < 0.0
            || noise.sensor_noise < 0.0
            || noise.baseline_wander < 0.0
            || noise.motion_artifact_amp < 0.0
            || !(0.0..=1.0).contains(&noise.motion_artifact_prob)
        {
            return Err(simulation_error("Noise parameters must be non-negative"));
        }

        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sensor: SensorProfile::Simulated,
            sampling_rate: 100.0,
            pattern: PulsePattern::default(),
            target_spo2: 97.0,
            ir_dc: 85_000.0,
            ir_ac: 16_000.0,
            red_dc_ratio: 0.48,
            noise: NoiseConfig::default(),
            finger_lifts: Vec::new(),
            seed: None,
        }
    }
}

fn simulation_error(message: impl Into<String>) -> PpgError {
    PpgError::SimulationError {
        message: message.into(),
    }
}

fn normal(std_dev: f32) -> PpgResult<Normal<f32>> {
    Normal::new(0.0, std_dev)
        .map_err(|e| simulation_error(format!("Failed to create normal distribution: {}", e)))
}

/// PPG signal simulator
pub struct PpgSimulator {
    config: SimulatorConfig,
    rng: rand::rngs::StdRng,
    pulse_noise: Normal<f32>,
    sensor_noise: Normal<f32>,
    sample_index: u64,
    phase: f32,
    interval_scale: f32,
    artifact_offset: f32,
}

impl PpgSimulator {
    /// Create new simulator with configuration
    pub fn new(config: SimulatorConfig) -> PpgResult<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });

        Ok(PpgSimulator {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            pulse_noise: normal(config.noise.pulse_noise)?,
            sensor_noise: normal(config.noise.sensor_noise)?,
            config,
            sample_index: 0,
            phase: 0.0,
            interval_scale: 1.0,
            artifact_offset: 0.0,
        })
    }

    /// Generate a block of samples for the specified duration
    pub fn generate(&mut self, duration: f32) -> PpgResult<SampleBlock> {
        let metadata =
            RecordingMetadata::new(self.config.sensor, self.config.sampling_rate, duration)?;
        let samples = (0..metadata.expected_samples())
            .map(|_| self.next_sample())
            .collect();

        SampleBlock::new(samples, metadata)
    }

    /// Generate continuous chunks for streaming
    pub fn generate_chunk(&mut self, chunk_duration: f32) -> PpgResult<SampleBlock> {
        self.generate(chunk_duration)
    }

    /// Produce the next raw sample
    pub fn next_sample(&mut self) -> Sample {
        let rate = self.config.sampling_rate;
        let time = self.time();
        let timestamp_ms = (self.sample_index as f64 * 1000.0 / rate as f64).round() as u64;
        self.sample_index += 1;

        self.advance_phase(time);

        if self.config.finger_lifts.iter().any(|lift| lift.contains(time)) {
            let ir = AMBIENT_IR + self.sensor_noise.sample(&mut self.rng).abs();
            let red = AMBIENT_RED + self.sensor_noise.sample(&mut self.rng).abs();
            return Sample::new(timestamp_ms, ir as u32, red as u32);
        }

        let pulse = self.pulse_waveform(time);
        let wander = 1.0
            + self.config.noise.baseline_wander * (2.0 * PI * WANDER_HZ * time).sin();
        let artifact = self.motion_artifact();

        let ir_dc = self.config.ir_dc * wander;
        let red_dc = ir_dc * self.config.red_dc_ratio;
        let ir_perfusion = self.config.ir_ac / self.config.ir_dc;
        let red_perfusion = self.config.target_ratio() * ir_perfusion;

        let ir = ir_dc * (1.0 + ir_perfusion * pulse)
            + artifact
            + self.sensor_noise.sample(&mut self.rng);
        let red = red_dc * (1.0 + red_perfusion * pulse)
            + artifact * self.config.red_dc_ratio
            + self.sensor_noise.sample(&mut self.rng);

        Sample::new(timestamp_ms, self.to_counts(ir), self.to_counts(red))
    }

    fn advance_phase(&mut self, time: f32) {
        let beat_hz = self.config.pattern.bpm_at_time(time) / 60.0;
        self.phase += 2.0 * PI * beat_hz / self.interval_scale / self.config.sampling_rate;

        // New beat: draw the next interval scale
        if self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
            let jitter = self.config.pattern.interval_jitter(time);
            self.interval_scale = if jitter > 0.0 {
                let draw: f32 = self.rng.sample(rand_distr::StandardNormal);
                (1.0 + jitter * draw).clamp(0.6, 1.6)
            } else {
                1.0
            };
        }
    }

    /// Normalized pulse waveform at the current phase
    fn pulse_waveform(&mut self, time: f32) -> f32 {
        let systolic = self.phase.sin();
        let dicrotic = DICROTIC_GAIN * (self.phase + DICROTIC_SHIFT).sin();
        let respiration = RESPIRATION_GAIN * (2.0 * PI * RESPIRATION_HZ * time).sin();
        systolic + dicrotic + respiration + self.pulse_noise.sample(&mut self.rng)
    }

    fn motion_artifact(&mut self) -> f32 {
        self.artifact_offset *= ARTIFACT_DECAY;

        let noise = &self.config.noise;
        if noise.motion_artifact_prob > 0.0 && self.rng.gen::<f32>() < noise.motion_artifact_prob {
            self.artifact_offset = noise.motion_artifact_amp * self.rng.gen_range(-1.0f32..1.0);
            debug!(time = self.time(), offset = self.artifact_offset, "injected motion artifact");
        }

        self.artifact_offset
    }

    fn to_counts(&self, value: f32) -> u32 {
        value.clamp(0.0, self.config.sensor.full_scale() as f32) as u32
    }

    /// Simulation time of the next sample, in seconds
    pub fn time(&self) -> f32 {
        self.sample_index as f32 / self.config.sampling_rate
    }

    /// Take the finger off the sensor for the given duration, starting now
    pub fn lift_finger(&mut self, duration: f32) {
        let start = self.time();
        self.config.finger_lifts.push(FingerLift { start, duration });
    }

    /// Reset time offset (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
        self.phase = 0.0;
        self.interval_scale = 1.0;
        self.artifact_offset = 0.0;
    }

    /// Get current configuration
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Update configuration, keeping the simulation clock
    pub fn update_config(&mut self, config: SimulatorConfig) -> PpgResult<()> {
        config.validate()?;

        self.pulse_noise = normal(config.noise.pulse_noise)?;
        self.sensor_noise = normal(config.noise.sensor_noise)?;
        self.config = config;
        Ok(())
    }

    /// Switch the heart rate pattern
    pub fn set_pattern(&mut self, pattern: PulsePattern) {
        self.config.pattern = pattern;
    }
}
