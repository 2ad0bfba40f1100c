//! Skin-contact detection and signal quality scoring

use crate::config::{QualityConfig, QualityMode};
use ppg_core::Sample;

// EMA weight of the IR DC level used for perfusion
const DC_ALPHA: f32 = 0.01;

/// Contact transitions reported by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChange {
    Placed,
    Removed,
}

/// Decides whether a finger is on the sensor and how usable the signal is
pub struct QualityGate {
    config: QualityConfig,
    finger_detected: bool,
    ir_dc: Option<f32>,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            finger_detected: false,
            ir_dc: None,
        }
    }

    /// Update contact state from a raw sample, reporting transitions
    pub fn update(&mut self, sample: &Sample) -> Option<ContactChange> {
        let detected = sample.ir > self.config.finger_threshold;
        let change = match (self.finger_detected, detected) {
            (false, true) => Some(ContactChange::Placed),
            (true, false) => Some(ContactChange::Removed),
            _ => None,
        };
        self.finger_detected = detected;

        if change.is_some() {
            self.ir_dc = None;
        }
        if detected {
            let ir = sample.ir as f32;
            self.ir_dc = Some(match self.ir_dc {
                Some(dc) => dc + DC_ALPHA * (ir - dc),
                None => ir,
            });
        }

        change
    }

    pub fn finger_detected(&self) -> bool {
        self.finger_detected
    }

    /// Pulse amplitude over IR DC level, in percent
    pub fn perfusion_index(&self, pulse_amplitude: f32) -> f32 {
        match self.ir_dc {
            Some(dc) if dc > 0.0 => pulse_amplitude / dc * 100.0,
            _ => 0.0,
        }
    }

    /// Quality score in [0, 100] for the current sample
    pub fn score(&self, sample: &Sample, pulse_amplitude: f32) -> f32 {
        if !self.finger_detected {
            return 0.0;
        }

        let score = match self.config.mode {
            QualityMode::Intensity => {
                let above = sample.ir.saturating_sub(self.config.finger_threshold) as f32;
                let span = (self.config.full_scale_intensity - self.config.finger_threshold) as f32;
                above / span * 100.0
            }
            QualityMode::PulseAmplitude => {
                self.perfusion_index(pulse_amplitude) / self.config.full_scale_perfusion * 100.0
            }
        };

        score.clamp(0.0, 100.0)
    }

    pub fn reset(&mut self) {
        self.finger_detected = false;
        self.ir_dc = None;
    }
}
