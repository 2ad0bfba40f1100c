//! Pre-defined heart rate patterns for pulse simulation

use serde::{Deserialize, Serialize};

/// Heart rate trajectories the simulator can follow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PulsePattern {
    /// Constant rate with no beat-to-beat variation
    Steady { bpm: f32 },
    /// Linear change between two rates
    Ramp {
        start_bpm: f32,
        end_bpm: f32,
        duration: f32,
    },
    /// Rate surge after an onset time with suppressed variability
    Stress {
        base_bpm: f32,
        surge_bpm: f32,
        onset: f32,
    },
    /// Mean rate with random beat-to-beat interval jitter
    Arrhythmic { bpm: f32, irregularity: f32 },
}

// Time constant of the stress surge, in seconds
const SURGE_TIME_CONSTANT: f32 = 5.0;

impl PulsePattern {
    /// Mean heart rate at the given time
    pub fn bpm_at_time(&self, time: f32) -> f32 {
        match self {
            PulsePattern::Steady { bpm } => *bpm,

            PulsePattern::Ramp { start_bpm, end_bpm, duration } => {
                if time >= *duration {
                    *end_bpm
                } else {
                    start_bpm + (end_bpm - start_bpm) * (time / duration)
                }
            }

            PulsePattern::Stress { base_bpm, surge_bpm, onset } => {
                if time < *onset {
                    *base_bpm
                } else {
                    let progress = 1.0 - (-(time - onset) / SURGE_TIME_CONSTANT).exp();
                    base_bpm + surge_bpm * progress
                }
            }

            PulsePattern::Arrhythmic { bpm, .. } => *bpm,
        }
    }

    /// Relative standard deviation of each beat interval
    pub fn interval_jitter(&self, time: f32) -> f32 {
        match self {
            PulsePattern::Steady { .. } | PulsePattern::Ramp { .. } => 0.0,
            PulsePattern::Stress { onset, .. } => {
                if time < *onset {
                    0.04
                } else {
                    0.014
                }
            }
            PulsePattern::Arrhythmic { irregularity, .. } => irregularity.max(0.0),
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            PulsePattern::Steady { .. } => "Steady rhythm",
            PulsePattern::Ramp { .. } => "Gradual rate change",
            PulsePattern::Stress { .. } => "Stress response",
            PulsePattern::Arrhythmic { .. } => "Irregular rhythm",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, PulsePattern)> {
        vec![
            ("Resting", PulsePattern::Steady { bpm: 72.0 }),
            ("Bradycardia", PulsePattern::Steady { bpm: 48.0 }),
            ("Tachycardia", PulsePattern::Steady { bpm: 130.0 }),
            ("Warmup", PulsePattern::Ramp {
                start_bpm: 65.0, end_bpm: 110.0, duration: 60.0
            }),
            ("Recovery", PulsePattern::Ramp {
                start_bpm: 120.0, end_bpm: 75.0, duration: 90.0
            }),
            ("Stress", PulsePattern::Stress {
                base_bpm: 72.0, surge_bpm: 22.0, onset: 20.0
            }),
            ("Relaxed Breathing", PulsePattern::Arrhythmic {
                bpm: 66.0, irregularity: 0.05
            }),
            ("Atrial Fibrillation", PulsePattern::Arrhythmic {
                bpm: 95.0, irregularity: 0.2
            }),
        ]
    }
}

impl Default for PulsePattern {
    fn default() -> Self {
        PulsePattern::Steady { bpm: 72.0 }
    }
}
