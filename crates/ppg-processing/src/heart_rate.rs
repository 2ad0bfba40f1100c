//! Heart rate from inter-beat intervals

use crate::config::{HeartRateConfig, HeartRateSmoothing};
use ppg_core::{BeatEvent, PpgResult, RollingWindow};
use tracing::{debug, trace};

/// Converts accepted beats into a smoothed, range-checked BPM
pub struct HeartRateEstimator {
    config: HeartRateConfig,
    recent: Option<RollingWindow<f32>>,
    smoothed: f32,
    bpm: f32,
    beat_streak: u32,
    // Last beat folded into the estimate; rejected outliers do not count
    last_beat_ms: Option<u64>,
}

impl HeartRateEstimator {
    pub fn new(config: HeartRateConfig) -> PpgResult<Self> {
        let recent = match config.smoothing {
            HeartRateSmoothing::RollingAverage { window } => Some(RollingWindow::new(window)?),
            HeartRateSmoothing::Exponential { .. } => None,
        };

        Ok(Self {
            config,
            recent,
            smoothed: 0.0,
            bpm: 0.0,
            beat_streak: 0,
            last_beat_ms: None,
        })
    }

    /// Fold a detected beat into the estimate and return the new BPM
    ///
    /// A beat rejected as an outlier leaves the silence clock running, so a
    /// wrong EMA seed is dropped by the silence reset once real beats keep
    /// getting rejected.
    pub fn on_beat(&mut self, beat: &BeatEvent) -> f32 {
        let instantaneous = beat.instantaneous_bpm();

        let (value, accepted) = match self.config.smoothing {
            HeartRateSmoothing::RollingAverage { .. } => match self.recent.as_mut() {
                Some(recent) => {
                    recent.push(instantaneous);
                    (recent.mean().unwrap_or(0.0), true)
                }
                None => (0.0, false),
            },
            HeartRateSmoothing::Exponential { alpha, max_delta_bpm } => {
                let accepted = if self.smoothed == 0.0 {
                    let seeded = self.in_range(instantaneous);
                    if seeded {
                        self.smoothed = instantaneous;
                    }
                    seeded
                } else if (instantaneous - self.smoothed).abs() > max_delta_bpm {
                    trace!(instantaneous, smoothed = self.smoothed, "outlier rejected");
                    false
                } else {
                    self.smoothed += alpha * (instantaneous - self.smoothed);
                    true
                };
                (self.smoothed, accepted)
            }
        };

        if accepted {
            self.last_beat_ms = Some(beat.timestamp_ms);
            self.beat_streak += 1;
        }

        self.bpm = if self.in_range(value) { value } else { 0.0 };
        self.bpm
    }

    /// Reset when no beat was accepted within the silence timeout
    pub fn check_silence(&mut self, now_ms: u64) -> bool {
        match self.last_beat_ms {
            Some(last) if now_ms.saturating_sub(last) > self.config.silence_timeout_ms => {
                debug!(silent_ms = now_ms - last, "no beats within timeout, heart rate reset");
                self.reset();
                true
            }
            _ => false,
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Beats accepted since the last reset
    pub fn beat_streak(&self) -> u32 {
        self.beat_streak
    }

    pub fn reset(&mut self) {
        if let Some(recent) = self.recent.as_mut() {
            recent.clear();
        }
        self.smoothed = 0.0;
        self.bpm = 0.0;
        self.beat_streak = 0;
        self.last_beat_ms = None;
    }

    fn in_range(&self, bpm: f32) -> bool {
        bpm >= self.config.min_bpm && bpm <= self.config.max_bpm
    }
}
