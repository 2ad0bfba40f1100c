//! Sliding-window batch beat detection

use crate::config::DetectorConfig;
use crate::processor::{BeatDetector, DetectorState};
use crate::spectrum::{PulseSpectrum, SpectralEstimate};
use ppg_core::{BeatEvent, PpgResult};
use std::collections::VecDeque;
use tracing::{debug, trace};

// Newest samples excluded from peak picking until the next evaluation
const EDGE_GUARD: usize = 5;
const SMOOTHING_TAPS: usize = 4;

/// Finds local maxima over a fixed-size window every few samples
///
/// Peaks newer than the last accepted one are turned into beats and queued;
/// `detect` releases at most one queued beat per sample.
pub struct BatchBeatDetector {
    config: DetectorConfig,
    window: VecDeque<(u64, f32)>,
    since_evaluation: usize,
    last_peak_ms: Option<u64>,
    pending: VecDeque<BeatEvent>,
    spectrum: PulseSpectrum,
    last_estimate: Option<SpectralEstimate>,
    amplitude: f32,
}

impl BatchBeatDetector {
    pub fn new(config: DetectorConfig, sample_rate_hz: f32) -> PpgResult<Self> {
        let spectrum = PulseSpectrum::for_window(config.batch.window_samples, sample_rate_hz)?;
        Ok(Self {
            window: VecDeque::with_capacity(config.batch.window_samples),
            config,
            since_evaluation: 0,
            last_peak_ms: None,
            pending: VecDeque::new(),
            spectrum,
            last_estimate: None,
            amplitude: 0.0,
        })
    }

    /// Spectral estimate of the most recent evaluated window
    pub fn spectral_estimate(&self) -> Option<SpectralEstimate> {
        self.last_estimate
    }

    fn evaluate(&mut self) {
        let n = self.window.len();
        let mean = self.window.iter().map(|&(_, v)| v).sum::<f32>() / n as f32;
        let demeaned: Vec<f32> = self.window.iter().map(|&(_, v)| v - mean).collect();

        let estimate = match self.spectrum.analyze(&demeaned) {
            Ok(estimate) => estimate,
            Err(e) => {
                debug!(error = %e, "spectral analysis failed");
                return;
            }
        };
        self.last_estimate = Some(estimate);

        let smoothed = moving_average(&demeaned, SMOOTHING_TAPS);
        let max = smoothed.iter().cloned().fold(f32::MIN, f32::max);
        let min = smoothed.iter().cloned().fold(f32::MAX, f32::min);
        self.amplitude = (max - min) / 2.0;

        if estimate.purity < self.config.batch.min_spectral_purity {
            trace!(purity = estimate.purity, "window rejected by spectral purity");
            return;
        }
        if self.amplitude < self.config.min_amplitude {
            trace!(amplitude = self.amplitude, "window below minimum amplitude");
            return;
        }

        let threshold = self.config.threshold_ratio * max;
        for i in 1..n.saturating_sub(EDGE_GUARD) {
            let is_peak = smoothed[i] > smoothed[i - 1]
                && smoothed[i] >= smoothed[i + 1]
                && smoothed[i] > threshold;
            if !is_peak {
                continue;
            }

            let peak_ms = self.window[i].0;
            match self.last_peak_ms {
                Some(anchor) if peak_ms <= anchor => {}
                Some(anchor) if peak_ms - anchor < self.config.refractory_ms => {
                    trace!(peak_ms, "peak inside refractory period");
                }
                Some(anchor) => {
                    self.last_peak_ms = Some(peak_ms);
                    let ibi_ms = (peak_ms - anchor) as f32;
                    if ibi_ms >= self.config.ibi_min_ms && ibi_ms <= self.config.ibi_max_ms {
                        self.pending.push_back(BeatEvent {
                            timestamp_ms: peak_ms,
                            ibi_ms,
                        });
                    } else {
                        trace!(peak_ms, ibi_ms, "interval outside physiological bound");
                    }
                }
                None => self.last_peak_ms = Some(peak_ms),
            }
        }
    }
}

// Centered moving average, shrinking at the edges
fn moving_average(data: &[f32], taps: usize) -> Vec<f32> {
    let back = (taps - 1) / 2;
    let forward = taps / 2;
    (0..data.len())
        .map(|i| {
            let from = i.saturating_sub(back);
            let to = (i + forward).min(data.len() - 1);
            let slice = &data[from..=to];
            slice.iter().sum::<f32>() / slice.len() as f32
        })
        .collect()
}

impl BeatDetector for BatchBeatDetector {
    fn detect(&mut self, timestamp_ms: u64, ir: f32) -> Option<BeatEvent> {
        if self.window.len() == self.config.batch.window_samples {
            self.window.pop_front();
        }
        self.window.push_back((timestamp_ms, ir));
        self.since_evaluation += 1;

        if self.window.len() == self.config.batch.window_samples
            && self.since_evaluation >= self.config.batch.step_samples
        {
            self.since_evaluation = 0;
            self.evaluate();
        }

        self.pending.pop_front()
    }

    fn reset(&mut self) {
        self.window.clear();
        self.since_evaluation = 0;
        self.last_peak_ms = None;
        self.pending.clear();
        self.last_estimate = None;
        self.amplitude = 0.0;
    }

    fn name(&self) -> &str {
        "batch_window"
    }

    fn state(&self) -> DetectorState {
        if self.window.len() < self.config.batch.window_samples {
            DetectorState::Warmup
        } else if !self.pending.is_empty() {
            DetectorState::Refractory
        } else {
            DetectorState::Armed
        }
    }

    fn pulse_amplitude(&self) -> f32 {
        self.amplitude
    }
}
