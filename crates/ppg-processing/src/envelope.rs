//! Asymmetric baseline and decaying peak tracking

use crate::config::EnvelopeConfig;

/// Exponential baseline with a decaying peak tracker
///
/// The baseline pulls up faster than it pulls down so it settles close to
/// the pulse troughs. The peak jumps to any new maximum and otherwise decays
/// toward the baseline, giving `amplitude = peak - baseline`.
#[derive(Debug, Clone)]
pub struct EnvelopeTracker {
    config: EnvelopeConfig,
    warmup_count: usize,
    warmup_sum: f64,
    baseline: f32,
    peak: f32,
}

impl EnvelopeTracker {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            config,
            warmup_count: 0,
            warmup_sum: 0.0,
            baseline: 0.0,
            peak: 0.0,
        }
    }

    /// Track one value, returning whether the warm-up is complete
    pub fn update(&mut self, value: f32) -> bool {
        if self.warmup_count < self.config.warmup_samples {
            self.warmup_sum += value as f64;
            self.warmup_count += 1;
            if self.warmup_count == self.config.warmup_samples {
                self.baseline = (self.warmup_sum / self.warmup_count as f64) as f32;
                self.peak = self.baseline;
            }
            return false;
        }

        let alpha = if value > self.baseline {
            self.config.rise_alpha
        } else {
            self.config.fall_alpha
        };
        self.baseline += alpha * (value - self.baseline);

        self.peak = if value > self.peak {
            value
        } else {
            self.baseline + (self.peak - self.baseline) * self.config.peak_decay
        };

        true
    }

    pub fn is_ready(&self) -> bool {
        self.warmup_count >= self.config.warmup_samples
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn amplitude(&self) -> f32 {
        (self.peak - self.baseline).max(0.0)
    }

    /// Level `ratio` of the way from baseline to peak
    pub fn threshold(&self, ratio: f32) -> f32 {
        self.baseline + ratio * self.amplitude()
    }

    pub fn reset(&mut self) {
        self.warmup_count = 0;
        self.warmup_sum = 0.0;
        self.baseline = 0.0;
        self.peak = 0.0;
    }
}
