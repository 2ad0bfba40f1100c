//! Ratio-of-ratios oxygen saturation estimate

use crate::config::Spo2Config;
use ppg_core::{PpgResult, RollingWindow};
use tracing::trace;

/// EMA DC level and mean absolute AC deviation of one channel
#[derive(Debug, Clone, Default)]
struct ChannelTracker {
    dc: f32,
    ac: f32,
    initialized: bool,
}

impl ChannelTracker {
    fn update(&mut self, value: f32, dc_decay: f32, ac_decay: f32) {
        if !self.initialized {
            self.dc = value;
            self.ac = 0.0;
            self.initialized = true;
            return;
        }
        self.dc = dc_decay * self.dc + (1.0 - dc_decay) * value;
        self.ac = ac_decay * self.ac + (1.0 - ac_decay) * (value - self.dc).abs();
    }

    fn perfusion(&self) -> Option<f32> {
        (self.dc > 0.0 && self.ac > 0.0).then(|| self.ac / self.dc)
    }
}

/// Saturation estimator with windowed smoothing and quality hysteresis
///
/// Output is 0 until a first accepted estimate, then always within the
/// configured clamp band. Low-quality cycles hold the last good value.
pub struct Spo2Estimator {
    config: Spo2Config,
    red: ChannelTracker,
    ir: ChannelTracker,
    samples_seen: usize,
    estimates: RollingWindow<f32>,
    last_good: Option<f32>,
    last_ratio: Option<f32>,
}

impl Spo2Estimator {
    pub fn new(config: Spo2Config) -> PpgResult<Self> {
        let estimates = RollingWindow::new(config.window_capacity)?;
        Ok(Self {
            config,
            red: ChannelTracker::default(),
            ir: ChannelTracker::default(),
            samples_seen: 0,
            estimates,
            last_good: None,
            last_ratio: None,
        })
    }

    /// Track one raw sample, estimating on the configured cadence
    pub fn update(&mut self, ir: u32, red: u32, quality: f32) -> f32 {
        let (dc_decay, ac_decay) = (self.config.dc_decay, self.config.ac_decay);
        self.ir.update(ir as f32, dc_decay, ac_decay);
        self.red.update(red as f32, dc_decay, ac_decay);
        self.samples_seen += 1;

        let warmup = self.config.warmup_samples;
        if self.samples_seen > warmup && (self.samples_seen - warmup) % self.config.estimate_every == 0 {
            self.estimate(quality);
        }

        self.spo2()
    }

    fn estimate(&mut self, quality: f32) {
        let (Some(red), Some(ir)) = (self.red.perfusion(), self.ir.perfusion()) else {
            return;
        };
        let ratio = red / ir;
        self.last_ratio = Some(ratio);

        let Some(candidate) = [ratio, 1.0 / ratio]
            .into_iter()
            .map(|r| self.config.intercept - self.config.slope * r + self.config.calibration_offset)
            .find(|spo2| (self.config.plausible_min..=self.config.plausible_max).contains(spo2))
        else {
            trace!(ratio, "no plausible saturation for ratio");
            return;
        };

        if quality < self.config.min_quality {
            trace!(quality, "signal quality too low, holding saturation");
            return;
        }

        self.estimates.push(candidate);
        if let Some(mean) = self.estimates.mean() {
            self.last_good = Some(mean.clamp(self.config.clamp_min, self.config.clamp_max));
        }
    }

    /// Current output: the last good value, or 0 when unknown
    pub fn spo2(&self) -> f32 {
        self.last_good.unwrap_or(0.0)
    }

    /// Most recent ratio of ratios
    pub fn ratio(&self) -> Option<f32> {
        self.last_ratio
    }

    pub fn reset(&mut self) {
        self.red = ChannelTracker::default();
        self.ir = ChannelTracker::default();
        self.samples_seen = 0;
        self.estimates.clear();
        self.last_good = None;
        self.last_ratio = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> Spo2Estimator {
        Spo2Estimator::new(Spo2Config::default()).unwrap()
    }

    // Red perfusion set so that R = (110 - target) / 25
    fn feed(spo2: &mut Spo2Estimator, target: f32, seconds: usize, quality: f32) -> f32 {
        let ratio = (110.0 - target) / 25.0;
        let ir_ac = 10_000.0 / 85_000.0;
        let mut out = 0.0;
        for i in 0..seconds * 100 {
            let pulse = (2.0 * std::f32::consts::PI * 1.2 * i as f32 / 100.0).sin();
            let ir = 85_000.0 * (1.0 + ir_ac * pulse);
            let red = 40_000.0 * (1.0 + ratio * ir_ac * pulse);
            out = spo2.update(ir as u32, red as u32, quality);
        }
        out
    }

    #[test]
    fn test_zero_until_warm() {
        let mut spo2 = estimator();
        for _ in 0..50 {
            assert_eq!(spo2.update(85_000, 40_000, 100.0), 0.0);
        }
    }

    #[test]
    fn test_converges_to_target() {
        let mut spo2 = estimator();
        let value = feed(&mut spo2, 97.0, 20, 100.0);
        assert!((value - 97.0).abs() < 1.0, "spo2 {}", value);
        assert!((spo2.ratio().unwrap() - 0.52).abs() < 0.05);
    }

    #[test]
    fn test_inverted_ratio_fallback() {
        let mut spo2 = estimator();
        // R = 1 / 0.52: the direct formula is implausible, the inverse lands at 97
        let value = feed(&mut spo2, 110.0 - 25.0 / 0.52, 20, 100.0);
        assert!((value - 97.0).abs() < 1.0, "spo2 {}", value);
    }

    #[test]
    fn test_output_zero_or_within_band() {
        for target in [60.0, 80.0, 92.0, 95.0, 99.0, 105.0] {
            let mut spo2 = estimator();
            let value = feed(&mut spo2, target, 10, 100.0);
            assert!(value == 0.0 || (92.0..=100.0).contains(&value), "{} -> {}", target, value);
        }
    }

    #[test]
    fn test_low_quality_holds_last_good() {
        let mut spo2 = estimator();
        let good = feed(&mut spo2, 97.0, 15, 100.0);
        assert!(good > 0.0);

        let held = feed(&mut spo2, 94.0, 10, 5.0);
        assert_eq!(held, good);
    }

    #[test]
    fn test_low_quality_from_start_stays_unknown() {
        let mut spo2 = estimator();
        assert_eq!(feed(&mut spo2, 97.0, 10, 0.0), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut spo2 = estimator();
        feed(&mut spo2, 97.0, 10, 100.0);
        spo2.reset();
        assert_eq!(spo2.spo2(), 0.0);
        assert!(spo2.ratio().is_none());
    }
}
