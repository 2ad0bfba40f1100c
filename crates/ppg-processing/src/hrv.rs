//! Heart-rate variability over a rolling IBI window

use crate::config::HrvConfig;
use ppg_core::{PpgResult, RollingWindow};
use serde::{Deserialize, Serialize};

/// Time-domain variability metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    /// Root mean square of successive differences (ms)
    pub rmssd: f32,
    /// Standard deviation of the intervals (ms)
    pub sdnn: f32,
    pub ready: bool,
    pub count: usize,
}

pub struct HrvEstimator {
    config: HrvConfig,
    intervals: RollingWindow<f32>,
}

impl HrvEstimator {
    pub fn new(config: HrvConfig) -> PpgResult<Self> {
        let intervals = RollingWindow::new(config.capacity)?;
        Ok(Self { config, intervals })
    }

    pub fn push(&mut self, ibi_ms: f32) {
        self.intervals.push(ibi_ms);
    }

    pub fn is_ready(&self) -> bool {
        self.intervals.len() >= self.config.min_ready
    }

    /// RMSSD, skipping successive pairs further apart than the outlier bound
    pub fn rmssd(&self) -> f32 {
        if !self.is_ready() {
            return 0.0;
        }

        let values = self.intervals.to_vec();
        let (sum_sq, pairs) = values
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|diff| diff.abs() <= self.config.outlier_ms)
            .fold((0.0f32, 0usize), |(sum, n), diff| (sum + diff * diff, n + 1));

        if pairs == 0 {
            0.0
        } else {
            (sum_sq / pairs as f32).sqrt()
        }
    }

    pub fn sdnn(&self) -> f32 {
        if !self.is_ready() {
            return 0.0;
        }
        self.intervals.std_dev().unwrap_or(0.0)
    }

    pub fn metrics(&self) -> HrvMetrics {
        HrvMetrics {
            rmssd: self.rmssd(),
            sdnn: self.sdnn(),
            ready: self.is_ready(),
            count: self.intervals.len(),
        }
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
    }
}
