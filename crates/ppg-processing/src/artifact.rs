//! Motion artifact detection from raw IR steps

use crate::config::ArtifactConfig;
use ppg_core::Sample;
use tracing::debug;

/// Flags sudden IR jumps and holds off beat detection afterwards
pub struct ArtifactGuard {
    config: ArtifactConfig,
    last_ir: Option<f32>,
    mean_step: f32,
    holdoff_until_ms: Option<u64>,
    artifacts: u64,
}

impl ArtifactGuard {
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            last_ir: None,
            mean_step: 0.0,
            holdoff_until_ms: None,
            artifacts: 0,
        }
    }

    /// Inspect a sample, returning true while inside an artifact hold-off
    pub fn update(&mut self, sample: &Sample) -> bool {
        if !self.config.enabled {
            return false;
        }

        let ir = sample.ir as f32;
        if let Some(previous) = self.last_ir.replace(ir) {
            let step = (ir - previous).abs();
            let limit = self.config.min_jump.max(self.config.jump_factor * self.mean_step);
            if step > limit {
                self.artifacts += 1;
                self.holdoff_until_ms = Some(sample.timestamp_ms + self.config.holdoff_ms);
                debug!(
                    timestamp_ms = sample.timestamp_ms,
                    step,
                    limit,
                    "motion artifact detected"
                );
            } else {
                self.mean_step += self.config.step_alpha * (step - self.mean_step);
            }
        }

        self.in_holdoff(sample.timestamp_ms)
    }

    pub fn in_holdoff(&self, now_ms: u64) -> bool {
        self.holdoff_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Artifacts seen since construction
    pub fn artifact_count(&self) -> u64 {
        self.artifacts
    }

    pub fn reset(&mut self) {
        self.last_ir = None;
        self.mean_step = 0.0;
        self.holdoff_until_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth(i: u64) -> Sample {
        let t = i as f32 / 100.0;
        let ir = 85_000.0 + 16_000.0 * (2.0 * std::f32::consts::PI * 1.2 * t).sin();
        Sample::new(i * 10, ir as u32, 40_000)
    }

    #[test]
    fn test_clean_pulse_not_flagged() {
        let mut guard = ArtifactGuard::new(ArtifactConfig::default());
        for i in 0..2000 {
            assert!(!guard.update(&smooth(i)));
        }
        assert_eq!(guard.artifact_count(), 0);
    }

    #[test]
    fn test_jump_starts_holdoff() {
        let mut guard = ArtifactGuard::new(ArtifactConfig::default());
        for i in 0..500 {
            guard.update(&smooth(i));
        }

        let mut jumped = smooth(500);
        jumped.ir += 30_000;
        assert!(guard.update(&jumped));
        assert_eq!(guard.artifact_count(), 1);

        // Still held 400 ms later, released after 500 ms
        assert!(guard.in_holdoff(5_400));
        assert!(!guard.in_holdoff(5_500));
    }

    #[test]
    fn test_disabled_guard() {
        let mut guard = ArtifactGuard::new(ArtifactConfig {
            enabled: false,
            ..ArtifactConfig::default()
        });
        guard.update(&Sample::new(0, 80_000, 0));
        assert!(!guard.update(&Sample::new(10, 200_000, 0)));
    }
}
