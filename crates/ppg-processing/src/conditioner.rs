//! Baseline removal strategies

use crate::config::{ConditionerConfig, ConditionerKind, EnvelopeConfig};
use crate::envelope::EnvelopeTracker;
use crate::filters::BandpassIir;
use crate::processor::SignalConditioner;
use ppg_core::{ConditionedSample, PpgResult, Sample};
use tracing::debug;

/// Build the conditioner selected by the configuration
pub fn build_conditioner(
    config: &ConditionerConfig,
    sample_rate_hz: f32,
) -> PpgResult<Box<dyn SignalConditioner>> {
    debug!(kind = ?config.kind, "building signal conditioner");
    match config.kind {
        ConditionerKind::Bandpass => Ok(Box::new(BandpassConditioner::new(
            config.bandpass.low_cutoff_hz,
            config.bandpass.high_cutoff_hz,
            sample_rate_hz,
        )?)),
        ConditionerKind::AdaptiveBaseline => {
            Ok(Box::new(AdaptiveConditioner::new(config.adaptive.clone())))
        }
    }
}

/// Fixed 0.5-5 Hz style bandpass on both channels
pub struct BandpassConditioner {
    ir: BandpassIir,
    red: BandpassIir,
}

impl BandpassConditioner {
    pub fn new(low_cutoff: f32, high_cutoff: f32, sample_rate_hz: f32) -> PpgResult<Self> {
        let filter = BandpassIir::new(low_cutoff, high_cutoff, sample_rate_hz)?;
        Ok(Self {
            ir: filter.clone(),
            red: filter,
        })
    }
}

impl SignalConditioner for BandpassConditioner {
    fn condition(&mut self, sample: &Sample) -> Option<ConditionedSample> {
        Some(ConditionedSample {
            ir: self.ir.filter(sample.ir as f64) as f32,
            red: self.red.filter(sample.red as f64) as f32,
        })
    }

    fn reset(&mut self) {
        self.ir.reset();
        self.red.reset();
    }

    fn name(&self) -> &str {
        "bandpass"
    }
}

/// Subtracts an asymmetric running baseline from each channel
///
/// Output is suppressed until both trackers finish their warm-up.
pub struct AdaptiveConditioner {
    ir: EnvelopeTracker,
    red: EnvelopeTracker,
}

impl AdaptiveConditioner {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self {
            ir: EnvelopeTracker::new(config.clone()),
            red: EnvelopeTracker::new(config),
        }
    }
}

impl SignalConditioner for AdaptiveConditioner {
    fn condition(&mut self, sample: &Sample) -> Option<ConditionedSample> {
        let ir = sample.ir as f32;
        let red = sample.red as f32;
        let ir_ready = self.ir.update(ir);
        let red_ready = self.red.update(red);

        if ir_ready && red_ready {
            Some(ConditionedSample {
                ir: ir - self.ir.baseline(),
                red: red - self.red.baseline(),
            })
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.ir.reset();
        self.red.reset();
    }

    fn name(&self) -> &str {
        "adaptive_baseline"
    }
}
