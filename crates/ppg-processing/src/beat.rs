//! Continuous derivative-crossing beat detection

use crate::config::DetectorConfig;
use crate::envelope::EnvelopeTracker;
use crate::processor::{BeatDetector, DetectorState};
use ppg_core::BeatEvent;
use tracing::trace;

/// Detects pulse peaks sample by sample
///
/// A candidate is the sample before the slope turns negative while the
/// waveform is above `baseline + ratio * amplitude` of the detector's own
/// envelope. Candidates inside the refractory period or below the minimum
/// amplitude are dropped. The first accepted beat only anchors timing.
pub struct EdgeBeatDetector {
    config: DetectorConfig,
    envelope: EnvelopeTracker,
    state: DetectorState,
    previous: Option<(u64, f32)>,
    last_beat_ms: Option<u64>,
}

impl EdgeBeatDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let envelope = EnvelopeTracker::new(config.envelope.clone());
        Self {
            config,
            envelope,
            state: DetectorState::Warmup,
            previous: None,
            last_beat_ms: None,
        }
    }

    /// Timestamp of the last accepted beat
    pub fn last_beat_ms(&self) -> Option<u64> {
        self.last_beat_ms
    }

    fn on_candidate(&mut self, peak_ms: u64) -> Option<BeatEvent> {
        let amplitude = self.envelope.amplitude();
        if amplitude < self.config.min_amplitude {
            trace!(peak_ms, amplitude, "candidate below minimum amplitude");
            return None;
        }

        let Some(anchor) = self.last_beat_ms else {
            self.last_beat_ms = Some(peak_ms);
            self.state = DetectorState::Refractory;
            trace!(peak_ms, "first beat anchors timing");
            return None;
        };

        let elapsed = peak_ms.saturating_sub(anchor);
        if elapsed < self.config.refractory_ms {
            trace!(peak_ms, elapsed, "candidate inside refractory period");
            return None;
        }

        self.last_beat_ms = Some(peak_ms);
        self.state = DetectorState::Refractory;

        let ibi_ms = elapsed as f32;
        if ibi_ms < self.config.ibi_min_ms || ibi_ms > self.config.ibi_max_ms {
            trace!(peak_ms, ibi_ms, "interval outside physiological bound");
            return None;
        }

        Some(BeatEvent {
            timestamp_ms: peak_ms,
            ibi_ms,
        })
    }
}

impl BeatDetector for EdgeBeatDetector {
    fn detect(&mut self, timestamp_ms: u64, ir: f32) -> Option<BeatEvent> {
        let ready = self.envelope.update(ir);
        let previous = self.previous.replace((timestamp_ms, ir));

        if !ready {
            self.state = DetectorState::Warmup;
            return None;
        }
        if matches!(self.state, DetectorState::Warmup | DetectorState::Refractory) {
            self.state = DetectorState::Armed;
        }

        let (previous_ms, previous_ir) = previous?;
        let slope = ir - previous_ir;

        match self.state {
            DetectorState::Armed => {
                if slope > 0.0 && ir > self.envelope.threshold(self.config.threshold_ratio) {
                    self.state = DetectorState::Rising;
                }
                None
            }
            DetectorState::Rising if slope < 0.0 => {
                self.state = DetectorState::Armed;
                self.on_candidate(previous_ms)
            }
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
        self.state = DetectorState::Warmup;
        self.previous = None;
        self.last_beat_ms = None;
    }

    fn name(&self) -> &str {
        "edge"
    }

    fn state(&self) -> DetectorState {
        self.state
    }

    fn pulse_amplitude(&self) -> f32 {
        self.envelope.amplitude()
    }
}
