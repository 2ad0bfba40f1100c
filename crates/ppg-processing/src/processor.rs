//! Core processing traits and timing types

use ppg_core::{BeatEvent, ConditionedSample, Sample};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Baseline removal stage
///
/// Implementations keep per-channel state between calls and must be reset
/// whenever skin contact is re-established.
pub trait SignalConditioner: Send {
    /// Condition one raw sample, or `None` while the stage is still warming up
    fn condition(&mut self, sample: &Sample) -> Option<ConditionedSample>;

    /// Drop all accumulated state
    fn reset(&mut self);

    /// Get conditioner name/identifier
    fn name(&self) -> &str;
}

/// Pulse detection stage
pub trait BeatDetector: Send {
    /// Feed one conditioned IR value, returning an accepted beat with a valid IBI
    fn detect(&mut self, timestamp_ms: u64, ir: f32) -> Option<BeatEvent>;

    /// Drop all accumulated state, including the timing anchor
    fn reset(&mut self);

    /// Get detector name/identifier
    fn name(&self) -> &str;

    /// Current detector state
    fn state(&self) -> DetectorState;

    /// Current pulse amplitude estimate in conditioned units
    fn pulse_amplitude(&self) -> f32;
}

/// Beat detector state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    /// Envelope still accumulating its initial average
    Warmup,
    /// Waiting for the signal to rise above threshold
    Armed,
    /// Above threshold with a positive slope
    Rising,
    /// A beat was just accepted
    Refractory,
}

/// Performance metrics for a processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Actual processing time in microseconds
    pub processing_time_us: u64,
    /// Samples handled by the operation
    pub samples_processed: usize,
    /// Records emitted by the operation
    pub records_emitted: usize,
}

impl ProcessingMetrics {
    pub fn new() -> Self {
        Self {
            processing_time_us: 0,
            samples_processed: 0,
            records_emitted: 0,
        }
    }

    /// Start timing a processing operation
    pub fn start_timing() -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            metrics: ProcessingMetrics::new(),
        }
    }

    /// Check if the time per sample stayed within the budget
    pub fn meets_budget(&self, budget_us: u64) -> bool {
        let samples = self.samples_processed.max(1) as u64;
        self.processing_time_us / samples <= budget_us
    }
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for timing processing operations
pub struct ProcessingTimer {
    start_time: Instant,
    metrics: ProcessingMetrics,
}

impl ProcessingTimer {
    /// Count processed samples and emitted records
    pub fn record(&mut self, samples: usize, records: usize) {
        self.metrics.samples_processed += samples;
        self.metrics.records_emitted += records;
    }

    /// Finish timing and return metrics
    pub fn finish(mut self) -> ProcessingMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }
}

/// Aggregated per-sample latency of a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub samples_processed: u64,
    pub records_emitted: u64,
    pub avg_latency_us: f64,
    /// Largest per-sample latency of any timed operation, averaged over its samples
    pub max_latency_us: u64,
    /// Timed operations (one `process` call or one whole `process_block`) whose
    /// average per-sample latency exceeded the sample period
    pub overruns: u64,
}

impl PerformanceSummary {
    /// Fold one timed operation into the summary
    pub fn update(&mut self, metrics: &ProcessingMetrics, budget_us: u64) {
        let samples = metrics.samples_processed.max(1) as u64;
        let per_sample = metrics.processing_time_us / samples;

        let previous = self.samples_processed as f64;
        self.samples_processed += metrics.samples_processed as u64;
        self.records_emitted += metrics.records_emitted as u64;
        if self.samples_processed > 0 {
            self.avg_latency_us = (self.avg_latency_us * previous
                + metrics.processing_time_us as f64)
                / self.samples_processed as f64;
        }
        self.max_latency_us = self.max_latency_us.max(per_sample);
        if per_sample > budget_us {
            self.overruns += 1;
        }
    }
}
