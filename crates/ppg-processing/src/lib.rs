//! PPG-Processing: feature extraction pipeline for photoplethysmography
//!
//! Real-time conditioning, beat detection and heart rate, HRV and SpO2
//! estimation from raw red/IR samples.

pub mod artifact;
pub mod batch;
pub mod beat;
pub mod conditioner;
pub mod config;
pub mod envelope;
pub mod filters;
pub mod heart_rate;
pub mod hrv;
pub mod pipeline;
pub mod processor;
pub mod quality;
pub mod spectrum;
pub mod spo2;

pub use artifact::ArtifactGuard;
pub use batch::BatchBeatDetector;
pub use beat::EdgeBeatDetector;
pub use conditioner::{build_conditioner, AdaptiveConditioner, BandpassConditioner};
pub use config::{
    ConditionerKind, DetectionStrategy, HeartRateSmoothing, PipelineConfig, PipelineProfile,
    QualityMode,
};
pub use envelope::EnvelopeTracker;
pub use filters::{BandpassIir, BiquadCoefficients};
pub use heart_rate::HeartRateEstimator;
pub use hrv::{HrvEstimator, HrvMetrics};
pub use pipeline::Pipeline;
pub use processor::{
    BeatDetector, DetectorState, PerformanceSummary, ProcessingMetrics, SignalConditioner,
};
pub use quality::{ContactChange, QualityGate};
pub use spectrum::{PulseSpectrum, SpectralEstimate};
pub use spo2::Spo2Estimator;
