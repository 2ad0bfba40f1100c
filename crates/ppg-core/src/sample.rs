//! Per-sample data flowing through the pipeline

use serde::{Deserialize, Serialize};

/// One raw reading from the optical sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture time in milliseconds (monotonic, source defined origin)
    pub timestamp_ms: u64,
    /// Infrared channel intensity
    pub ir: u32,
    /// Red channel intensity
    pub red: u32,
}

impl Sample {
    pub fn new(timestamp_ms: u64, ir: u32, red: u32) -> Self {
        Self { timestamp_ms, ir, red }
    }
}

/// Baseline-free (AC) values produced by a signal conditioner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionedSample {
    pub ir: f32,
    pub red: f32,
}

/// An accepted pulse with the interval to the previous accepted pulse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Time of the pulse peak
    pub timestamp_ms: u64,
    /// Inter-beat interval in milliseconds
    pub ibi_ms: f32,
}

impl BeatEvent {
    /// Instantaneous heart rate implied by this interval
    pub fn instantaneous_bpm(&self) -> f32 {
        if self.ibi_ms > 0.0 {
            60_000.0 / self.ibi_ms
        } else {
            0.0
        }
    }
}

/// Pipeline output handed to the consumer
///
/// Zeroed numeric fields mean "unknown". `bpm` is within [0, 150],
/// `spo2` and `quality` within [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub timestamp_ms: u64,
    pub ir: u32,
    pub red: u32,
    pub bpm: f32,
    /// RMSSD in milliseconds
    pub hrv: f32,
    /// SDNN in milliseconds
    pub sdnn: f32,
    pub spo2: f32,
    /// Most recent accepted inter-beat interval, if any since contact
    pub ibi_ms: Option<f32>,
    pub finger_detected: bool,
    pub hrv_ready: bool,
    pub quality: f32,
}

impl FeatureRecord {
    /// Record for a sample taken without skin contact
    pub fn no_contact(sample: &Sample) -> Self {
        Self {
            timestamp_ms: sample.timestamp_ms,
            ir: sample.ir,
            red: sample.red,
            bpm: 0.0,
            hrv: 0.0,
            sdnn: 0.0,
            spo2: 0.0,
            ibi_ms: None,
            finger_detected: false,
            hrv_ready: false,
            quality: 0.0,
        }
    }

    /// True when every physiological estimate is known
    pub fn is_complete(&self) -> bool {
        self.finger_detected && self.bpm > 0.0 && self.spo2 > 0.0 && self.hrv_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantaneous_bpm() {
        let beat = BeatEvent { timestamp_ms: 1000, ibi_ms: 800.0 };
        assert!((beat.instantaneous_bpm() - 75.0).abs() < 1e-4);

        let degenerate = BeatEvent { timestamp_ms: 1000, ibi_ms: 0.0 };
        assert_eq!(degenerate.instantaneous_bpm(), 0.0);
    }

    #[test]
    fn test_no_contact_record() {
        let sample = Sample::new(1234, 900, 700);
        let record = FeatureRecord::no_contact(&sample);

        assert!(!record.finger_detected);
        assert_eq!(record.bpm, 0.0);
        assert_eq!(record.spo2, 0.0);
        assert_eq!(record.ibi_ms, None);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_record_serialization() {
        let sample = Sample::new(10, 85_000, 42_000);
        let record = FeatureRecord::no_contact(&sample);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"finger_detected\":false"));

        let parsed: FeatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
