//! PPG-specific sensor types and recording metadata

use crate::error::{PpgError, PpgResult};
use serde::{Deserialize, Serialize};

/// Optical front-end that produced a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorProfile {
    /// 18-bit red/IR pulse oximetry module
    Max30102,
    /// Older 16-bit red/IR module
    Max30100,
    /// Synthetic data from the simulator
    Simulated,
    Other(u8),
}

impl SensorProfile {
    /// Largest raw value the ADC can report
    pub fn full_scale(&self) -> u32 {
        match self {
            SensorProfile::Max30102 => (1 << 18) - 1,
            SensorProfile::Max30100 => (1 << 16) - 1,
            SensorProfile::Simulated | SensorProfile::Other(_) => (1 << 18) - 1,
        }
    }
}

/// Metadata describing a block of recorded samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Sensor that produced the data
    pub sensor: SensorProfile,
    /// Nominal sampling rate in Hz
    pub sampling_rate: f32,
    /// Block duration in seconds
    pub duration: f32,
    /// Creation time, milliseconds since the unix epoch
    pub created_at: u64,
}

impl RecordingMetadata {
    /// Create new recording metadata
    pub fn new(sensor: SensorProfile, sampling_rate: f32, duration: f32) -> PpgResult<Self> {
        Self::validate_sampling_rate(sampling_rate)?;

        if duration <= 0.0 {
            return Err(PpgError::InvalidSignalData {
                reason: "Duration must be positive".to_string(),
            });
        }

        Ok(RecordingMetadata {
            sensor,
            sampling_rate,
            duration,
            created_at: now_millis(),
        })
    }

    /// Validate sampling rate for PPG sensors
    pub fn validate_sampling_rate(rate: f32) -> PpgResult<()> {
        const MIN_RATE: f32 = 25.0;
        const MAX_RATE: f32 = 1000.0;

        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            Err(PpgError::InvalidSamplingRate {
                rate,
                valid_range: format!("{}-{}Hz", MIN_RATE, MAX_RATE),
            })
        } else {
            Ok(())
        }
    }

    /// Expected number of samples in a block of this duration
    pub fn expected_samples(&self) -> usize {
        (self.sampling_rate * self.duration).round() as usize
    }

    /// Nominal sample period in milliseconds
    pub fn sample_period_ms(&self) -> f32 {
        1000.0 / self.sampling_rate
    }
}

impl Default for RecordingMetadata {
    fn default() -> Self {
        RecordingMetadata {
            sensor: SensorProfile::Max30102,
            sampling_rate: 100.0,
            duration: 1.0,
            created_at: 0,
        }
    }
}

impl std::fmt::Display for SensorProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorProfile::Max30102 => write!(f, "MAX30102"),
            SensorProfile::Max30100 => write!(f, "MAX30100"),
            SensorProfile::Simulated => write!(f, "Simulated"),
            SensorProfile::Other(id) => write!(f, "Other({})", id),
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
