//! SampleBlock: container for a run of recorded or streamed PPG samples

use crate::error::{PpgError, PpgResult};
use crate::ppg_types::{now_millis, RecordingMetadata};
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contiguous run of red/IR samples with its recording metadata
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// Unique identifier for this block
    pub id: Uuid,
    /// Samples in capture order
    pub samples: Vec<Sample>,
    /// Recording metadata
    pub metadata: RecordingMetadata,
    /// Creation timestamp
    pub created_at: u64,
}

/// Which optical channel to inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Ir,
    Red,
}

impl SampleBlock {
    /// Create new block, checking the samples against the metadata
    pub fn new(samples: Vec<Sample>, metadata: RecordingMetadata) -> PpgResult<Self> {
        let expected_samples = metadata.expected_samples();
        if samples.len() != expected_samples {
            return Err(PpgError::InvalidSignalData {
                reason: format!(
                    "Block holds {} samples, metadata expects {}",
                    samples.len(),
                    expected_samples
                ),
            });
        }

        if samples
            .windows(2)
            .any(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
        {
            return Err(PpgError::InvalidSignalData {
                reason: "Sample timestamps must not go backwards".to_string(),
            });
        }

        Ok(SampleBlock {
            id: Uuid::new_v4(),
            samples,
            metadata,
            created_at: now_millis(),
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get sampling rate
    pub fn sampling_rate(&self) -> f32 {
        self.metadata.sampling_rate
    }

    /// Get block duration in seconds
    pub fn duration(&self) -> f32 {
        self.metadata.duration
    }

    /// Extract one channel as floats
    pub fn channel_data(&self, channel: Channel) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| match channel {
                Channel::Ir => s.ir as f32,
                Channel::Red => s.red as f32,
            })
            .collect()
    }

    /// Calculate basic statistics for a channel
    pub fn channel_stats(&self, channel: Channel) -> ChannelStats {
        ChannelStats::calculate(&self.channel_data(channel))
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub peak_to_peak: f32,
    /// Peak-to-peak over mean, in percent
    pub perfusion_index: f32,
}

impl ChannelStats {
    pub fn calculate(data: &[f32]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
                perfusion_index: 0.0,
            };
        }

        let mean = data.iter().sum::<f32>() / data.len() as f32;

        let variance: f32 = data.iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f32>() / data.len() as f32;
        let std_dev = variance.sqrt();

        let min = data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let peak_to_peak = max - min;

        let perfusion_index = if mean.abs() > f32::EPSILON {
            peak_to_peak / mean * 100.0
        } else {
            0.0
        };

        Self {
            mean,
            std_dev,
            min,
            max,
            peak_to_peak,
            perfusion_index,
        }
    }
}
