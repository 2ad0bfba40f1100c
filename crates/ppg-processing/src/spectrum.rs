//! Cardiac-band spectral analysis of conditioned pulse windows

use num_complex::Complex32;
use ppg_core::{PpgError, PpgResult};
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lowest pulse frequency considered (30 BPM)
pub const CARDIAC_BAND_LOW_HZ: f32 = 0.5;
/// Highest pulse frequency considered (210 BPM)
pub const CARDIAC_BAND_HIGH_HZ: f32 = 3.5;

// Bins on each side of the dominant bin counted as pulse power
const PEAK_HALF_WIDTH: usize = 3;

/// Dominant pulse frequency of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralEstimate {
    pub dominant_hz: f32,
    pub bpm: f32,
    /// Share of cardiac-band power around the dominant bin, 0-1
    pub purity: f32,
}

/// Zero-padded real FFT restricted to the cardiac band
pub struct PulseSpectrum {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_len: usize,
    sample_rate: f32,
    input: Vec<f32>,
    output: Vec<Complex32>,
}

impl PulseSpectrum {
    pub fn new(fft_len: usize, sample_rate: f32) -> PpgResult<Self> {
        if fft_len < 16 || !fft_len.is_power_of_two() {
            return Err(PpgError::InvalidCapacity {
                buffer: "fft",
                requested: fft_len,
            });
        }
        if CARDIAC_BAND_HIGH_HZ >= sample_rate / 2.0 {
            return Err(PpgError::InvalidSamplingRate {
                rate: sample_rate,
                valid_range: format!("above {}Hz", 2.0 * CARDIAC_BAND_HIGH_HZ),
            });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();

        Ok(Self {
            fft,
            fft_len,
            sample_rate,
            input,
            output,
        })
    }

    /// Sized for a window of `window_len` samples
    pub fn for_window(window_len: usize, sample_rate: f32) -> PpgResult<Self> {
        Self::new(window_len.max(16).next_power_of_two() * 2, sample_rate)
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Analyze the newest `fft_len` samples of a demeaned window
    pub fn analyze(&mut self, window: &[f32]) -> PpgResult<SpectralEstimate> {
        if window.is_empty() {
            return Err(PpgError::SpectrumError {
                message: "Empty analysis window".to_string(),
            });
        }

        let start = window.len().saturating_sub(self.fft_len);
        let data = &window[start..];
        self.input.fill(0.0);
        self.input[..data.len()].copy_from_slice(data);

        self.fft
            .process(&mut self.input, &mut self.output)
            .map_err(|e| PpgError::SpectrumError {
                message: e.to_string(),
            })?;

        let bin_hz = self.sample_rate / self.fft_len as f32;
        let low = (CARDIAC_BAND_LOW_HZ / bin_hz).ceil() as usize;
        let high = ((CARDIAC_BAND_HIGH_HZ / bin_hz).floor() as usize).min(self.output.len() - 1);

        let band = &self.output[low..=high];
        let total: f32 = band.iter().map(|c| c.norm_sqr()).sum();

        let Some((peak_offset, _)) = band
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm_sqr().total_cmp(&b.1.norm_sqr()))
        else {
            return Err(PpgError::SpectrumError {
                message: "Cardiac band is empty".to_string(),
            });
        };

        if total <= f32::EPSILON {
            return Ok(SpectralEstimate {
                dominant_hz: 0.0,
                bpm: 0.0,
                purity: 0.0,
            });
        }

        let from = peak_offset.saturating_sub(PEAK_HALF_WIDTH);
        let to = (peak_offset + PEAK_HALF_WIDTH).min(band.len() - 1);
        let around_peak: f32 = band[from..=to].iter().map(|c| c.norm_sqr()).sum();

        let dominant_hz = (low + peak_offset) as f32 * bin_hz;
        Ok(SpectralEstimate {
            dominant_hz,
            bpm: dominant_hz * 60.0,
            purity: around_peak / total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 100.0).sin())
            .collect()
    }

    #[test]
    fn test_dominant_frequency() {
        let mut spectrum = PulseSpectrum::for_window(400, 100.0).unwrap();
        assert_eq!(spectrum.fft_len(), 1024);

        let estimate = spectrum.analyze(&sine(1.2, 400)).unwrap();
        assert!((estimate.bpm - 72.0).abs() < 6.0, "bpm {}", estimate.bpm);
        assert!(estimate.purity > 0.7);
    }

    #[test]
    fn test_noise_has_low_purity() {
        // Deterministic broadband sequence
        let mut state = 12345u32;
        let noise: Vec<f32> = (0..400)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 16) & 0x7fff) as f32 / 16_384.0 - 1.0
            })
            .collect();

        let mut spectrum = PulseSpectrum::for_window(400, 100.0).unwrap();
        let estimate = spectrum.analyze(&noise).unwrap();
        assert!(estimate.purity < 0.5, "purity {}", estimate.purity);
    }

    #[test]
    fn test_silent_window() {
        let mut spectrum = PulseSpectrum::new(256, 100.0).unwrap();
        let estimate = spectrum.analyze(&vec![0.0; 200]).unwrap();
        assert_eq!(estimate.purity, 0.0);
        assert!(spectrum.analyze(&[]).is_err());
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(PulseSpectrum::new(100, 100.0).is_err());
        assert!(PulseSpectrum::new(8, 100.0).is_err());
        assert!(PulseSpectrum::new(256, 5.0).is_err());
    }
}
