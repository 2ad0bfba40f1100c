//! Fixed-coefficient IIR filters for pulse extraction

use ppg_core::{PpgError, PpgResult};
use serde::{Deserialize, Serialize};

/// Coefficients of a 2nd order section, normalized so a0 = 1
///
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoefficients {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl BiquadCoefficients {
    /// 2nd order Butterworth lowpass via the bilinear transform
    pub fn butterworth_lowpass(cutoff: f32, fs: f32) -> PpgResult<Self> {
        let k = prewarp(cutoff, fs)?;
        let sqrt2 = std::f64::consts::SQRT_2;
        let k2 = k * k;
        let norm = k2 + sqrt2 * k + 1.0;

        let b0 = k2 / norm;
        Ok(Self {
            b: [b0, 2.0 * b0, b0],
            a: [1.0, 2.0 * (k2 - 1.0) / norm, (k2 - sqrt2 * k + 1.0) / norm],
        })
    }

    /// 2nd order Butterworth highpass via the bilinear transform
    pub fn butterworth_highpass(cutoff: f32, fs: f32) -> PpgResult<Self> {
        let k = prewarp(cutoff, fs)?;
        let sqrt2 = std::f64::consts::SQRT_2;
        let k2 = k * k;
        let norm = k2 + sqrt2 * k + 1.0;

        let b0 = 1.0 / norm;
        Ok(Self {
            b: [b0, -2.0 * b0, b0],
            a: [1.0, 2.0 * (k2 - 1.0) / norm, (k2 - sqrt2 * k + 1.0) / norm],
        })
    }

    /// Magnitude response at `freq` Hz
    pub fn gain_at(&self, freq: f32, fs: f32) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / fs as f64;
        evaluate(&self.b, w) / evaluate(&self.a, w)
    }
}

fn prewarp(cutoff: f32, fs: f32) -> PpgResult<f64> {
    if cutoff <= 0.0 || cutoff >= fs / 2.0 {
        return Err(PpgError::ConfigurationError {
            message: format!(
                "Cutoff frequency {}Hz must lie between 0 and Nyquist ({}Hz)",
                cutoff,
                fs / 2.0
            ),
        });
    }
    Ok((std::f64::consts::PI * cutoff as f64 / fs as f64).tan())
}

// |sum c_i * e^{-j w i}|
fn evaluate(coeffs: &[f64], w: f64) -> f64 {
    let (re, im) = coeffs
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(re, im), (i, c)| {
            let phase = w * i as f64;
            (re + c * phase.cos(), im - c * phase.sin())
        });
    (re * re + im * im).sqrt()
}

/// Number of taps in the cascaded bandpass
pub const BANDPASS_TAPS: usize = 5;

/// 4th order bandpass in direct form I with five feed-forward and five
/// feedback taps, designed as the product of a Butterworth highpass and lowpass
#[derive(Debug, Clone)]
pub struct BandpassIir {
    b: [f64; BANDPASS_TAPS],
    a: [f64; BANDPASS_TAPS],
    // x[n-1]..x[n-4] and y[n-1]..y[n-4], most recent first
    x_hist: [f64; BANDPASS_TAPS - 1],
    y_hist: [f64; BANDPASS_TAPS - 1],
    primed: bool,
}

impl BandpassIir {
    pub fn new(low_cutoff: f32, high_cutoff: f32, fs: f32) -> PpgResult<Self> {
        if low_cutoff >= high_cutoff {
            return Err(PpgError::ConfigurationError {
                message: "Low cutoff must be less than high cutoff".to_string(),
            });
        }

        let highpass = BiquadCoefficients::butterworth_highpass(low_cutoff, fs)?;
        let lowpass = BiquadCoefficients::butterworth_lowpass(high_cutoff, fs)?;

        Ok(Self {
            b: convolve(&highpass.b, &lowpass.b),
            a: convolve(&highpass.a, &lowpass.a),
            x_hist: [0.0; BANDPASS_TAPS - 1],
            y_hist: [0.0; BANDPASS_TAPS - 1],
            primed: false,
        })
    }

    /// Feed-forward and feedback coefficients
    pub fn coefficients(&self) -> (&[f64; BANDPASS_TAPS], &[f64; BANDPASS_TAPS]) {
        (&self.b, &self.a)
    }

    /// Filter one sample
    pub fn filter(&mut self, input: f64) -> f64 {
        if !self.primed {
            // Steady state for a constant input: the bandpass has zero DC gain
            self.x_hist = [input; BANDPASS_TAPS - 1];
            self.y_hist = [0.0; BANDPASS_TAPS - 1];
            self.primed = true;
        }

        let mut output = self.b[0] * input;
        for i in 1..BANDPASS_TAPS {
            output += self.b[i] * self.x_hist[i - 1] - self.a[i] * self.y_hist[i - 1];
        }

        self.x_hist.rotate_right(1);
        self.x_hist[0] = input;
        self.y_hist.rotate_right(1);
        self.y_hist[0] = output;

        output
    }

    pub fn reset(&mut self) {
        self.x_hist = [0.0; BANDPASS_TAPS - 1];
        self.y_hist = [0.0; BANDPASS_TAPS - 1];
        self.primed = false;
    }

    /// Magnitude response at `freq` Hz
    pub fn gain_at(&self, freq: f32, fs: f32) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / fs as f64;
        evaluate(&self.b, w) / evaluate(&self.a, w)
    }
}

fn convolve(p: &[f64; 3], q: &[f64; 3]) -> [f64; BANDPASS_TAPS] {
    let mut out = [0.0; BANDPASS_TAPS];
    for (i, pi) in p.iter().enumerate() {
        for (j, qj) in q.iter().enumerate() {
            out[i + j] += pi * qj;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_butterworth_lowpass_response() {
        let lp = BiquadCoefficients::butterworth_lowpass(5.0, 100.0).unwrap();
        assert!((lp.gain_at(0.0, 100.0) - 1.0).abs() < 1e-9);
        // -3dB at the corner
        assert!((lp.gain_at(5.0, 100.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(lp.gain_at(40.0, 100.0) < 0.02);
    }

    #[test]
    fn test_butterworth_highpass_response() {
        let hp = BiquadCoefficients::butterworth_highpass(0.5, 100.0).unwrap();
        assert!(hp.gain_at(0.0, 100.0) < 1e-9);
        assert!((hp.gain_at(0.5, 100.0) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((hp.gain_at(10.0, 100.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_invalid_cutoff() {
        assert!(BiquadCoefficients::butterworth_lowpass(60.0, 100.0).is_err());
        assert!(BiquadCoefficients::butterworth_highpass(0.0, 100.0).is_err());
        assert!(BandpassIir::new(5.0, 0.5, 100.0).is_err());
    }

    #[test]
    fn test_bandpass_passes_cardiac_band() {
        let bp = BandpassIir::new(0.5, 5.0, 100.0).unwrap();
        assert!(bp.gain_at(0.0, 100.0) < 1e-9);
        assert!(bp.gain_at(1.2, 100.0) > 0.85);
        assert!(bp.gain_at(0.05, 100.0) < 0.02);
        assert!(bp.gain_at(30.0, 100.0) < 0.05);
    }

    #[test]
    fn test_dc_step_does_not_ring() {
        let mut bp = BandpassIir::new(0.5, 5.0, 100.0).unwrap();
        for _ in 0..500 {
            let y = bp.filter(85_000.0);
            assert!(y.abs() < 1e-6);
        }
    }

    #[test]
    fn test_sine_amplitude_preserved() {
        let fs = 100.0;
        let mut bp = BandpassIir::new(0.5, 5.0, fs).unwrap();
        let mut peak: f64 = 0.0;
        for i in 0..2000 {
            let t = i as f64 / fs as f64;
            let y = bp.filter(50_000.0 + 1000.0 * (2.0 * std::f64::consts::PI * 1.2 * t).sin());
            if i > 1000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak > 850.0 && peak < 1050.0, "peak was {}", peak);
    }

    #[test]
    fn test_reset_reprimes() {
        let mut bp = BandpassIir::new(0.5, 5.0, 100.0).unwrap();
        for i in 0..100 {
            bp.filter(i as f64 * 10.0);
        }
        bp.reset();
        assert!(bp.filter(120_000.0).abs() < 1e-6);
    }
}
