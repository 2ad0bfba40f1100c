//! Error handling for the PPG framework
//!
//! Errors only surface from construction and configuration. Per-sample
//! processing degrades to zeroed output instead of failing.

use core::fmt;

/// Result type alias for PPG framework operations
pub type PpgResult<T> = Result<T, PpgError>;

/// Error type for all PPG framework operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PpgError {
    /// Invalid or inconsistent configuration
    ConfigurationError {
        /// Description of the configuration problem
        message: String,
    },

    /// Sampling rate outside the supported range
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f32,
        /// Valid range description
        valid_range: String,
    },

    /// Window or buffer configured with an unusable capacity
    InvalidCapacity {
        /// Which buffer was misconfigured
        buffer: &'static str,
        /// Requested capacity
        requested: usize,
    },

    /// Malformed signal data handed to a block constructor
    InvalidSignalData {
        /// Description of the data problem
        reason: String,
    },

    /// Spectral analysis failure
    SpectrumError {
        /// Underlying FFT error description
        message: String,
    },

    /// Simulation setup failure
    SimulationError {
        /// Description of the simulation problem
        message: String,
    },
}

impl fmt::Display for PpgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpgError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            PpgError::InvalidSamplingRate { rate, valid_range } => {
                write!(f, "Invalid sampling rate: {}Hz, valid range: {}", rate, valid_range)
            }
            PpgError::InvalidCapacity { buffer, requested } => {
                write!(f, "Invalid capacity for {}: {}", buffer, requested)
            }
            PpgError::InvalidSignalData { reason } => {
                write!(f, "Invalid signal data: {}", reason)
            }
            PpgError::SpectrumError { message } => {
                write!(f, "Spectrum error: {}", message)
            }
            PpgError::SimulationError { message } => {
                write!(f, "Simulation error: {}", message)
            }
        }
    }
}

impl std::error::Error for PpgError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::PpgError::ConfigurationError {
            message: format!($($arg)*),
        }
    };
}
