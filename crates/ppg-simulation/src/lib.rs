//! PPG-Simulation: synthetic red/IR pulse signals
//!
//! Provides a seeded pulse oximeter simulator and a real-time chunked
//! stream for driving the processing pipeline without hardware.

pub mod ppg_simulator;
pub mod pulse_patterns;
pub mod real_time_stream;

pub use ppg_simulator::*;
pub use pulse_patterns::*;
pub use real_time_stream::*;
