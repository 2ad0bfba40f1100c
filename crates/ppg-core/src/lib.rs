//! PPG-Core: Foundation types for photoplethysmography processing
//!
//! Sample and record types shared by the processing pipeline, the simulator
//! and the consumers, plus the fixed-capacity rolling window used by the
//! estimators.

pub mod error;
pub mod ppg_types;
pub mod sample;
pub mod sample_block;
pub mod window;

pub use error::{PpgError, PpgResult};
pub use ppg_types::*;
pub use sample::*;
pub use sample_block::*;
pub use window::RollingWindow;
