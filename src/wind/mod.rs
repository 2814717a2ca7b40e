//! Wind data handling
//!
//! - [`classifier`] - wind-type and altitude discovery from directory names
//! - [`model`] - the wind statistics / emission-rate seam and its reference model

pub mod classifier;
pub mod model;

pub use classifier::{WindClassification, WindType, discover_altitudes, parse_altitude};
pub use model::{RunningWindModel, WindModel};
