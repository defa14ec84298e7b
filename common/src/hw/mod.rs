//! Drivers for measurement hardware attached to the testbed.

pub mod otii;

pub use otii::{AnalyzerSettings, Otii, OtiiClient};
