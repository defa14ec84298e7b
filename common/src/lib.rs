//! Types and facilities for measuring the energy use of benchmarks on remote devices.

pub mod facility;
pub mod hw;
pub mod measurement;
pub mod output;
pub mod plan;
pub mod remote;
pub mod testbed;

#[cfg(test)]
mod mock;
