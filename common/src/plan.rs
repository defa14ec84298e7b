//! Trial configurations and the matrix they are drawn from.

use std::fmt;
use std::fmt::Display;

use serde::Deserialize;

/// Number of trials per configuration unless stated otherwise.
pub const DEFAULT_ITERATIONS: u32 = 11;

/// One (device model, OS image, runtime version) combination and its repetition count.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrialConfiguration {
    device_model: String,
    os_image: String,
    runtime_version: String,
    iteration_count: u32,
}

impl TrialConfiguration {
    /// Create a new configuration.
    pub fn new(device_model: &str,
               os_image: &str,
               runtime_version: &str,
               iteration_count: u32) -> TrialConfiguration
    {
        TrialConfiguration {
            device_model: device_model.to_string(),
            os_image: os_image.to_string(),
            runtime_version: runtime_version.to_string(),
            iteration_count,
        }
    }

    pub fn device_model(&self) -> &str {
        &self.device_model
    }

    pub fn os_image(&self) -> &str {
        &self.os_image
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Identifier shared by the result file and recording label.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.device_model, self.os_image, self.runtime_version)
    }

    /// Name given to this configuration's recordings on the measurement device.
    pub fn recording_label(&self) -> String {
        format!("recording_{}", self.key())
    }
}

impl Display for TrialConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} / {} / {} (x{})",
               self.device_model, self.os_image, self.runtime_version, self.iteration_count)
    }
}

/// A device and image pair run against several runtime versions.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MatrixEntry {
    pub device_model: String,
    pub os_image: String,
    pub runtime_versions: Vec<String>,
}

/// Expand matrix entries into the flat, ordered list of trial configurations.
pub fn expand<'a, T>(entries: T, iteration_count: u32) -> Vec<TrialConfiguration>
where
    T: IntoIterator<Item = &'a MatrixEntry>,
{
    entries.into_iter()
        .flat_map(|entry| entry.runtime_versions.iter()
                  .map(move |version| TrialConfiguration::new(
                      &entry.device_model,
                      &entry.os_image,
                      version,
                      iteration_count)))
        .collect()
}

/// Shell commands issued on the target for each trial.
#[derive(Clone, Debug, PartialEq)]
pub struct Commands {
    benchmark: String,
}

impl Commands {
    /// Default benchmark entry point on the target.
    pub const DEFAULT_BENCHMARK: &'static str =
        "bash Python_Application_Energy_Consumption/scripts/experiment/run_benchmarks.sh";

    /// Use `benchmark` as the command; the runtime version is appended as its argument.
    pub fn new(benchmark: &str) -> Commands {
        Commands {
            benchmark: benchmark.to_string(),
        }
    }

    /// Command running the benchmark for a configuration.
    pub fn benchmark(&self, config: &TrialConfiguration) -> String {
        format!("{} {}", self.benchmark, config.runtime_version())
    }

    /// Result artifact the benchmark leaves in the remote working directory.
    pub fn artifact(&self, config: &TrialConfiguration) -> String {
        format!("{}.json", config.runtime_version())
    }

    /// Command removing the benchmark's artifact.
    pub fn cleanup(&self, config: &TrialConfiguration) -> String {
        format!("rm {}", self.artifact(config))
    }
}

impl Default for Commands {
    fn default() -> Self {
        Commands::new(Self::DEFAULT_BENCHMARK)
    }
}
