//! Pluggable run plan providers and credential input.

use std::fmt::Debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use powerbench_common::hw::AnalyzerSettings;
use powerbench_common::plan::{Commands, TrialConfiguration};
use powerbench_common::remote::Credentials;
use powerbench_common::testbed::Pacing;

pub mod error;
pub mod hard_code;
pub mod json;

type Result<T> = std::result::Result<T, error::Error>;

/// Results directory used when a plan does not name one.
pub const DEFAULT_RESULTS_DIR: &str = "../../results";

/// Channel whose statistics are recorded unless a plan says otherwise.
pub const DEFAULT_CHANNEL: &str = "mp";

/// Everything needed to run a benchmark session, minus credentials.
#[derive(Clone, Debug, PartialEq)]
pub struct RunPlan {
    pub configurations: Vec<TrialConfiguration>,
    pub results_dir: PathBuf,
    pub commands: Commands,
    pub channel: String,
    pub analyzer: AnalyzerSettings,
    pub pacing: Pacing,
}

impl RunPlan {
    /// Repeat every configuration `iterations` times instead.
    pub fn with_iterations(mut self, iterations: u32) -> RunPlan {
        self.configurations = self.configurations.iter()
            .map(|c| TrialConfiguration::new(c.device_model(),
                                             c.os_image(),
                                             c.runtime_version(),
                                             iterations))
            .collect();
        self
    }

    /// Write results somewhere else.
    pub fn with_results_dir(mut self, results_dir: &Path) -> RunPlan {
        self.results_dir = results_dir.to_path_buf();
        self
    }

    /// Total number of iterations over all configurations.
    pub fn iteration_total(&self) -> u32 {
        self.configurations.iter()
            .map(|c| c.iteration_count())
            .sum()
    }
}

/// Source of the run plan.
pub trait PlanProvider: Debug {
    /// Produce the plan to run.
    fn plan(&self) -> Result<RunPlan>;
}

/// Read the target's login details from a JSON file.
pub fn read_credentials(path: &Path) -> Result<Credentials> {
    let mut text = String::new();
    let mut file = File::open(path)?;
    file.read_to_string(&mut text)?;

    let credentials = serde_json::from_str(&text)?;
    Ok(credentials)
}
