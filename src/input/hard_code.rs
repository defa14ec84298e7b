//! Plan compiled into the binary.

use std::path::PathBuf;

use powerbench_common::hw::AnalyzerSettings;
use powerbench_common::plan::{self, Commands, MatrixEntry, DEFAULT_ITERATIONS};
use powerbench_common::testbed::Pacing;

use super::{PlanProvider, Result, RunPlan, DEFAULT_CHANNEL, DEFAULT_RESULTS_DIR};

/// Plan created from code compiled into the binary.
///
/// Alpine on a Raspberry Pi 3B+ against CPython 3.13 down to 3.9.
#[derive(Debug)]
pub struct HardCodedPlan {
    matrix: Vec<MatrixEntry>,
}

impl HardCodedPlan {
    pub fn new() -> HardCodedPlan {
        HardCodedPlan {
            matrix: vec![
                MatrixEntry {
                    device_model: "RPi3B+".to_string(),
                    os_image: "Alpine".to_string(),
                    runtime_versions: ["python3.13", "python3.12", "python3.11", "python3.10", "python3.9"]
                        .iter()
                        .map(|v| v.to_string())
                        .collect(),
                },
            ],
        }
    }
}

impl PlanProvider for HardCodedPlan {
    fn plan(&self) -> Result<RunPlan> {
        Ok(RunPlan {
            configurations: plan::expand(&self.matrix, DEFAULT_ITERATIONS),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            commands: Commands::default(),
            channel: DEFAULT_CHANNEL.to_string(),
            analyzer: AnalyzerSettings::default(),
            pacing: Pacing::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_matrix() {
        let plan = HardCodedPlan::new().plan().unwrap();
        let keys: Vec<String> = plan.configurations.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec![
            "RPi3B+_Alpine_python3.13",
            "RPi3B+_Alpine_python3.12",
            "RPi3B+_Alpine_python3.11",
            "RPi3B+_Alpine_python3.10",
            "RPi3B+_Alpine_python3.9",
        ]);
        assert_eq!(plan.iteration_total(), 55);
        assert_eq!(plan.channel, "mp");
        assert_eq!(plan.results_dir, PathBuf::from("../../results"));
    }
}
