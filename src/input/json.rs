//! Run plans read from versioned JSON files.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use powerbench_common::hw::AnalyzerSettings;
use powerbench_common::plan::{self, Commands, MatrixEntry, DEFAULT_ITERATIONS};
use powerbench_common::testbed::Pacing;
use serde::Deserialize;
use serde_json::Value as JSONValue;

use super::{PlanProvider, Result, RunPlan, DEFAULT_CHANNEL, DEFAULT_RESULTS_DIR};
use super::error::Error;

const CONFIG_VERSION: i64 = 1;

/** Plan provider reading a JSON file.

Only `_version` and `matrix` are required:

```json
{
  "_version": 1,
  "iterations": 11,
  "results_dir": "../../results",
  "benchmark_command": "bash run_benchmarks.sh",
  "channel": "mp",
  "analyzer": { "host": "127.0.0.1", "port": 1905 },
  "pacing": { "settle": 10, "after_success": 5, "after_failure": 10 },
  "matrix": [
    { "device_model": "RPi3B+", "os_image": "Alpine", "runtime_versions": ["python3.13"] }
  ]
}
```
 */
#[derive(Debug)]
pub struct JSONPlanParser {
    config_path: PathBuf,
}

impl JSONPlanParser {
    pub fn new(config_path: &Path) -> JSONPlanParser {
        JSONPlanParser {
            config_path: config_path.to_path_buf(),
        }
    }

    fn parse(text: &str) -> Result<RunPlan> {
        let json: JSONValue = serde_json::from_str(text)?;

        // Check file version.
        json["_version"].as_i64()
            .ok_or(Error::Format("Missing '_version' specifier.".to_string()))
            .and_then(|ver| if ver == CONFIG_VERSION {
                Ok(())
            } else {
                let msg = format!(
                    "Plan not compatible (provided: {}, required: {}).",
                    ver,
                    CONFIG_VERSION);
                Err(Error::Unsupported(msg))
            })?;

        let file: PlanFile = serde_json::from_value(json)
            .map_err(|e| Error::Format(format!("plan parsing failed: {}", e)))?;
        if file.matrix.iter().all(|entry| entry.runtime_versions.is_empty()) {
            return Err(Error::Format("Plan 'matrix' has no configurations.".to_string()));
        }

        Ok(RunPlan {
            configurations: plan::expand(&file.matrix, file.iterations),
            results_dir: file.results_dir,
            commands: Commands::new(&file.benchmark_command),
            channel: file.channel,
            analyzer: file.analyzer,
            pacing: file.pacing.into_pacing()?,
        })
    }
}

impl PlanProvider for JSONPlanParser {
    fn plan(&self) -> Result<RunPlan> {
        let mut text = String::new();
        let mut file = File::open(self.config_path.as_path())?;
        file.read_to_string(&mut text)?;

        Self::parse(&text)
    }
}

#[derive(Deserialize)]
struct PlanFile {
    #[serde(default = "PlanFile::default_iterations")]
    iterations: u32,
    #[serde(default = "PlanFile::default_results_dir")]
    results_dir: PathBuf,
    #[serde(default = "PlanFile::default_benchmark")]
    benchmark_command: String,
    #[serde(default = "PlanFile::default_channel")]
    channel: String,
    #[serde(default)]
    analyzer: AnalyzerSettings,
    #[serde(default)]
    pacing: PacingConfig,
    matrix: Vec<MatrixEntry>,
}

impl PlanFile {
    fn default_iterations() -> u32 {
        DEFAULT_ITERATIONS
    }

    fn default_results_dir() -> PathBuf {
        PathBuf::from(DEFAULT_RESULTS_DIR)
    }

    fn default_benchmark() -> String {
        Commands::DEFAULT_BENCHMARK.to_string()
    }

    fn default_channel() -> String {
        DEFAULT_CHANNEL.to_string()
    }
}

/// Pauses in seconds.
#[derive(Deserialize)]
#[serde(default)]
struct PacingConfig {
    settle: f64,
    after_success: f64,
    after_failure: f64,
}

impl PacingConfig {
    fn into_pacing(self) -> Result<Pacing> {
        Ok(Pacing {
            settle: seconds("settle", self.settle)?,
            after_success: seconds("after_success", self.after_success)?,
            after_failure: seconds("after_failure", self.after_failure)?,
        })
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        let pacing = Pacing::default();
        PacingConfig {
            settle: pacing.settle.as_secs_f64(),
            after_success: pacing.after_success.as_secs_f64(),
            after_failure: pacing.after_failure.as_secs_f64(),
        }
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    if value.is_finite() && value >= 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(Error::Format(format!("pacing '{}' is not a valid number of seconds: {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn minimal_plan_takes_defaults() {
        let plan = JSONPlanParser::parse(r#"{
            "_version": 1,
            "matrix": [
                {"device_model": "RPi4", "os_image": "Raspbian", "runtime_versions": ["python3.12", "python3.11"]}
            ]
        }"#).unwrap();

        assert_eq!(plan.configurations.len(), 2);
        assert_eq!(plan.configurations[1].key(), "RPi4_Raspbian_python3.11");
        assert_eq!(plan.iteration_total(), 22);
        assert_eq!(plan.results_dir, PathBuf::from("../../results"));
        assert_eq!(plan.commands, Commands::default());
        assert_eq!(plan.channel, "mp");
        assert_eq!(plan.analyzer, AnalyzerSettings::default());
        assert_eq!(plan.pacing, Pacing::default());
    }

    #[test]
    fn full_plan() {
        let plan = JSONPlanParser::parse(r#"{
            "_version": 1,
            "iterations": 3,
            "results_dir": "/data/results",
            "benchmark_command": "sh bench.sh",
            "channel": "mc",
            "analyzer": {"host": "10.0.0.2", "port": 1906},
            "pacing": {"settle": 0.5, "after_success": 0, "after_failure": 1},
            "matrix": [
                {"device_model": "RPi3B+", "os_image": "Alpine", "runtime_versions": ["python3.9"]}
            ]
        }"#).unwrap();

        let config = &plan.configurations[0];
        assert_eq!(config.iteration_count(), 3);
        assert_eq!(plan.commands.benchmark(config), "sh bench.sh python3.9");
        assert_eq!(plan.results_dir, PathBuf::from("/data/results"));
        assert_eq!(plan.channel, "mc");
        assert_eq!(plan.analyzer.host, "10.0.0.2");
        assert_eq!(plan.analyzer.port, 1906);
        assert_eq!(plan.analyzer.main_voltage, 5.1);
        assert_eq!(plan.pacing.settle, Duration::from_millis(500));
        assert_eq!(plan.pacing.after_success, Duration::from_secs(0));
        // Unspecified pacing keys keep their defaults.
        let partial = JSONPlanParser::parse(r#"{
            "_version": 1,
            "pacing": {"settle": 1},
            "matrix": [{"device_model": "a", "os_image": "b", "runtime_versions": ["c"]}]
        }"#).unwrap();
        assert_eq!(partial.pacing.after_failure, Duration::from_secs(10));
    }

    #[test]
    fn wrong_version_is_unsupported() {
        let result = JSONPlanParser::parse(r#"{"_version": 2, "matrix": []}"#);
        match result {
            Err(Error::Unsupported(_)) => {},
            other => panic!("expected an unsupported error, got {:?}", other),
        }
    }

    #[test]
    fn missing_version() {
        match JSONPlanParser::parse(r#"{"matrix": []}"#) {
            Err(Error::Format(_)) => {},
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn missing_matrix() {
        match JSONPlanParser::parse(r#"{"_version": 1}"#) {
            Err(Error::Format(_)) => {},
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn empty_matrix() {
        let result = JSONPlanParser::parse(r#"{
            "_version": 1,
            "matrix": [{"device_model": "a", "os_image": "b", "runtime_versions": []}]
        }"#);
        assert!(result.is_err());
    }

    #[test]
    fn negative_pacing() {
        let result = JSONPlanParser::parse(r#"{
            "_version": 1,
            "pacing": {"settle": -1},
            "matrix": [{"device_model": "a", "os_image": "b", "runtime_versions": ["c"]}]
        }"#);
        match result {
            Err(Error::Format(_)) => {},
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn plan_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, r#"{
            "_version": 1,
            "matrix": [{"device_model": "RPi3B+", "os_image": "Alpine", "runtime_versions": ["python3.10"]}]
        }"#).unwrap();

        let plan = JSONPlanParser::new(&path).plan().unwrap();
        assert_eq!(plan.configurations[0].runtime_version(), "python3.10");
    }
}
