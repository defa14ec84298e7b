//! Runtime configuration options.

use std::env;
use std::fmt;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use getopts::Options;
use log::LevelFilter;

use crate::input::PlanProvider;
use crate::input::hard_code::HardCodedPlan;
use crate::input::json::JSONPlanParser;
use crate::logging::level_for;

type Result<T> = std::result::Result<T, Error>;

const DEFAULT_CREDENTIALS: &str = "credentials.json";

#[derive(Clone, Debug)]
pub enum Error {
    /// An option is missing its required argument.
    ArgumentMissing(&'static str),
    /// Parsing command line failed.
    CLI(getopts::Fail),
    /// User requested to see help, not run the program.
    Help(String),
    /// User passed an invalid option.
    Invalid(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CLI(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            ArgumentMissing(arg) => write!(f, "missing argument for '{}' option", arg),
            CLI(ref e) => write!(f, "{}", e),
            Help(ref help_msg) => write!(f, "Program help:\n{}", help_msg),
            Invalid(ref opt) => write!(f, "Invalid option: {}", opt),
        }
    }
}

impl From<getopts::Fail> for Error {
    fn from(e: getopts::Fail) -> Error {
        Error::CLI(e)
    }
}

#[derive(Debug)]
pub struct Configuration {
    plan_provider: Box<dyn PlanProvider>,
    credentials: PathBuf,
    iterations: Option<u32>,
    results_dir: Option<PathBuf>,
    dry_run: bool,
    log_level: LevelFilter,
}

impl Configuration {
    pub fn get_plan_provider(&self) -> &dyn PlanProvider {
        self.plan_provider.as_ref()
    }

    pub fn get_credentials_path(&self) -> &Path {
        &self.credentials
    }

    /// Iteration count replacing the plan's, if given.
    pub fn get_iterations(&self) -> Option<u32> {
        self.iterations
    }

    /// Results directory replacing the plan's, if given.
    pub fn get_results_dir(&self) -> Option<&Path> {
        self.results_dir.as_deref()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn get_log_level(&self) -> LevelFilter {
        self.log_level
    }
}

fn create_options() -> Options {
    let mut opts = Options::new();
    opts.optopt("p", "plan", "read the run plan from a file", "FILE");
    opts.optopt("f", "plan-format", "select a plan input format (code, json)", "FORMAT");
    opts.optopt("c", "credentials", "target login details (default: credentials.json)", "FILE");
    opts.optopt("o", "results-dir", "write result files to this directory", "DIR");
    opts.optopt("n", "iterations", "iterations per configuration", "N");
    opts.optflag("", "dry-run", "list the trials without running them");
    opts.optflagmulti("v", "verbose", "more output (repeat for more)");
    opts.optflag("h", "help", "show help");

    opts
}

pub fn parse() -> Result<Configuration> {
    let cli_args: Vec<_> = env::args().collect();
    let program = cli_args.get(0).map(String::as_str).unwrap_or("powerbench");
    let args = if cli_args.is_empty() { &cli_args[..] } else { &cli_args[1..] };

    parse_args(program, args)
}

fn parse_args(program: &str, args: &[String]) -> Result<Configuration> {
    let opts = create_options();
    let matches = opts.parse(args)?;

    if matches.opt_present("h") {
        let brief = format!("Usage: {} [ options ]", program);
        return Err(Error::Help(opts.usage(&brief)));
    }

    if let Some(arg) = matches.free.get(0) {
        return Err(Error::Invalid(format!("unexpected argument '{}'", arg)));
    }

    let plan_path = matches.opt_str("plan");
    let plan_provider: Box<dyn PlanProvider> = match matches.opt_str("plan-format") {
        Some(format) => match format.as_str() {
            "code" => {
                if plan_path.is_some() {
                    return Err(Error::Invalid("the 'code' plan format takes no plan file".to_string()));
                }
                Box::new(HardCodedPlan::new())
            },

            "json" => {
                let path = plan_path.ok_or(Error::ArgumentMissing("plan"))?;
                Box::new(JSONPlanParser::new(Path::new(&path)))
            },

            _ => {
                let msg = format!("{} is not a plan format", format);
                return Err(Error::Invalid(msg));
            },
        },

        // A plan file implies JSON; otherwise use the hard-coded plan.
        None => match plan_path {
            Some(path) => Box::new(JSONPlanParser::new(Path::new(&path))),
            None => Box::new(HardCodedPlan::new()),
        },
    };

    let iterations = match matches.opt_str("iterations") {
        Some(n) => Some(n.parse::<u32>()
                        .map_err(|_e| Error::Invalid(format!("'{}' is not an iteration count", n)))?),
        None => None,
    };

    let verbosity = matches.opt_count("v");
    let log_level = level_for(verbosity)
        .ok_or(Error::Invalid("only two levels of verbosity supported (-vv)".to_string()))?;

    Ok(Configuration {
        plan_provider,
        credentials: PathBuf::from(matches.opt_str("credentials")
                                   .unwrap_or(DEFAULT_CREDENTIALS.to_string())),
        iterations,
        results_dir: matches.opt_str("results-dir").map(PathBuf::from),
        dry_run: matches.opt_present("dry-run"),
        log_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Configuration> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        parse_args("powerbench", &args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.get_credentials_path(), Path::new("credentials.json"));
        assert_eq!(config.get_iterations(), None);
        assert_eq!(config.get_results_dir(), None);
        assert!(!config.is_dry_run());
        assert_eq!(config.get_log_level(), LevelFilter::Info);

        let plan = config.get_plan_provider().plan().unwrap();
        assert_eq!(plan.configurations.len(), 5);
    }

    #[test]
    fn overrides() {
        let config = parse(&["-c", "pi.json", "-o", "/tmp/results", "-n", "3", "--dry-run", "-vv"])
            .unwrap();
        assert_eq!(config.get_credentials_path(), Path::new("pi.json"));
        assert_eq!(config.get_results_dir(), Some(Path::new("/tmp/results")));
        assert_eq!(config.get_iterations(), Some(3));
        assert!(config.is_dry_run());
        assert_eq!(config.get_log_level(), LevelFilter::Trace);
    }

    #[test]
    fn help() {
        match parse(&["-h"]) {
            Err(Error::Help(msg)) => assert!(msg.contains("--plan-format")),
            other => panic!("expected help, got {:?}", other),
        }
    }

    #[test]
    fn json_format_needs_plan_file() {
        match parse(&["-f", "json"]) {
            Err(Error::ArgumentMissing("plan")) => {},
            other => panic!("expected a missing plan, got {:?}", other),
        }
    }

    #[test]
    fn unknown_format() {
        assert!(matches!(parse(&["-f", "yaml"]), Err(Error::Invalid(_))));
    }

    #[test]
    fn bad_iteration_count() {
        assert!(matches!(parse(&["-n", "many"]), Err(Error::Invalid(_))));
    }

    #[test]
    fn too_verbose() {
        assert!(matches!(parse(&["-vvv"]), Err(Error::Invalid(_))));
    }

    #[test]
    fn unknown_option() {
        assert!(matches!(parse(&["--frobnicate"]), Err(Error::CLI(_))));
    }

    #[test]
    fn stray_argument() {
        assert!(matches!(parse(&["plan.json"]), Err(Error::Invalid(_))));
    }
}
