//! Configure and execute benchmark trials.

use std::error;
use std::fmt;
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, log_enabled, trace, warn, Level};

use crate::facility::{MeterError, PowerAnalyzer};
use crate::measurement::ResultRow;
use crate::output::{ResultRecorder, StorageError};
use crate::plan::{Commands, TrialConfiguration};
use crate::remote::{Connector, RemoteError, RemoteSession, SessionResult};

// Errors that originate within a trial should map to a relevant TrialError.
type Result<T> = std::result::Result<T, TrialError>;

/// Errors that abort a single trial.
#[derive(Debug)]
pub enum TrialError {
    /// The target could not be reached or the session broke.
    Connection(RemoteError),
    /// The power analyzer failed or had no recording.
    Measurement(MeterError),
    /// The result row could not be persisted.
    Storage(StorageError),
}

impl error::Error for TrialError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        use TrialError::*;
        match self {
            Connection(ref e) => Some(e),
            Measurement(ref e) => Some(e),
            Storage(ref e) => Some(e),
        }
    }
}

impl From<RemoteError> for TrialError {
    fn from(e: RemoteError) -> Self {
        TrialError::Connection(e)
    }
}

impl From<MeterError> for TrialError {
    fn from(e: MeterError) -> Self {
        TrialError::Measurement(e)
    }
}

impl From<StorageError> for TrialError {
    fn from(e: StorageError) -> Self {
        TrialError::Storage(e)
    }
}

impl Display for TrialError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TrialError::*;
        match self {
            Connection(ref e) => write!(f, "{}", e),
            Measurement(ref e) => write!(f, "measurement failed: {}", e),
            Storage(ref e) => write!(f, "{}", e),
        }
    }
}

/// Progress of a trial.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrialState {
    Pending,
    Connecting,
    Recording,
    Executing,
    Stopping,
    Collecting,
    Recorded,
    Failed,
}

impl Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TrialState::*;
        let name = match self {
            Pending => "pending",
            Connecting => "connecting",
            Recording => "recording",
            Executing => "executing",
            Stopping => "stopping",
            Collecting => "collecting",
            Recorded => "recorded",
            Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Pauses that let the target and analyzer settle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pacing {
    /// Between stopping a recording and reading its statistics.
    pub settle: Duration,
    /// After an iteration that recorded a row.
    pub after_success: Duration,
    /// After an iteration that was abandoned.
    pub after_failure: Duration,
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Pacing {
        Pacing {
            settle: Duration::from_secs(0),
            after_success: Duration::from_secs(0),
            after_failure: Duration::from_secs(0),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            settle: Duration::from_secs(10),
            after_success: Duration::from_secs(5),
            after_failure: Duration::from_secs(10),
        }
    }
}

/// What became of one iteration of a configuration.
#[derive(Debug)]
pub struct TrialReport {
    config: TrialConfiguration,
    iteration: u32,
    attempts: u32,
    state: TrialState,
    outcome: Result<ResultRow>,
}

impl TrialReport {
    /// Return the configuration the trial ran.
    pub fn config(&self) -> &TrialConfiguration {
        &self.config
    }

    /// Return the zero-based iteration index.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Return how many times the trial was started.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Return the state the last attempt ended in.
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Return the persisted row, or the error that abandoned the iteration.
    pub fn outcome(&self) -> &Result<ResultRow> {
        &self.outcome
    }

    pub fn recorded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/** Benchmark executor.

Owns every collaborator for the duration of a run: the connector to the
target, the power analyzer, and the result recorder. Trials run strictly one
after another.
 */
#[derive(Debug)]
pub struct Testbed {
    connector: Box<dyn Connector>,
    analyzer: Box<dyn PowerAnalyzer>,
    recorder: Box<dyn ResultRecorder>,
    commands: Commands,
    channel: String,
    pacing: Pacing,
}

impl Testbed {
    /// Initial attempt plus one retry.
    pub const MAX_ATTEMPTS: u32 = 2;

    /// Create a new `Testbed`.
    pub fn new(connector: Box<dyn Connector>,
               analyzer: Box<dyn PowerAnalyzer>,
               recorder: Box<dyn ResultRecorder>,
               channel: &str) -> Testbed
    {
        Testbed {
            connector,
            analyzer,
            recorder,
            commands: Commands::default(),
            channel: channel.to_string(),
            pacing: Pacing::default(),
        }
    }

    /// Use different commands on the target.
    pub fn with_commands(mut self, commands: Commands) -> Testbed {
        self.commands = commands;
        self
    }

    /// Use different pauses.
    pub fn with_pacing(mut self, pacing: Pacing) -> Testbed {
        self.pacing = pacing;
        self
    }

    /** Run every iteration of every configuration.

    Failures never escape: each iteration is attempted at most
    [`Testbed::MAX_ATTEMPTS`] times, then abandoned, and the run moves on.
     */
    pub fn execute(&mut self, configs: &[TrialConfiguration]) -> Vec<TrialReport> {
        let mut reports = Vec::new();

        for config in configs {
            info!("driver: configuration {}", config);
            let total = config.iteration_count();
            for iteration in 0..total {
                info!("driver: running iteration {} of {}", iteration + 1, total);
                let report = self.run_iteration(config, iteration);

                let pause = match report.outcome {
                    Ok(_) => self.pacing.after_success,
                    Err(ref e) => {
                        error!("driver: {}. Skipping iteration.", e);
                        self.pacing.after_failure
                    },
                };
                reports.push(report);
                thread::sleep(pause);
            }
        }

        reports
    }

    fn run_iteration(&mut self, config: &TrialConfiguration, iteration: u32) -> TrialReport {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut state = TrialState::Pending;
            let outcome = self.run_trial(config, &mut state);

            if let Err(ref e) = outcome {
                debug!("driver: trial failed while {}", state);
                state = TrialState::Failed;
                if attempts < Self::MAX_ATTEMPTS {
                    warn!("driver: something went wrong: {}. Retrying", e);
                    continue;
                }
            }

            return TrialReport {
                config: config.clone(),
                iteration,
                attempts,
                state,
                outcome,
            };
        }
    }

    /// One trial: connect, measure the benchmark, record, then clean up the target.
    fn run_trial(&mut self, config: &TrialConfiguration, state: &mut TrialState) -> Result<ResultRow> {
        advance(state, TrialState::Connecting);
        let mut session = self.connector.open()?;

        let outcome = self.measure(config, session.as_mut(), state);
        self.cleanup(config, session.as_mut());

        // Closes the session before the next trial opens one.
        drop(session);
        outcome
    }

    fn measure(&mut self,
               config: &TrialConfiguration,
               session: &mut dyn RemoteSession,
               state: &mut TrialState)
               -> Result<ResultRow>
    {
        advance(state, TrialState::Recording);
        self.analyzer.start()?;

        advance(state, TrialState::Executing);
        let command = self.commands.benchmark(config);
        info!("driver: running command: {}", command);
        let executed = session.execute(&command);

        // Stop even when the command could not be run, so the analyzer is idle for the retry.
        advance(state, TrialState::Stopping);
        let stopped = self.analyzer.stop();
        let result = executed?;
        stopped?;
        report_command(&result);

        thread::sleep(self.pacing.settle);

        advance(state, TrialState::Collecting);
        let (window, statistics) = self.analyzer.fetch_window_and_statistics(&self.channel)?;
        debug!("driver: window {}; {}", window, statistics);
        let row = self.recorder.append_row(config, &window, &statistics)?;
        info!("driver: recorded {:.5} over {:.5} s", row.energy_consumption, row.duration);

        if let Err(e) = self.analyzer.label(&config.recording_label()) {
            warn!("driver: could not label recording: {}", e);
        }
        advance(state, TrialState::Recorded);

        Ok(row)
    }

    /// Remove the benchmark's artifact from the target; failures are only logged.
    fn cleanup(&self, config: &TrialConfiguration, session: &mut dyn RemoteSession) {
        let command = self.commands.cleanup(config);
        info!("driver: running command: {}", command);
        match session.execute(&command) {
            Ok(result) => report_command(&result),
            Err(e) => warn!("driver: cleanup failed: {}", e),
        }
    }
}

fn advance(state: &mut TrialState, next: TrialState) {
    trace!("driver: {} -> {}", state, next);
    *state = next;
}

fn report_command(result: &SessionResult) {
    info!("driver: command completed with exit status: {}", result.exit_status);
    if log_enabled!(Level::Trace) {
        for line in &result.stdout_lines {
            trace!("  stdout: {}", line);
        }
    }

    match result.failure() {
        Some(failure) => {
            warn!("driver: {}", failure);
            for line in &failure.stderr_lines {
                warn!("  stderr: {}", line);
            }
        },
        None => {
            for line in &result.stderr_lines {
                debug!("  stderr: {}", line);
            }
        },
    }
}
