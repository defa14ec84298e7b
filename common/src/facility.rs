//! Facilities the testbed uses to observe the device under test.

use std::error;
use std::fmt;
use std::fmt::{Debug, Display};

use crate::measurement::{ChannelStatistics, MeasurementWindow};

/// Measurement facility result type.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Errors from interacting with a power-measurement device.
#[derive(Debug)]
pub enum MeterError {
    /// No measurement device is attached to the analyzer.
    NoDevice,
    /// Statistics were requested without a completed recording on the channel.
    NoRecordingAvailable,
    /// The device rejected a command.
    Device {
        command: String,
        code: String,
        message: String,
    },
    /// The device answered with something unexpected.
    Protocol(String),
    /// Transport error talking to the device.
    IO(std::io::Error),
}

impl error::Error for MeterError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MeterError::IO(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for MeterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use MeterError::*;
        match self {
            NoDevice => write!(f, "no Arc or Ace connected"),
            NoRecordingAvailable => write!(f, "no completed recording available"),
            Device { command, code, message } => write!(f, "'{}' failed ({}): {}", command, code, message),
            Protocol(ref msg) => write!(f, "measurement protocol error: {}", msg),
            IO(ref e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<std::io::Error> for MeterError {
    fn from(e: std::io::Error) -> Self {
        MeterError::IO(e)
    }
}

/** Recording control over an external power analyzer.

Calls within a trial must occur in the order `start`, `stop`,
`fetch_window_and_statistics`, `label`. Recording must bracket exactly the
workload being measured.
 */
pub trait PowerAnalyzer: Debug {
    /// Begin recording.
    fn start(&mut self) -> Result<()>;

    /// End recording; the window of the recording is fixed afterwards.
    fn stop(&mut self) -> Result<()>;

    /// Return the time bounds and statistics of the last completed recording on a channel.
    fn fetch_window_and_statistics(&mut self, channel: &str)
                                   -> Result<(MeasurementWindow, ChannelStatistics)>;

    /// Give the last completed recording a name.
    fn label(&mut self, name: &str) -> Result<()>;
}
