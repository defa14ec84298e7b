//! Result persistence.

use std::error;
use std::fmt;
use std::fmt::{Debug, Display};

use crate::measurement::{ChannelStatistics, MeasurementWindow, ResultRow};
use crate::plan::TrialConfiguration;

pub mod csv;

/// Result persistence result type.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A result row could not be persisted.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying file could not be created or written.
    IO(std::io::Error),
    /// Row could not be encoded.
    CSV(::csv::Error),
}

impl error::Error for StorageError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            StorageError::IO(ref e) => Some(e),
            StorageError::CSV(ref e) => Some(e),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageError::IO(ref e) => write!(f, "could not write results: {}", e),
            StorageError::CSV(ref e) => write!(f, "could not encode results: {}", e),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::IO(e)
    }
}

impl From<::csv::Error> for StorageError {
    fn from(e: ::csv::Error) -> Self {
        StorageError::CSV(e)
    }
}

/// Durable, append-only store of trial results.
pub trait ResultRecorder: Debug {
    /// Derive a row from a trial's measurements and append it to the configuration's results.
    fn append_row(&self,
                  config: &TrialConfiguration,
                  window: &MeasurementWindow,
                  statistics: &ChannelStatistics)
                  -> Result<ResultRow>;
}
