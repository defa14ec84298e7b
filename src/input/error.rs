//! Run plan and credential input errors.

use std::convert::From;
use std::error;
use std::fmt;
use std::fmt::Display;

/// Errors from creating a run plan or reading credentials from provided input.
#[derive(Debug)]
pub enum Error {
    /// Input format error with provided input.
    Format(String),
    /// I/O error.
    IO(std::io::Error),
    /// Provided input is not supported.
    Unsupported(String),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        use Error::*;
        match self {
            IO(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            Format(ref msg) => write!(f, "input format error: {}", msg),
            IO(ref e) => write!(f, "I/O error: {}", e),
            Unsupported(ref msg) => write!(f, "input unsupported: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Format(format!("JSON parsing failure: {}", e))
    }
}
