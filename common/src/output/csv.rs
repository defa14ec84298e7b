//! CSV output formatting for trial results.

use std::fs::OpenOptions;
use std::io;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ::csv::{Terminator, WriterBuilder};
use log::debug;
use tempfile::NamedTempFile;

use crate::measurement::{ChannelStatistics, MeasurementWindow, ResultRow};
use crate::plan::TrialConfiguration;

use super::{ResultRecorder, Result};

/** Appends rows to one CSV file per configuration.

Files are named `results_<device>_<os>_<runtime>.csv` inside the base
directory. Rows are appended with a single write, with the file opened and
closed around each call. A new file is staged next to its final name with
header and first row, then linked into place, so it never exists without
its header even when several writers race to create it.
 */
#[derive(Debug)]
pub struct CSVRecorder {
    base_path: PathBuf,
}

impl CSVRecorder {
    pub fn new(base_path: &Path) -> CSVRecorder {
        CSVRecorder {
            base_path: PathBuf::from(base_path),
        }
    }

    /// Returns the file receiving rows for a configuration.
    pub fn path_for(&self, config: &TrialConfiguration) -> PathBuf {
        self.base_path.join(format!("results_{}.csv", config.key()))
    }

    /// Append `row` if the file already exists; `false` when it does not.
    fn append_to_existing(path: &Path, row: &ResultRow) -> Result<bool> {
        let mut file = match OpenOptions::new().append(true).open(path) {
            Ok(file) => file,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        file.write_all(&Self::encode(row, false)?)?;
        file.flush()?;

        Ok(true)
    }

    fn encode(row: &ResultRow, with_header: bool) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        if with_header {
            writer.write_record(&ResultRow::HEADER)?;
        }
        writer.write_record(&row.fields())?;

        writer.into_inner()
            .map_err(|e| e.into_error().into())
    }
}

impl ResultRecorder for CSVRecorder {
    fn append_row(&self,
                  config: &TrialConfiguration,
                  window: &MeasurementWindow,
                  statistics: &ChannelStatistics)
                  -> Result<ResultRow>
    {
        let row = ResultRow::derive(window, statistics);
        let path = self.path_for(config);

        let new_file = if Self::append_to_existing(&path, &row)? {
            false
        } else {
            // Header and first row become visible together.
            let mut staged = NamedTempFile::new_in(&self.base_path)?;
            staged.write_all(&Self::encode(&row, true)?)?;
            staged.flush()?;
            match staged.persist_noclobber(&path) {
                Ok(_) => true,
                Err(ref e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    if !Self::append_to_existing(&path, &row)? {
                        let msg = format!("'{}' removed while appending", path.display());
                        return Err(io::Error::new(ErrorKind::NotFound, msg).into());
                    }
                    false
                },
                Err(e) => return Err(e.error.into()),
            }
        };
        debug!("recorder: appended to '{}'{}", path.display(),
               if new_file { " (new file)" } else { "" });

        Ok(row)
    }
}
