//! Streaming reader over replay scripts
//!
//! Yields one [`ScriptCommand`] per CSV row without loading the whole file.
//! Delegates row conversion to the csv_format module.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Row parsing errors are yielded as `Err` with the file line number, and
//!   iteration continues with the next row

use crate::io::csv_format::{convert_script_record, ScriptCommand, ScriptRecord};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A row that could not become a command
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// Line in the file, the header being line 1
    pub line: u64,
    pub message: String,
}

/// Iterator over the commands of a replay script
#[derive(Debug)]
pub struct ScriptReader<R: Read = File> {
    reader: csv::Reader<R>,
    line_num: u64,
}

impl ScriptReader<File> {
    /// Open a script file
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns may be omitted)
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> ScriptReader<R> {
    pub fn from_reader(input: R) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(input);

        Self {
            reader,
            line_num: 1,
        }
    }
}

impl<R: Read> Iterator for ScriptReader<R> {
    type Item = Result<ScriptCommand, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<ScriptRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match row {
            Ok(record) => {
                convert_script_record(record).map_err(|message| RowError { line, message })
            }
            Err(e) => Err(RowError {
                line,
                message: format!("CSV parse error: {}", e),
            }),
        })
    }
}
