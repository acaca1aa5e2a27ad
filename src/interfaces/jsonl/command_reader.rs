use super::command::Command;
use crate::error::{BookingError, Result};
use std::io::BufRead;

/// Reads commands from a newline-delimited JSON source.
///
/// Blank lines and lines starting with `#` are skipped. Each remaining line
/// must hold exactly one command object.
pub struct CommandReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> CommandReader<R> {
    /// Creates a new `CommandReader` from any buffered source (e.g., a
    /// `BufReader<File>`, or a byte slice in tests).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads and deserializes commands, so a
    /// bad line is reported without stopping the rest of the script.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.source.lines().filter_map(|line| match line {
            Err(e) => Some(Err(BookingError::from(e))),
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    None
                } else {
                    Some(serde_json::from_str::<Command>(line).map_err(BookingError::from))
                }
            }
        })
    }
}
