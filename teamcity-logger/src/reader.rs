// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading events from a JSON-lines stream.

use crate::{errors::ReadEventError, events::LoggerEvent};
use std::io::BufRead;

/// An iterator over the events in a JSON-lines stream, one [`LoggerEvent`] per line.
///
/// Blank lines are skipped. A line that can't be parsed yields an error and reading continues with
/// the next line; an I/O error ends the iteration.
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
    line_number: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a new reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Returns the 1-based number of the last line read.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    fn parse_line(line: &str, line_number: usize) -> Result<LoggerEvent, ReadEventError> {
        let mut deserializer = serde_json::Deserializer::from_str(line);
        let event = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|error| ReadEventError::Parse { line_number, error })?;
        deserializer
            .end()
            .map_err(|error| ReadEventError::TrailingData { line_number, error })?;
        Ok(event)
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<LoggerEvent, ReadEventError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            self.line_number += 1;
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let line = match std::str::from_utf8(&self.buf) {
                        Ok(line) => line.trim(),
                        Err(error) => {
                            return Some(Err(ReadEventError::InvalidUtf8 {
                                line_number: self.line_number,
                                error,
                            }));
                        }
                    };
                    if !line.is_empty() {
                        return Some(Self::parse_line(line, self.line_number));
                    }
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(ReadEventError::Io {
                        line_number: self.line_number,
                        error,
                    }));
                }
            }
        }
        None
    }
}
