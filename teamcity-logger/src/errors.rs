// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the TeamCity logger.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt, io};
use teamcity_messages::WriteError;
use thiserror::Error;

/// An error that occurred while parsing the logger config.
#[derive(Debug, Error)]
#[error("failed to parse logger config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config, with the path of the offending key.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// A protocol-integrity violation: an attempt to open or close a block in an order that would
/// corrupt the report.
///
/// These indicate a bug in the logger rather than a bad event, so they are never recovered from.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// An assembly was entered while the run block was not open.
    #[error("cannot enter assembly `{assembly}`: run block is {state}")]
    RunNotOpen {
        /// The assembly that was being entered.
        assembly: String,

        /// The state the run block was in.
        state: &'static str,
    },

    /// A test was recorded while no assembly block was open.
    #[error("cannot record test `{test_name}`: no assembly block is open")]
    NoAssemblyOpen {
        /// The test that was being recorded.
        test_name: String,
    },

    /// The writer rejected a close because the block was not the innermost open one.
    #[error("service message writer rejected block ordering")]
    Writer(#[source] WriteError),
}

/// An error that occurred while translating an event into service messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranslateError {
    /// The source of a test result had no file name.
    #[error("test `{test_name}` has no assembly name in source `{source_path}`")]
    MissingAssemblyName {
        /// The test whose source was invalid.
        test_name: String,

        /// The source as reported.
        source_path: String,
    },

    /// A test result had an empty fully qualified name.
    #[error("test result from `{source_path}` has an empty name")]
    EmptyTestName {
        /// The source of the test result.
        source_path: String,
    },

    /// An error occurred while writing to the output.
    #[error("error writing service messages")]
    Write(#[source] WriteError),

    /// A protocol-integrity violation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<WriteError> for TranslateError {
    fn from(error: WriteError) -> Self {
        if error.is_protocol_violation() {
            TranslateError::Protocol(ProtocolError::Writer(error))
        } else {
            TranslateError::Write(error)
        }
    }
}

/// An error that occurred while reading an event from a stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadEventError {
    /// An I/O error occurred while reading the stream.
    #[error("error reading events at line {line_number}")]
    Io {
        /// The 1-based line number being read.
        line_number: usize,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A line was not valid UTF-8.
    #[error("invalid UTF-8 at line {line_number}")]
    InvalidUtf8 {
        /// The 1-based line number of the invalid event.
        line_number: usize,

        /// The underlying error.
        #[source]
        error: std::str::Utf8Error,
    },

    /// A line could not be deserialized as an event.
    #[error("invalid event at line {line_number}")]
    Parse {
        /// The 1-based line number of the invalid event.
        line_number: usize,

        /// The underlying error, including the path to the offending field.
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
    },

    /// A line contained more than one JSON value.
    #[error("unexpected data after event at line {line_number}")]
    TrailingData {
        /// The 1-based line number of the event.
        line_number: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

impl ReadEventError {
    /// Returns true if reading can continue with the next line after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReadEventError::InvalidUtf8 { .. }
                | ReadEventError::Parse { .. }
                | ReadEventError::TrailingData { .. }
        )
    }
}

/// Displays an error along with its chain of causes.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut next = self.error.source();
        if next.is_none() {
            return Ok(());
        }
        write!(f, "\n  caused by:")?;
        while let Some(cause) = next {
            write!(f, "\n  - {cause}")?;
            next = cause.source();
        }
        Ok(())
    }
}
