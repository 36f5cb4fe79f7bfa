// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::{FromPathBufError, Utf8PathBuf};
use owo_colors::OwoColorize;
use std::error::Error;
use teamcity_logger::errors::{ConfigParseError, ReadEventError, TranslateError};
use teamcity_messages::WriteError;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Process exit codes.
#[doc(hidden)]
pub enum VstestTeamcityExitCode {}

impl VstestTeamcityExitCode {
    /// The event stream was translated successfully.
    pub const OK: i32 = 0;

    /// An error occurred before any event was read, such as a bad config or an unreadable input.
    pub const SETUP_ERROR: i32 = 96;

    /// The event stream could not be read.
    pub const READ_EVENTS_FAILED: i32 = 97;

    /// Service messages could not be written.
    pub const WRITE_FAILED: i32 = 98;

    /// Events could not be translated without corrupting the report.
    pub const TRANSLATE_FAILED: i32 = 99;
}

// The #[error()] strings are placeholders: errors are printed with display_to_stderr.

/// An error that stops `vstest-teamcity`.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        error: FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        error: ConfigParseError,
    },
    #[error("failed to open input")]
    InputOpenError {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to create output")]
    OutputCreateError {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to write registration")]
    RegistrationWriteError {
        #[source]
        error: std::io::Error,
    },
    #[error("failed to read events")]
    ReadEventsError {
        #[source]
        error: ReadEventError,
    },
    #[error("failed to translate events")]
    TranslateError {
        #[source]
        error: TranslateError,
    },
    #[error("failed to finish writing service messages")]
    FinishError {
        #[source]
        error: WriteError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::InputOpenError { .. }
            | Self::OutputCreateError { .. } => VstestTeamcityExitCode::SETUP_ERROR,
            Self::ReadEventsError { .. } => VstestTeamcityExitCode::READ_EVENTS_FAILED,
            Self::RegistrationWriteError { .. } | Self::FinishError { .. } => {
                VstestTeamcityExitCode::WRITE_FAILED
            }
            Self::TranslateError { error } => match error {
                TranslateError::Write(_) => VstestTeamcityExitCode::WRITE_FAILED,
                _ => VstestTeamcityExitCode::TRANSLATE_FAILED,
            },
        }
    }

    /// Displays this error to stderr, along with its chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { error } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    error.as_path().display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { error } => {
                error!(
                    "failed to parse config at `{}`",
                    error.config_file().style(styles.bold)
                );
                error.source()
            }
            Self::InputOpenError { path, error } => {
                error!("failed to open input `{}`", path.style(styles.bold));
                Some(error as &dyn Error)
            }
            Self::OutputCreateError { path, error } => {
                error!("failed to create output `{}`", path.style(styles.bold));
                Some(error as &dyn Error)
            }
            Self::RegistrationWriteError { error } => {
                error!("failed to write registration");
                Some(error as &dyn Error)
            }
            Self::ReadEventsError { error } => {
                error!("{error}");
                error.source()
            }
            Self::TranslateError { error } => {
                error!("{error}");
                error.source()
            }
            Self::FinishError { error } => {
                error!("failed to finish writing service messages");
                Some(error as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
