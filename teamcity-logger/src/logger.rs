// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::LoggerConfig,
    errors::{DisplayErrorChain, ProtocolError, TranslateError},
    events::{LoggerEvent, TestMessageLevel, TestResult, TestRunComplete, TestRunMessage},
    hierarchy::Hierarchy,
};
use derive_where::derive_where;
use std::{error::Error, io};
use teamcity_messages::{TeamCityWriter, WriteError};
use tracing::{debug, info, warn};

/// Translates test host events into TeamCity service messages.
///
/// Events are handled one at a time, in the order they are delivered. Failures while translating a
/// message or a result are reported in-band as an error message and don't stop the run; protocol
/// violations and failures at run completion are returned to the caller.
#[derive_where(Debug)]
pub struct TeamCityLogger<W: io::Write> {
    hierarchy: Hierarchy<W>,
    error_title: String,
}

impl<W: io::Write> TeamCityLogger<W> {
    /// Creates a new logger that writes service messages to `out`.
    pub fn new(out: W, config: &LoggerConfig) -> Self {
        let report = config.report();
        let writer = TeamCityWriter::with_options(out, config.writer_options());
        Self {
            hierarchy: Hierarchy::new(writer, report.root_suite(), report.stdout_category()),
            error_title: report.error_title().to_owned(),
        }
    }

    /// Returns the hierarchy of open blocks.
    pub fn hierarchy(&self) -> &Hierarchy<W> {
        &self.hierarchy
    }

    /// Handles a single event.
    pub fn handle_event(&mut self, event: &LoggerEvent) -> Result<(), TranslateError> {
        match event {
            LoggerEvent::Message(message) => self.on_message(message)?,
            LoggerEvent::Result(result) => self.on_result(result)?,
            LoggerEvent::RunComplete(complete) => self.on_run_complete(complete)?,
        }
        Ok(())
    }

    /// Handles a diagnostic message from the test host.
    ///
    /// Messages with an unknown level are dropped.
    pub fn on_message(&mut self, message: &TestRunMessage) -> Result<(), ProtocolError> {
        let res = self.translate_message(message);
        self.recover(res)
    }

    /// Handles the result of a single test.
    pub fn on_result(&mut self, result: &TestResult) -> Result<(), ProtocolError> {
        let res = self.translate_result(result);
        self.recover(res)
    }

    /// Handles the end of the run: closes every open block and flushes the output.
    ///
    /// If no event ever opened the run block, nothing is written.
    pub fn on_run_complete(&mut self, complete: &TestRunComplete) -> Result<(), TranslateError> {
        self.hierarchy.close_all()?;
        self.hierarchy.writer_mut().flush()?;

        let statistics = &complete.statistics;
        info!("Total Executed: {}", statistics.executed);
        info!("Total Passed: {}", statistics.passed);
        info!("Total Failed: {}", statistics.failed);
        info!("Total Skipped: {}", statistics.skipped);
        Ok(())
    }

    /// Reports an error in-band, as an error message whose details describe `error`.
    ///
    /// If the error message can't be written, that failure is logged.
    pub fn report_error(&mut self, error: impl Error) {
        let details = DisplayErrorChain::new(error).to_string();
        warn!("{details}");
        if let Err(write_error) = self
            .hierarchy
            .writer_mut()
            .write_error(&self.error_title, Some(&details))
        {
            warn!(
                "failed to report error: {}",
                DisplayErrorChain::new(&write_error)
            );
        }
    }

    /// Closes any blocks that are still open, flushes, and returns the underlying sink.
    pub fn finish(self) -> Result<W, WriteError> {
        self.hierarchy.finish()
    }

    // ---
    // Helper methods
    // ---

    fn translate_message(&mut self, message: &TestRunMessage) -> Result<(), TranslateError> {
        self.hierarchy.ensure_run_open()?;
        let writer = self.hierarchy.writer_mut();
        match message.level {
            TestMessageLevel::Informational => writer.write_message(&message.text)?,
            TestMessageLevel::Warning => writer.write_warning(&message.text)?,
            TestMessageLevel::Error => writer.write_error(&message.text, None)?,
            TestMessageLevel::Unknown => {
                debug!(text = %message.text, "dropping message with unknown level");
            }
        }
        Ok(())
    }

    fn translate_result(&mut self, result: &TestResult) -> Result<(), TranslateError> {
        self.hierarchy.ensure_run_open()?;

        let Some(key) = assembly_key(&result.source) else {
            return Err(TranslateError::MissingAssemblyName {
                test_name: result.fully_qualified_name.clone(),
                source_path: result.source.clone(),
            });
        };
        if result.fully_qualified_name.is_empty() {
            return Err(TranslateError::EmptyTestName {
                source_path: result.source.clone(),
            });
        }

        self.hierarchy.enter_assembly(key)?;
        self.hierarchy.record_test(result)
    }

    fn recover(&mut self, res: Result<(), TranslateError>) -> Result<(), ProtocolError> {
        match res {
            Ok(()) => Ok(()),
            Err(TranslateError::Protocol(error)) => Err(error),
            Err(error) => {
                self.report_error(&error);
                Ok(())
            }
        }
    }
}

/// Returns the file name of a test source, which names its assembly block.
///
/// Both `/` and `\` separate directories, since sources may come from either platform.
fn assembly_key(source: &str) -> Option<&str> {
    source
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
}
