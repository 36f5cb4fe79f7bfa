// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The nesting state machine: run block → assembly block → test block.
//!
//! Service messages must nest strictly, but results arrive as a flat stream. [`Hierarchy`] tracks
//! which blocks are open and performs the implicit closes needed to keep the report well-formed.
//! Test blocks never outlive a call to [`Hierarchy::record_test`].

use crate::{
    errors::{ProtocolError, TranslateError},
    events::{TestOutcome, TestResult},
};
use derive_where::derive_where;
use std::{io, mem};
use teamcity_messages::{SuiteWriter, TeamCityWriter, WriteError};
use tracing::debug;

/// The state of the run block.
///
/// Field order matters: on drop, `assembly` is closed before `run`.
#[derive_where(Debug)]
enum RunState<W: io::Write> {
    /// No event has required the run block yet.
    Unopened,
    RunOpen {
        run: SuiteWriter<W>,
    },
    AssemblyOpen {
        assembly: SuiteWriter<W>,
        run: SuiteWriter<W>,
    },
    /// The run block was opened and has been closed. It is never reopened.
    RunClosed,
}

impl<W: io::Write> RunState<W> {
    fn name(&self) -> &'static str {
        match self {
            RunState::Unopened => "unopened",
            RunState::RunOpen { .. } => "open",
            RunState::AssemblyOpen { .. } => "open with an assembly",
            RunState::RunClosed => "closed",
        }
    }
}

/// Tracks the open blocks of a report and keeps their open/close order legal.
#[derive_where(Debug)]
pub struct Hierarchy<W: io::Write> {
    // Declared before `root` so open blocks are closed before the root writer goes away.
    state: RunState<W>,
    root: TeamCityWriter<W>,
    root_suite: String,
    stdout_category: String,
}

impl<W: io::Write> Hierarchy<W> {
    /// Creates a new hierarchy over `root`.
    ///
    /// The run block is named `root_suite`. Captured output entries are reported as standard output
    /// only if their category matches `stdout_category`, ignoring case.
    pub fn new(
        root: TeamCityWriter<W>,
        root_suite: impl Into<String>,
        stdout_category: impl Into<String>,
    ) -> Self {
        Self {
            state: RunState::Unopened,
            root,
            root_suite: root_suite.into(),
            stdout_category: stdout_category.into(),
        }
    }

    /// Returns the root writer, for messages that aren't tied to a block.
    pub fn writer_mut(&mut self) -> &mut TeamCityWriter<W> {
        &mut self.root
    }

    /// Returns true if the run block is currently open.
    pub fn is_run_open(&self) -> bool {
        matches!(
            self.state,
            RunState::RunOpen { .. } | RunState::AssemblyOpen { .. }
        )
    }

    /// Returns the name of the open assembly block, if any.
    pub fn current_assembly(&self) -> Option<&str> {
        match &self.state {
            RunState::AssemblyOpen { assembly, .. } => Some(assembly.name()),
            _ => None,
        }
    }

    /// Opens the run block if no event has opened it yet.
    ///
    /// Once the run block has been closed this does nothing.
    pub fn ensure_run_open(&mut self) -> Result<(), WriteError> {
        if let RunState::Unopened = self.state {
            let run = self.root.open_test_suite(&self.root_suite)?;
            debug!(suite = %self.root_suite, "opened run block");
            self.state = RunState::RunOpen { run };
        }
        Ok(())
    }

    /// Makes `key` the open assembly block, closing the previous assembly block if it differs.
    pub fn enter_assembly(&mut self, key: &str) -> Result<(), TranslateError> {
        let mut run = match mem::replace(&mut self.state, RunState::RunClosed) {
            RunState::AssemblyOpen { assembly, run } if assembly.name() == key => {
                self.state = RunState::AssemblyOpen { assembly, run };
                return Ok(());
            }
            RunState::AssemblyOpen { assembly, run } => {
                debug!(from = assembly.name(), to = key, "switching assembly block");
                if let Err(error) = assembly.close() {
                    self.state = RunState::RunOpen { run };
                    return Err(error.into());
                }
                run
            }
            RunState::RunOpen { run } => run,
            state @ (RunState::Unopened | RunState::RunClosed) => {
                let error = ProtocolError::RunNotOpen {
                    assembly: key.to_owned(),
                    state: state.name(),
                };
                self.state = state;
                return Err(error.into());
            }
        };

        match run.open_test_suite(key) {
            Ok(assembly) => {
                debug!(assembly = key, "opened assembly block");
                self.state = RunState::AssemblyOpen { assembly, run };
                Ok(())
            }
            Err(error) => {
                self.state = RunState::RunOpen { run };
                Err(error.into())
            }
        }
    }

    /// Writes a complete test block for `result` within the open assembly block.
    ///
    /// The test block is closed before this returns, on error paths too.
    pub fn record_test(&mut self, result: &TestResult) -> Result<(), TranslateError> {
        let RunState::AssemblyOpen { assembly, .. } = &mut self.state else {
            return Err(ProtocolError::NoAssemblyOpen {
                test_name: result.fully_qualified_name.clone(),
            }
            .into());
        };

        let mut test = assembly.open_test(&result.fully_qualified_name)?;
        let error_message = result.error_message.as_deref().unwrap_or_default();
        match result.outcome {
            TestOutcome::Skipped => test.write_ignored(error_message)?,
            TestOutcome::Failed => test.write_failed(
                error_message,
                result.error_stack_trace.as_deref().unwrap_or_default(),
            )?,
            TestOutcome::Passed | TestOutcome::NotFound | TestOutcome::Other => {}
        }

        for message in &result.messages {
            if eq_ignore_case(&message.category, &self.stdout_category) {
                test.write_std_output(&message.text)?;
            }
        }

        test.write_duration(result.duration);
        test.close()?;
        Ok(())
    }

    /// Closes the open assembly block, if any, and then the run block.
    ///
    /// If the run block was never opened, nothing is written.
    pub fn close_all(&mut self) -> Result<(), TranslateError> {
        match mem::replace(&mut self.state, RunState::RunClosed) {
            RunState::Unopened => {
                debug!("run block was never opened, nothing to close");
                self.state = RunState::Unopened;
            }
            RunState::RunOpen { run } => {
                run.close()?;
                debug!("closed run block");
            }
            RunState::AssemblyOpen { assembly, run } => {
                let assembly_res = assembly.close();
                let run_res = run.close();
                assembly_res?;
                run_res?;
                debug!("closed assembly and run blocks");
            }
            RunState::RunClosed => {}
        }
        Ok(())
    }

    /// Closes any blocks that are still open, flushes, and returns the underlying sink.
    pub fn finish(self) -> Result<W, WriteError> {
        let Self { state, root, .. } = self;
        if !matches!(state, RunState::Unopened | RunState::RunClosed) {
            tracing::warn!(
                state = state.name(),
                "run did not complete, closing open blocks"
            );
        }
        drop(state);
        root.finish()
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
