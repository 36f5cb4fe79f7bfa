// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events delivered by a test host to the logger.
//!
//! Events are consumed by [`TeamCityLogger`](crate::TeamCityLogger), either through its individual
//! `on_*` methods or as a [`LoggerEvent`] through
//! [`handle_event`](crate::TeamCityLogger::handle_event).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An event produced by a test host.
///
/// Serialized as a JSON object tagged with `"type"`, one per line when read through
/// [`EventReader`](crate::EventReader).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LoggerEvent {
    /// A diagnostic message from the test host.
    Message(TestRunMessage),

    /// A single test finished.
    Result(TestResult),

    /// The test run completed. No further events follow.
    RunComplete(TestRunComplete),
}

/// The severity of a [`TestRunMessage`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TestMessageLevel {
    /// An informational message.
    Informational,

    /// A warning.
    Warning,

    /// An error.
    Error,

    /// A level this version of the logger doesn't know about. Messages at this level are dropped.
    #[serde(other)]
    Unknown,
}

/// A diagnostic message from the test host.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestRunMessage {
    /// The severity of the message.
    pub level: TestMessageLevel,

    /// The message text.
    pub text: String,
}

impl TestRunMessage {
    /// Creates a new message.
    pub fn new(level: TestMessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// The outcome of a single test.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TestOutcome {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped.
    Skipped,

    /// The test could not be found.
    NotFound,

    /// No outcome, or an outcome this version of the logger doesn't know about.
    #[serde(other)]
    Other,
}

/// An entry of output captured while a test ran.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestResultMessage {
    /// The category of the output, e.g. `StdOutMsgs` or `StdErrMsgs`.
    pub category: String,

    /// The captured text.
    pub text: String,
}

impl TestResultMessage {
    /// Creates a new output entry.
    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// The result of a single test.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TestResult {
    /// The module the test came from, typically the path to a test assembly.
    pub source: String,

    /// The fully qualified name of the test.
    pub fully_qualified_name: String,

    /// The outcome of the test.
    pub outcome: TestOutcome,

    /// The error message, for failed or skipped tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// The stack trace, for failed tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,

    /// Output captured while the test ran, in the order it was produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<TestResultMessage>,

    /// The time the test took to run.
    #[serde(default, with = "humantime_serde")]
    pub duration: Duration,
}

impl TestResult {
    /// Creates a new result with no error information, no captured output and zero duration.
    pub fn new(
        source: impl Into<String>,
        fully_qualified_name: impl Into<String>,
        outcome: TestOutcome,
    ) -> Self {
        Self {
            source: source.into(),
            fully_qualified_name: fully_qualified_name.into(),
            outcome,
            error_message: None,
            error_stack_trace: None,
            messages: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Sets the error message.
    pub fn set_error_message(&mut self, error_message: impl Into<String>) -> &mut Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// Sets the stack trace.
    pub fn set_error_stack_trace(&mut self, error_stack_trace: impl Into<String>) -> &mut Self {
        self.error_stack_trace = Some(error_stack_trace.into());
        self
    }

    /// Adds an entry of captured output.
    pub fn add_message(
        &mut self,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> &mut Self {
        self.messages.push(TestResultMessage::new(category, text));
        self
    }

    /// Sets the duration.
    pub fn set_duration(&mut self, duration: Duration) -> &mut Self {
        self.duration = duration;
        self
    }
}

/// Aggregate counts for a completed run.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunStatistics {
    /// The number of tests that were executed.
    pub executed: u64,

    /// The number of tests that passed.
    pub passed: u64,

    /// The number of tests that failed.
    pub failed: u64,

    /// The number of tests that were skipped.
    pub skipped: u64,
}

/// Signals that the test run completed.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestRunComplete {
    /// Aggregate counts for the run.
    #[serde(default)]
    pub statistics: RunStatistics,
}
