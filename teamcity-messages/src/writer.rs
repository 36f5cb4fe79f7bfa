// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped writers for nested service-message blocks.
//!
//! A [`TeamCityWriter`] owns the output sink. Opening a suite returns a [`SuiteWriter`] handle, and
//! opening a test from a suite returns a [`TestWriter`] that mutably borrows the suite, so a suite
//! cannot be closed while one of its tests is open.
//!
//! Suite handles are owned values so that callers can keep them across calls. The sink therefore
//! tracks the stack of open blocks itself: closing a block that isn't the innermost open one fails
//! with [`WriteError::OutOfOrderClose`] rather than corrupting the report.
//!
//! Handles that are dropped without being closed close themselves. Errors during such implicit
//! closes can't be returned, so they are logged instead.

use crate::{ServiceMessage, errors::WriteError};
use chrono::Local;
use debug_ignore::DebugIgnore;
use derive_where::derive_where;
use std::{cell::RefCell, io, rc::Rc, time::Duration};

/// The format TeamCity expects for the `timestamp` attribute.
static TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

static STATUS_NORMAL: &str = "NORMAL";
static STATUS_WARNING: &str = "WARNING";
static STATUS_ERROR: &str = "ERROR";

/// Options that apply to every message written by a [`TeamCityWriter`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterOptions {
    flow_id: Option<String>,
    timestamps: bool,
}

impl WriterOptions {
    /// Creates a new set of options with no flow ID and no timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `flowId` attribute with this value to every message.
    pub fn set_flow_id(&mut self, flow_id: impl Into<String>) -> &mut Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    /// Adds a `timestamp` attribute with the current local time to every message.
    pub fn set_timestamps(&mut self, timestamps: bool) -> &mut Self {
        self.timestamps = timestamps;
        self
    }

    /// Returns the flow ID, if any.
    pub fn flow_id(&self) -> Option<&str> {
        self.flow_id.as_deref()
    }

    /// Returns true if timestamps are added to messages.
    pub fn timestamps(&self) -> bool {
        self.timestamps
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BlockId(u64);

#[derive(Debug)]
struct OpenBlock {
    id: BlockId,
    name: String,
}

#[derive_where(Debug)]
struct SinkState<W> {
    out: DebugIgnore<W>,
    options: WriterOptions,
    open_blocks: Vec<OpenBlock>,
    next_id: u64,
}

type SharedSink<W> = Rc<RefCell<SinkState<W>>>;

impl<W: io::Write> SinkState<W> {
    fn emit(&mut self, mut message: ServiceMessage) -> Result<(), WriteError> {
        if let Some(flow_id) = &self.options.flow_id {
            message.set_attribute("flowId", flow_id.as_str());
        }
        if self.options.timestamps {
            message.set_attribute(
                "timestamp",
                Local::now().format(TIMESTAMP_FORMAT).to_string(),
            );
        }
        // A single write, so a failed message never leaves part of a line behind.
        let line = format!("{message}\n");
        self.out.0.write_all(line.as_bytes())?;
        Ok(())
    }

    fn open_block(&mut self, name: &str, message: ServiceMessage) -> Result<BlockId, WriteError> {
        // The block only counts as open once its start message has been written.
        self.emit(message)?;
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.open_blocks.push(OpenBlock {
            id,
            name: name.to_owned(),
        });
        tracing::trace!(block = name, depth = self.open_blocks.len(), "opened block");
        Ok(id)
    }

    fn close_block(
        &mut self,
        id: BlockId,
        name: &str,
        message: ServiceMessage,
    ) -> Result<(), WriteError> {
        match self.open_blocks.last() {
            Some(innermost) if innermost.id == id => {
                self.open_blocks.pop();
            }
            innermost => {
                return Err(WriteError::OutOfOrderClose {
                    name: name.to_owned(),
                    innermost: innermost.map(|block| block.name.clone()),
                });
            }
        }
        tracing::trace!(block = name, depth = self.open_blocks.len(), "closing block");
        // The block is popped even if the write fails: retrying the close would fail the same way.
        self.emit(message)
    }

    fn status_message(
        &mut self,
        text: &str,
        status: &'static str,
        details: Option<&str>,
    ) -> Result<(), WriteError> {
        let mut message = ServiceMessage::new("message").with_attribute("text", text);
        if let Some(details) = details {
            message.set_attribute("errorDetails", details);
        }
        message.set_attribute("status", status);
        self.emit(message)
    }

    fn open_block_names(&self) -> Vec<String> {
        self.open_blocks
            .iter()
            .map(|block| block.name.clone())
            .collect()
    }
}

/// The root writer for service messages.
///
/// Messages are written as one line each to the underlying [`io::Write`]. The writer does not
/// buffer: wrap the sink in a [`BufWriter`](io::BufWriter) if needed, and call
/// [`flush`](Self::flush) or [`finish`](Self::finish) at the end.
#[derive_where(Debug)]
pub struct TeamCityWriter<W> {
    sink: SharedSink<W>,
}

impl<W: io::Write> TeamCityWriter<W> {
    /// Creates a new writer with default options.
    pub fn new(out: W) -> Self {
        Self::with_options(out, WriterOptions::default())
    }

    /// Creates a new writer with the given options.
    pub fn with_options(out: W, options: WriterOptions) -> Self {
        Self {
            sink: Rc::new(RefCell::new(SinkState {
                out: DebugIgnore(out),
                options,
                open_blocks: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Returns the options this writer was created with.
    pub fn options(&self) -> WriterOptions {
        self.sink.borrow().options.clone()
    }

    /// Opens a top-level test suite, writing `testSuiteStarted`.
    pub fn open_test_suite(&mut self, name: &str) -> Result<SuiteWriter<W>, WriteError> {
        SuiteWriter::open(&self.sink, name)
    }

    /// Writes a message with `NORMAL` status.
    pub fn write_message(&mut self, text: &str) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_NORMAL, None)
    }

    /// Writes a message with `WARNING` status.
    pub fn write_warning(&mut self, text: &str) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_WARNING, None)
    }

    /// Writes a message with `ERROR` status, optionally with error details such as a stack trace.
    pub fn write_error(&mut self, text: &str, details: Option<&str>) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_ERROR, details)
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.sink.borrow_mut().out.0.flush()?;
        Ok(())
    }

    /// Checks that every block has been closed, flushes, and returns the underlying sink.
    pub fn finish(self) -> Result<W, WriteError> {
        let names = self.sink.borrow().open_block_names();
        if !names.is_empty() {
            return Err(WriteError::UnclosedBlocks { names });
        }

        let sink = Rc::try_unwrap(self.sink).map_err(|sink| {
            let names = sink.borrow().open_block_names();
            WriteError::UnclosedBlocks { names }
        })?;
        let mut state = sink.into_inner();
        state.out.0.flush()?;
        Ok(state.out.0)
    }
}

/// A handle to an open test suite.
///
/// Close it with [`close`](Self::close). If dropped while open, the suite is closed implicitly.
#[derive_where(Debug)]
pub struct SuiteWriter<W: io::Write> {
    sink: SharedSink<W>,
    id: BlockId,
    name: String,
    closed: bool,
}

impl<W: io::Write> SuiteWriter<W> {
    fn open(sink: &SharedSink<W>, name: &str) -> Result<Self, WriteError> {
        let message = ServiceMessage::new("testSuiteStarted").with_attribute("name", name);
        let id = sink.borrow_mut().open_block(name, message)?;
        Ok(Self {
            sink: sink.clone(),
            id,
            name: name.to_owned(),
            closed: false,
        })
    }

    /// Returns the name of this suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a nested test suite.
    pub fn open_test_suite(&mut self, name: &str) -> Result<SuiteWriter<W>, WriteError> {
        SuiteWriter::open(&self.sink, name)
    }

    /// Opens a test within this suite, writing `testStarted`.
    ///
    /// Output is reported explicitly through [`TestWriter::write_std_output`], so
    /// `captureStandardOutput` is always `false`.
    pub fn open_test(&mut self, name: &str) -> Result<TestWriter<'_, W>, WriteError> {
        let message = ServiceMessage::new("testStarted")
            .with_attribute("name", name)
            .with_attribute("captureStandardOutput", "false");
        let id = self.sink.borrow_mut().open_block(name, message)?;
        Ok(TestWriter {
            suite: self,
            id,
            name: name.to_owned(),
            duration: None,
            closed: false,
        })
    }

    /// Writes a message with `NORMAL` status.
    pub fn write_message(&mut self, text: &str) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_NORMAL, None)
    }

    /// Writes a message with `WARNING` status.
    pub fn write_warning(&mut self, text: &str) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_WARNING, None)
    }

    /// Writes a message with `ERROR` status.
    pub fn write_error(&mut self, text: &str, details: Option<&str>) -> Result<(), WriteError> {
        self.sink
            .borrow_mut()
            .status_message(text, STATUS_ERROR, details)
    }

    /// Closes this suite, writing `testSuiteFinished`.
    pub fn close(mut self) -> Result<(), WriteError> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<(), WriteError> {
        self.closed = true;
        let message = ServiceMessage::new("testSuiteFinished").with_attribute("name", &self.name);
        self.sink
            .borrow_mut()
            .close_block(self.id, &self.name, message)
    }
}

impl<W: io::Write> Drop for SuiteWriter<W> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // A borrow can only be outstanding if we're unwinding out of a write.
        if self.sink.try_borrow_mut().is_err() {
            tracing::warn!(suite = %self.name, "suite dropped while writer was busy, not closing");
            return;
        }
        if let Err(error) = self.close_impl() {
            tracing::warn!(suite = %self.name, "failed to close suite on drop: {error}");
        }
    }
}

/// A handle to an open test.
///
/// The test borrows its suite mutably, so it must be closed (or dropped, which closes it) before the
/// suite can be used again.
#[derive_where(Debug)]
pub struct TestWriter<'a, W: io::Write> {
    suite: &'a mut SuiteWriter<W>,
    id: BlockId,
    name: String,
    duration: Option<Duration>,
    closed: bool,
}

impl<W: io::Write> TestWriter<'_, W> {
    /// Returns the name of this test.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks the test as ignored, writing `testIgnored`.
    pub fn write_ignored(&mut self, reason: &str) -> Result<(), WriteError> {
        let message = ServiceMessage::new("testIgnored")
            .with_attribute("name", &self.name)
            .with_attribute("message", reason);
        self.emit(message)
    }

    /// Marks the test as failed, writing `testFailed`.
    pub fn write_failed(&mut self, reason: &str, details: &str) -> Result<(), WriteError> {
        let message = ServiceMessage::new("testFailed")
            .with_attribute("name", &self.name)
            .with_attribute("message", reason)
            .with_attribute("details", details);
        self.emit(message)
    }

    /// Writes a chunk of standard output, writing `testStdOut`.
    pub fn write_std_output(&mut self, text: &str) -> Result<(), WriteError> {
        let message = ServiceMessage::new("testStdOut")
            .with_attribute("name", &self.name)
            .with_attribute("out", text);
        self.emit(message)
    }

    /// Records the duration of the test.
    ///
    /// The duration is reported in milliseconds on the `testFinished` message.
    pub fn write_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    /// Closes this test, writing `testFinished`.
    pub fn close(mut self) -> Result<(), WriteError> {
        self.close_impl()
    }

    fn emit(&mut self, message: ServiceMessage) -> Result<(), WriteError> {
        self.suite.sink.borrow_mut().emit(message)
    }

    fn close_impl(&mut self) -> Result<(), WriteError> {
        self.closed = true;
        let mut message = ServiceMessage::new("testFinished").with_attribute("name", &self.name);
        if let Some(duration) = self.duration {
            message.set_attribute("duration", duration.as_millis().to_string());
        }
        self.suite
            .sink
            .borrow_mut()
            .close_block(self.id, &self.name, message)
    }
}

impl<W: io::Write> Drop for TestWriter<'_, W> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.suite.sink.try_borrow_mut().is_err() {
            tracing::warn!(test = %self.name, "test dropped while writer was busy, not closing");
            return;
        }
        if let Err(error) = self.close_impl() {
            tracing::warn!(test = %self.name, "failed to close test on drop: {error}");
        }
    }
}
