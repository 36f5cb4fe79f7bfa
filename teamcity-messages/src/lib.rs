// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write and read TeamCity service messages in Rust.
//!
//! [`ServiceMessage`] is the data model for a single `##teamcity[...]` line, and
//! [`TeamCityWriter`] emits nested test suites and tests with guaranteed open/close ordering.

mod errors;
mod escape;
mod message;
mod writer;

pub use errors::*;
pub use escape::{escape, unescape};
pub use message::ServiceMessage;
pub use writer::{SuiteWriter, TeamCityWriter, TestWriter, WriterOptions};
