// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reports test host events to TeamCity as nested service messages.
//!
//! This crate is the command-line front end for [`teamcity_logger`]. It reads a JSON-lines event
//! stream, and writes service messages to standard output or a file.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, OutputContext, StderrStyles};
