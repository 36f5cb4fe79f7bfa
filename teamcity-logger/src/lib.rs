// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Translates a flat stream of test host events into strictly nested TeamCity service messages.
//!
//! The main entry point is [`TeamCityLogger`]. Results may arrive for any assembly in any order;
//! the logger keeps a single run block open around everything it writes, opens one assembly block
//! at a time, and writes each test as a complete block.

pub mod config;
pub mod errors;
pub mod events;
mod hierarchy;
mod logger;
mod reader;

pub use hierarchy::Hierarchy;
pub use logger::TeamCityLogger;
pub use reader::EventReader;
