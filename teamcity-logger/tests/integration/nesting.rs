// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for block nesting over arbitrary event streams.

use crate::fixtures::*;
use proptest::prelude::*;
use teamcity_logger::events::{
    LoggerEvent, TestMessageLevel, TestOutcome, TestResult, TestRunComplete, TestRunMessage,
};
use test_strategy::proptest;

fn arb_level() -> impl Strategy<Value = TestMessageLevel> {
    prop_oneof![
        Just(TestMessageLevel::Informational),
        Just(TestMessageLevel::Warning),
        Just(TestMessageLevel::Error),
        Just(TestMessageLevel::Unknown),
    ]
}

fn arb_outcome() -> impl Strategy<Value = TestOutcome> {
    prop_oneof![
        Just(TestOutcome::Passed),
        Just(TestOutcome::Failed),
        Just(TestOutcome::Skipped),
        Just(TestOutcome::NotFound),
        Just(TestOutcome::Other),
    ]
}

fn arb_event() -> impl Strategy<Value = LoggerEvent> {
    prop_oneof![
        1 => (arb_level(), "[a-z ]{0,8}")
            .prop_map(|(level, text)| LoggerEvent::Message(TestRunMessage::new(level, text))),
        4 => (
            prop::sample::select(vec!["a.dll", "bin/a.dll", "b.dll", r"c:\x\c.dll", "", "dir/"]),
            "[A-Za-z.]{0,6}",
            arb_outcome(),
            prop::collection::vec(
                (prop::sample::select(vec!["StdOutMsgs", "StdErrMsgs"]), "[a-z']{0,4}"),
                0..3,
            ),
            0u64..100,
        )
            .prop_map(|(source, name, outcome, messages, ms)| {
                let mut result = TestResult::new(source, name, outcome);
                for (category, text) in messages {
                    result.add_message(category, text);
                }
                result.set_duration(millis(ms));
                LoggerEvent::Result(result)
            }),
    ]
}

fn basename(source: &str) -> &str {
    source
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(source)
}

/// Returns the assembly blocks a well-formed report for `events` should contain, in order.
fn expected_assemblies(events: &[LoggerEvent]) -> Vec<String> {
    let mut assemblies: Vec<String> = Vec::new();
    for event in events {
        if let LoggerEvent::Result(result) = event {
            let key = basename(&result.source);
            if key.is_empty() || result.fully_qualified_name.is_empty() {
                continue;
            }
            if assemblies.last().map(String::as_str) != Some(key) {
                assemblies.push(key.to_owned());
            }
        }
    }
    assemblies
}

#[proptest]
fn blocks_are_balanced(
    #[strategy(prop::collection::vec(arb_event(), 0..24))] events: Vec<LoggerEvent>,
    complete: bool,
) {
    let mut logger = new_logger();
    for event in &events {
        logger.handle_event(event).expect("event handled");
    }
    if complete {
        logger
            .handle_event(&LoggerEvent::RunComplete(TestRunComplete::default()))
            .expect("run completes");
    }

    let output = finish(logger);
    let messages = parse_output(&output);

    // Every close matches the innermost open block, and nothing is left open.
    let mut stack: Vec<String> = Vec::new();
    for line in block_outline(&messages) {
        if let Some(name) = line.strip_prefix("+suite ").or(line.strip_prefix("+test ")) {
            stack.push(name.to_owned());
        } else {
            let name = line
                .strip_prefix("-suite ")
                .or(line.strip_prefix("-test "))
                .expect("outline only contains block markers");
            let innermost = stack.pop();
            prop_assert_eq!(innermost.as_deref(), Some(name), "output:\n{}", output);
        }
        // Run → assembly → test is the deepest nesting.
        prop_assert!(stack.len() <= 3, "output:\n{}", output);
    }
    prop_assert!(stack.is_empty(), "output:\n{}", output);

    // The run block is opened iff there was at least one event.
    let suites: Vec<_> = messages
        .iter()
        .filter(|message| message.name() == "testSuiteStarted")
        .filter_map(|message| message.attribute("name"))
        .collect();
    if events.is_empty() {
        prop_assert!(messages.is_empty());
    } else {
        prop_assert_eq!(suites.first().copied(), Some("VSTest"));
        let assemblies: Vec<&str> = suites[1..].to_vec();
        prop_assert_eq!(assemblies, expected_assemblies(&events));
    }
}
