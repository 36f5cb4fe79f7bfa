// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use teamcity_logger::{
    EventReader, TeamCityLogger,
    config::LoggerConfig,
    errors::{ProtocolError, TranslateError},
    events::{TestMessageLevel, TestOutcome, TestResult, TestRunMessage},
};

#[test]
fn single_passed_test() {
    let mut logger = new_logger();
    let mut result = passed("a.dll", "T1");
    result.set_duration(millis(10));
    logger.on_result(&result).expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    assert_eq!(
        finish(logger),
        indoc! {"
            ##teamcity[testSuiteStarted name='VSTest']
            ##teamcity[testSuiteStarted name='a.dll']
            ##teamcity[testStarted name='T1' captureStandardOutput='false']
            ##teamcity[testFinished name='T1' duration='10']
            ##teamcity[testSuiteFinished name='a.dll']
            ##teamcity[testSuiteFinished name='VSTest']
        "}
    );
}

#[test]
fn same_assembly_opens_once() {
    let mut logger = new_logger();
    for name in ["T1", "T2", "T3"] {
        logger
            .on_result(&passed("/build/a.dll", name))
            .expect("result handled");
    }
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let messages = parse_output(&finish(logger));
    assert_eq!(
        block_outline(&messages),
        vec![
            "+suite VSTest",
            "+suite a.dll",
            "+test T1",
            "-test T1",
            "+test T2",
            "-test T2",
            "+test T3",
            "-test T3",
            "-suite a.dll",
            "-suite VSTest",
        ]
    );
}

#[test]
fn interleaved_assemblies_are_not_merged() {
    let mut logger = new_logger();
    logger
        .on_result(&passed("bin/a.dll", "A1"))
        .expect("result handled");
    logger
        .on_result(&passed(r"bin\b.dll", "B1"))
        .expect("result handled");
    logger
        .on_result(&passed("bin/a.dll", "A2"))
        .expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let messages = parse_output(&finish(logger));
    assert_eq!(
        block_outline(&messages),
        vec![
            "+suite VSTest",
            "+suite a.dll",
            "+test A1",
            "-test A1",
            "-suite a.dll",
            "+suite b.dll",
            "+test B1",
            "-test B1",
            "-suite b.dll",
            "+suite a.dll",
            "+test A2",
            "-test A2",
            "-suite a.dll",
            "-suite VSTest",
        ]
    );
}

#[test]
fn run_complete_without_events_writes_nothing() {
    let mut logger = new_logger();
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");
    assert!(!logger.hierarchy().is_run_open());
    assert_eq!(finish(logger), "");
}

#[test]
fn messages_open_the_run() {
    let mut logger = new_logger();
    logger
        .on_message(&TestRunMessage::new(
            TestMessageLevel::Informational,
            "Starting test execution",
        ))
        .expect("message handled");
    logger
        .on_message(&TestRunMessage::new(TestMessageLevel::Warning, "slow"))
        .expect("message handled");
    logger
        .on_message(&TestRunMessage::new(TestMessageLevel::Error, "crashed"))
        .expect("message handled");
    logger
        .on_message(&TestRunMessage::new(TestMessageLevel::Unknown, "dropped"))
        .expect("message handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    assert_eq!(
        finish(logger),
        indoc! {"
            ##teamcity[testSuiteStarted name='VSTest']
            ##teamcity[message text='Starting test execution' status='NORMAL']
            ##teamcity[message text='slow' status='WARNING']
            ##teamcity[message text='crashed' status='ERROR']
            ##teamcity[testSuiteFinished name='VSTest']
        "}
    );
}

#[test]
fn unknown_level_still_opens_run() {
    let mut logger = new_logger();
    logger
        .on_message(&TestRunMessage::new(TestMessageLevel::Unknown, "dropped"))
        .expect("message handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    assert_eq!(
        finish(logger),
        indoc! {"
            ##teamcity[testSuiteStarted name='VSTest']
            ##teamcity[testSuiteFinished name='VSTest']
        "}
    );
}

#[test]
fn failed_test_content_order() {
    let mut logger = new_logger();
    let mut result = TestResult::new(r"C:\src\Tests.dll", "Tests.Fails", TestOutcome::Failed);
    result
        .set_error_message("E")
        .set_error_stack_trace("S")
        .add_message("StdOutMsgs", "first")
        .add_message("StdErrMsgs", "to stderr")
        .add_message("STDOUTMSGS", "second")
        .add_message("DebugTrace", "trace")
        .set_duration(millis(1500));
    logger.on_result(&result).expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    assert_eq!(
        finish(logger),
        indoc! {"
            ##teamcity[testSuiteStarted name='VSTest']
            ##teamcity[testSuiteStarted name='Tests.dll']
            ##teamcity[testStarted name='Tests.Fails' captureStandardOutput='false']
            ##teamcity[testFailed name='Tests.Fails' message='E' details='S']
            ##teamcity[testStdOut name='Tests.Fails' out='first']
            ##teamcity[testStdOut name='Tests.Fails' out='second']
            ##teamcity[testFinished name='Tests.Fails' duration='1500']
            ##teamcity[testSuiteFinished name='Tests.dll']
            ##teamcity[testSuiteFinished name='VSTest']
        "}
    );
}

#[test]
fn skipped_test_is_ignored() {
    let mut logger = new_logger();
    let mut result = TestResult::new("a.dll", "T1", TestOutcome::Skipped);
    result.set_error_message("[Fact(Skip = \"flaky\")]");
    logger.on_result(&result).expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let messages = parse_output(&finish(logger));
    let ignored = messages
        .iter()
        .find(|message| message.name() == "testIgnored")
        .expect("testIgnored is written");
    assert_eq!(ignored.attribute("name"), Some("T1"));
    assert_eq!(ignored.attribute("message"), Some("[Fact(Skip = \"flaky\")]"));
}

#[test]
fn translation_error_does_not_affect_next_result() {
    let mut logger = new_logger();
    logger
        .on_result(&passed("a.dll", "T1"))
        .expect("result handled");
    logger
        .on_result(&passed("a.dll", ""))
        .expect("translation errors are recovered");
    logger
        .on_result(&passed("build/", "T2"))
        .expect("translation errors are recovered");
    logger
        .on_result(&passed("a.dll", "T3"))
        .expect("result handled");
    logger
        .on_result(&passed("b.dll", "T4"))
        .expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    assert_eq!(
        finish(logger),
        indoc! {"
            ##teamcity[testSuiteStarted name='VSTest']
            ##teamcity[testSuiteStarted name='a.dll']
            ##teamcity[testStarted name='T1' captureStandardOutput='false']
            ##teamcity[testFinished name='T1' duration='0']
            ##teamcity[message text='TeamCity Logger Error' errorDetails='test result from `a.dll` has an empty name' status='ERROR']
            ##teamcity[message text='TeamCity Logger Error' errorDetails='test `T2` has no assembly name in source `build/`' status='ERROR']
            ##teamcity[testStarted name='T3' captureStandardOutput='false']
            ##teamcity[testFinished name='T3' duration='0']
            ##teamcity[testSuiteFinished name='a.dll']
            ##teamcity[testSuiteStarted name='b.dll']
            ##teamcity[testStarted name='T4' captureStandardOutput='false']
            ##teamcity[testFinished name='T4' duration='0']
            ##teamcity[testSuiteFinished name='b.dll']
            ##teamcity[testSuiteFinished name='VSTest']
        "}
    );
}

#[test]
fn sink_failure_while_recording_keeps_hierarchy_closable() {
    let mut logger = TeamCityLogger::new(
        FlakySink::new("testFailed"),
        &LoggerConfig::default_config(),
    );
    let mut failed = TestResult::new("a.dll", "T1", TestOutcome::Failed);
    failed.set_error_message("boom");
    logger.on_result(&failed).expect("sink failure is recovered");
    logger
        .on_result(&passed("b.dll", "T2"))
        .expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let sink = logger.finish().expect("logger finishes");
    assert!(sink.failed, "the sink failure was hit");
    let output = String::from_utf8(sink.out).expect("output is UTF-8");
    // Every line is a complete service message.
    let messages = parse_output(&output);

    assert_eq!(
        block_outline(&messages),
        vec![
            "+suite VSTest",
            "+suite a.dll",
            "+test T1",
            "-test T1",
            "-suite a.dll",
            "+suite b.dll",
            "+test T2",
            "-test T2",
            "-suite b.dll",
            "-suite VSTest",
        ],
        "output:\n{output}"
    );
    assert!(
        messages.iter().all(|message| message.name() != "testFailed"),
        "output:\n{output}"
    );

    let errors: Vec<_> = messages
        .iter()
        .filter(|message| message.attribute("status") == Some("ERROR"))
        .collect();
    assert_eq!(errors.len(), 1, "output:\n{output}");
    assert_eq!(errors[0].attribute("text"), Some("TeamCity Logger Error"));
    assert!(
        errors[0]
            .attribute("errorDetails")
            .is_some_and(|details| details.contains("sink hiccup")),
        "output:\n{output}"
    );

    // The error is reported after the failed test block is closed and before the next assembly.
    let position = |name: &str, attr: &str| {
        messages
            .iter()
            .position(|message| message.name() == name && message.attribute("name") == Some(attr))
            .expect("message is present")
    };
    let error_position = messages
        .iter()
        .position(|message| message.attribute("status") == Some("ERROR"))
        .expect("error is present");
    assert!(position("testFinished", "T1") < error_position);
    assert!(error_position < position("testSuiteStarted", "b.dll"));
}

#[test]
fn protocol_violation_is_not_recovered() {
    let mut logger = new_logger();
    logger
        .on_result(&passed("a.dll", "T1"))
        .expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let error = logger
        .on_result(&passed("a.dll", "T2"))
        .expect_err("the run block is closed");
    assert!(
        matches!(&error, ProtocolError::RunNotOpen { assembly, state: "closed" } if assembly == "a.dll"),
        "unexpected error: {error:?}"
    );

    let messages = parse_output(&finish(logger));
    assert!(
        messages.iter().all(|message| message.name() != "message"),
        "protocol violations aren't reported in-band"
    );
}

#[test]
fn unfinished_run_is_closed_on_finish() {
    let mut logger = new_logger();
    logger
        .on_result(&passed("a.dll", "T1"))
        .expect("result handled");

    let messages = parse_output(&finish(logger));
    assert_eq!(
        block_outline(&messages),
        vec![
            "+suite VSTest",
            "+suite a.dll",
            "+test T1",
            "-test T1",
            "-suite a.dll",
            "-suite VSTest",
        ]
    );
}

#[test]
fn event_stream_end_to_end() {
    let input = indoc! {r#"
        {"type":"message","level":"informational","text":"Test run for a.dll"}
        {"type":"result","source":"/work/bin/a.dll","fully-qualified-name":"Ns.Passes","outcome":"passed","duration":"12ms","messages":[{"category":"StdOutMsgs","text":"it's [done]"}]}
        {"type":"result","source":"/work/bin/a.dll"}
        {"type":"result","source":"/work/bin/a.dll","fully-qualified-name":"Ns.Skipped","outcome":"skipped","error-message":"later"}
        {"type":"run-complete","statistics":{"executed":2,"passed":1,"skipped":1}}
    "#};

    let mut config = LoggerConfig::default_config();
    config.set_flow_id("42");
    let mut logger = TeamCityLogger::new(Vec::new(), &config);

    for event in EventReader::new(input.as_bytes()) {
        match event {
            Ok(event) => logger.handle_event(&event).expect("event handled"),
            Err(error) => {
                assert!(error.is_recoverable(), "unexpected error: {error}");
                logger.report_error(&error);
            }
        }
    }

    let output = finish(logger);
    let messages = parse_output(&output);
    for message in &messages {
        assert_eq!(message.attribute("flowId"), Some("42"), "{message}");
    }

    let std_out = messages
        .iter()
        .find(|message| message.name() == "testStdOut")
        .expect("testStdOut is written");
    assert_eq!(std_out.attribute("out"), Some("it's [done]"));

    let error = messages
        .iter()
        .find(|message| message.name() == "message" && message.attribute("status") == Some("ERROR"))
        .expect("read error is reported");
    assert_eq!(error.attribute("text"), Some("TeamCity Logger Error"));
    assert!(
        error
            .attribute("errorDetails")
            .is_some_and(|details| details.starts_with("invalid event at line 3")),
        "unexpected error: {error}"
    );

    assert_eq!(
        block_outline(&messages),
        vec![
            "+suite VSTest",
            "+suite a.dll",
            "+test Ns.Passes",
            "-test Ns.Passes",
            "+test Ns.Skipped",
            "-test Ns.Skipped",
            "-suite a.dll",
            "-suite VSTest",
        ]
    );
}

#[test]
fn configured_report_names() {
    let config = LoggerConfig::from_toml_str(indoc! {r#"
        [report]
        root-suite = "Unit Tests"
        stdout-category = "Output"
        error-title = "Logger failure"
    "#})
    .expect("config is valid");
    let mut logger = TeamCityLogger::new(Vec::new(), &config);

    let mut result = passed("a.dll", "T1");
    result
        .add_message("StdOutMsgs", "dropped")
        .add_message("output", "kept");
    logger.on_result(&result).expect("result handled");
    logger
        .on_result(&passed("", "T2"))
        .expect("translation errors are recovered");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let messages = parse_output(&finish(logger));
    assert_eq!(messages[0].attribute("name"), Some("Unit Tests"));
    let outputs: Vec<_> = messages
        .iter()
        .filter(|message| message.name() == "testStdOut")
        .filter_map(|message| message.attribute("out"))
        .collect();
    assert_eq!(outputs, vec!["kept"]);
    assert!(
        messages
            .iter()
            .any(|message| message.attribute("text") == Some("Logger failure")),
        "configured error title is used"
    );
}

#[test]
fn translate_error_classification() {
    let mut logger = new_logger();
    logger
        .on_result(&passed("a.dll", "T1"))
        .expect("result handled");
    logger
        .on_run_complete(&run_complete())
        .expect("run completes");

    let error = logger
        .handle_event(&teamcity_logger::events::LoggerEvent::Result(passed(
            "b.dll", "T2",
        )))
        .expect_err("the run block is closed");
    assert!(
        matches!(error, TranslateError::Protocol(ProtocolError::RunNotOpen { .. })),
        "unexpected error: {error:?}"
    );
}
