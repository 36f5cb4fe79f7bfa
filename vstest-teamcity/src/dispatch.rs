// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::{Result, VstestTeamcityExitCode},
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
};
use teamcity_logger::{
    EventReader, TeamCityLogger, config::LoggerConfig, events::LoggerEvent,
};
use tracing::{debug, warn};

/// Reports test host events to TeamCity.
///
/// Reads a JSON-lines stream of test events (diagnostic messages, test results and a final
/// run-complete event) and writes them as nested TeamCity service messages.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct VstestTeamcityApp {
    /// Event stream to read [default: standard input]
    #[arg(long, short, value_name = "PATH")]
    input: Option<Utf8PathBuf>,

    /// File to write service messages to [default: standard output]
    #[arg(long, short, value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// Config file [default: .config/vstest-teamcity.toml in the current directory]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Add a flowId attribute with this value to every service message
    #[arg(long, value_name = "ID", env = "VSTEST_TEAMCITY_FLOW_ID")]
    flow_id: Option<String>,

    /// Print the logger's friendly name and URI, and exit
    #[arg(long)]
    show_registration: bool,

    #[command(flatten)]
    output_opts: OutputOpts,
}

impl VstestTeamcityApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output_opts.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, stdout: &mut dyn Write) -> Result<i32> {
        let cwd = std::env::current_dir()
            .map_err(|error| ExpectedError::CurrentDirFailed { error })?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|error| ExpectedError::CurrentDirInvalidUtf8 { error })?;
        let config = self.make_config(&cwd)?;

        if self.show_registration {
            let registration = config.registration();
            writeln!(stdout, "friendly-name: {}", registration.friendly_name())
                .and_then(|()| writeln!(stdout, "uri: {}", registration.uri()))
                .map_err(|error| ExpectedError::RegistrationWriteError { error })?;
            return Ok(VstestTeamcityExitCode::OK);
        }

        let input: Box<dyn BufRead> = match &self.input {
            Some(path) if path.as_str() != "-" => {
                let file = File::open(path).map_err(|error| ExpectedError::InputOpenError {
                    path: path.clone(),
                    error,
                })?;
                Box::new(BufReader::new(file))
            }
            _ => Box::new(io::stdin().lock()),
        };

        match &self.output {
            Some(path) => {
                let file = File::create(path).map_err(|error| ExpectedError::OutputCreateError {
                    path: path.clone(),
                    error,
                })?;
                translate_stream(&config, input, BufWriter::new(file))?;
            }
            None => {
                translate_stream(&config, input, stdout)?;
            }
        }

        Ok(VstestTeamcityExitCode::OK)
    }

    fn make_config(&self, cwd: &Utf8Path) -> Result<LoggerConfig> {
        let mut config = LoggerConfig::from_sources(cwd, self.config_file.as_deref())?;
        if let Some(flow_id) = &self.flow_id {
            config.set_flow_id(flow_id.clone());
        }
        debug!(?config, "loaded config");
        Ok(config)
    }
}

/// Translates every event in `input`, writing service messages to `out`.
///
/// Lines that aren't valid events are reported in-band and skipped. Returns the output once every
/// block is closed.
pub fn translate_stream<R: BufRead, W: Write>(
    config: &LoggerConfig,
    input: R,
    out: W,
) -> Result<W> {
    let mut logger = TeamCityLogger::new(out, config);
    let mut run_completed = false;

    for event in EventReader::new(input) {
        match event {
            Ok(event) => {
                logger
                    .handle_event(&event)
                    .map_err(|error| ExpectedError::TranslateError { error })?;
                if matches!(event, LoggerEvent::RunComplete(_)) {
                    run_completed = true;
                }
            }
            Err(error) if error.is_recoverable() => logger.report_error(&error),
            Err(error) => return Err(ExpectedError::ReadEventsError { error }),
        }
    }

    if !run_completed {
        warn!("event stream ended without a run-complete event");
    }
    logger
        .finish()
        .map_err(|error| ExpectedError::FinishError { error })
}
