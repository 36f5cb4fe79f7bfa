// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for the logger.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use teamcity_messages::WriterOptions;

/// Overall configuration for the logger.
///
/// The built-in [default config](Self::DEFAULT_CONFIG) is always loaded first, and a user config
/// file is layered on top of it.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LoggerConfig {
    registration: Registration,
    report: ReportConfig,
    writer: WriterConfig,
}

impl LoggerConfig {
    /// The default location of the config within a directory.
    pub const CONFIG_PATH: &'static str = ".config/vstest-teamcity.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from
    /// [`CONFIG_PATH`](Self::CONFIG_PATH) within `dir`.
    ///
    /// A missing file at the default location is not an error; a missing file that was asked for
    /// explicitly is.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Parses a config from a TOML string, layered on top of the default config.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigParseError> {
        let builder =
            Self::make_default_config().add_source(File::from_str(contents, FileFormat::Toml));
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(Utf8PathBuf::from("<string>"), kind))
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");
        config
            .try_deserialize()
            .expect("default config is always valid")
    }

    /// Returns the registration metadata hosts use to discover the logger.
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Returns the report settings.
    pub fn report(&self) -> &ReportConfig {
        &self.report
    }

    /// Returns the options for the service message writer.
    pub fn writer_options(&self) -> WriterOptions {
        let mut options = WriterOptions::new();
        if let Some(flow_id) = &self.writer.flow_id {
            options.set_flow_id(flow_id);
        }
        options.set_timestamps(self.writer.timestamps);
        options
    }

    /// Overrides the flow ID from the config.
    pub fn set_flow_id(&mut self, flow_id: impl Into<String>) -> &mut Self {
        self.writer.flow_id = Some(flow_id.into());
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))
    }
}

/// The name and URI a test host uses to discover the logger.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Registration {
    friendly_name: String,
    uri: String,
}

impl Registration {
    /// Returns the friendly name, e.g. `TeamCity`.
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Returns the extension URI, e.g. `logger://TeamCityLogger`.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Settings that control the shape of the report.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    root_suite: String,
    stdout_category: String,
    error_title: String,
}

impl ReportConfig {
    /// Returns the name of the suite that wraps the whole run.
    pub fn root_suite(&self) -> &str {
        &self.root_suite
    }

    /// Returns the output category that is reported as standard output.
    pub fn stdout_category(&self) -> &str {
        &self.stdout_category
    }

    /// Returns the text of the message reported when an event can't be translated.
    pub fn error_title(&self) -> &str {
        &self.error_title
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct WriterConfig {
    #[serde(default)]
    flow_id: Option<String>,
    #[serde(default)]
    timestamps: bool,
}
