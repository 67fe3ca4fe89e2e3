//! Configuration for streamguard.
//!
//! Extra patterns and the default context are loaded from a TOML file, with
//! environment overrides. Configured patterns extend the built-in tables and
//! never replace them.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::error::{
    ControlFlowClassifier, ControlFlowContext, Operation, PatternOverrides, PatternTables,
};

/// Prefix for environment overrides, e.g. `STREAMGUARD__CONTEXT__SHUTTING_DOWN=true`.
pub const ENV_PREFIX: &str = "STREAMGUARD";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),
}

/// Default context used when an input record carries none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ContextDefaults {
    #[serde(default)]
    pub stdin_stream_mode: bool,
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default)]
    pub shutting_down: bool,
    #[serde(default)]
    pub operation: Option<Operation>,
}

impl From<ContextDefaults> for ControlFlowContext {
    fn from(defaults: ContextDefaults) -> Self {
        ControlFlowContext {
            stdin_stream_mode: defaults.stdin_stream_mode,
            cancel_requested: defaults.cancel_requested,
            shutting_down: defaults.shutting_down,
            operation: defaults.operation,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamGuardConfig {
    #[serde(default)]
    pub cancellation: PatternOverrides,
    #[serde(default)]
    pub no_active_task: PatternOverrides,
    #[serde(default)]
    pub stream_teardown: PatternOverrides,
    #[serde(default)]
    pub context: ContextDefaults,
}

impl StreamGuardConfig {
    /// Load configuration from a TOML file.
    ///
    /// Values can be overridden with `STREAMGUARD__<SECTION>__<KEY>`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the path is not valid
    /// UTF-8, or the contents cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use streamguard::config::StreamGuardConfig;
    ///
    /// let config = StreamGuardConfig::load("streamguard.toml")?;
    /// let classifier = config.classifier();
    /// # Ok::<(), streamguard::config::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::with_name(path_str))
            .add_source(env_source())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load configuration from environment overrides alone.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder().add_source(env_source()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Returns true if no extra patterns are configured.
    pub fn uses_builtin_tables(&self) -> bool {
        self.cancellation.is_empty()
            && self.no_active_task.is_empty()
            && self.stream_teardown.is_empty()
    }

    /// Builds the pattern tables: built-in patterns plus configured extras.
    pub fn pattern_tables(&self) -> PatternTables {
        PatternTables::default().extend(
            &self.cancellation,
            &self.no_active_task,
            &self.stream_teardown,
        )
    }

    pub fn classifier(&self) -> ControlFlowClassifier {
        ControlFlowClassifier::with_tables(self.pattern_tables())
    }

    pub fn default_context(&self) -> ControlFlowContext {
        self.context.into()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cancellation.codes")
        .with_list_parse_key("cancellation.names")
        .with_list_parse_key("cancellation.messages")
        .with_list_parse_key("no_active_task.codes")
        .with_list_parse_key("no_active_task.names")
        .with_list_parse_key("no_active_task.messages")
        .with_list_parse_key("stream_teardown.codes")
        .with_list_parse_key("stream_teardown.names")
        .with_list_parse_key("stream_teardown.messages")
}
