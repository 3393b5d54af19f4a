//! Engine configuration module.
//!
//! This module provides configuration loading for the generation engine from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `GENERATE_CONTRIBUTION_BUFFER`: Capacity of each batch synchronizer's contribution channel (default: `64`)
//! - `GENERATE_ORDERED_ROUNDS`: Run round continuations one after another (default: `true`)
//! - `GENERATE_MAX_NESTING_DEPTH`: Maximum depth of nested pipeline calls (default: `16`)
//! - `GENERATE_SOURCE_DIRECTORY`: Base directory of the file source fetcher (default: `.`)
//!
//! # Invariants
//!
//! - `contribution_buffer` is always at least 1
//! - `source_directory` is a path (may not exist yet)

use std::path::PathBuf;

/// Engine configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()`, `contribution_buffer >= 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the bounded channel feeding each batch synchronizer.
    /// Producers wait when it is full.
    pub contribution_buffer: usize,
    /// When true, the continuation of round k+1 starts after the one of
    /// round k has resolved.
    pub ordered_rounds: bool,
    /// Nested calls deeper than this produce nothing.
    pub max_nesting_depth: usize,
    /// Directory that relative source locators resolve against.
    pub source_directory: PathBuf,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contribution_buffer: Self::DEFAULT_CONTRIBUTION_BUFFER,
            ordered_rounds: Self::DEFAULT_ORDERED_ROUNDS,
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
            source_directory: PathBuf::from(Self::DEFAULT_SOURCE_DIRECTORY),
        }
    }
}

impl EngineConfig {
    /// Default capacity of a contribution channel.
    pub const DEFAULT_CONTRIBUTION_BUFFER: usize = 64;
    /// Rounds are processed in completion order by default.
    pub const DEFAULT_ORDERED_ROUNDS: bool = true;
    /// Default nested call limit.
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;
    /// Default source directory.
    pub const DEFAULT_SOURCE_DIRECTORY: &'static str = ".";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value, or if
    /// `GENERATE_CONTRIBUTION_BUFFER` is 0.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let contribution_buffer = Self::load_contribution_buffer(&lookup)?;
        let ordered_rounds = Self::load_ordered_rounds(&lookup)?;
        let max_nesting_depth = Self::load_max_nesting_depth(&lookup)?;
        let source_directory = lookup("GENERATE_SOURCE_DIRECTORY")
            .map_or_else(|| PathBuf::from(Self::DEFAULT_SOURCE_DIRECTORY), PathBuf::from);

        Ok(Self {
            contribution_buffer,
            ordered_rounds,
            max_nesting_depth,
            source_directory,
        })
    }

    fn load_contribution_buffer(lookup: &impl Fn(&str) -> Option<String>) -> Result<usize, ConfigError> {
        const NAME: &str = "GENERATE_CONTRIBUTION_BUFFER";
        match lookup(NAME) {
            Some(value) => match value.parse::<usize>() {
                Ok(0) => Err(ConfigError::InvalidValue {
                    name: NAME.to_string(),
                    message: "must be at least 1".to_string(),
                }),
                Ok(n) => Ok(n),
                Err(_) => Err(ConfigError::InvalidValue {
                    name: NAME.to_string(),
                    message: format!("'{value}' is not a valid buffer size"),
                }),
            },
            None => Ok(Self::DEFAULT_CONTRIBUTION_BUFFER),
        }
    }

    fn load_ordered_rounds(lookup: &impl Fn(&str) -> Option<String>) -> Result<bool, ConfigError> {
        const NAME: &str = "GENERATE_ORDERED_ROUNDS";
        match lookup(NAME) {
            Some(value) => value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                name: NAME.to_string(),
                message: format!("'{value}' is not 'true' or 'false'"),
            }),
            None => Ok(Self::DEFAULT_ORDERED_ROUNDS),
        }
    }

    fn load_max_nesting_depth(lookup: &impl Fn(&str) -> Option<String>) -> Result<usize, ConfigError> {
        const NAME: &str = "GENERATE_MAX_NESTING_DEPTH";
        match lookup(NAME) {
            Some(value) => value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                name: NAME.to_string(),
                message: format!("'{value}' is not a valid depth"),
            }),
            None => Ok(Self::DEFAULT_MAX_NESTING_DEPTH),
        }
    }
}
