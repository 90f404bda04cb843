//! Configuration management for `tailwatch.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   └── watch      # [watch]
//! ├── error          # ConfigError
//! ├── util           # Config file discovery
//! └── mod.rs         # Config (this file)
//! ```
//!
//! Every field has a default, so a missing config file is not an error
//! unless one was named explicitly. Command-line flags override file values.

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::WatchSectionConfig;

use util::find_config_file;

use crate::log;
use crate::watch::WatchMode;
use anyhow::Result;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, searched upward from the current directory.
pub const CONFIG_FILE: &str = "tailwatch.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing tailwatch.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Absolute path to the config file, if one was loaded (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// File watching settings
    #[serde(default)]
    pub watch: WatchSectionConfig,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<WatchMode>,
    pub poll_interval_ms: Option<u64>,
    pub verbose: Option<bool>,
}

impl Config {
    /// Load configuration.
    ///
    /// `explicit` is a path the user named; it must exist. Otherwise
    /// [`CONFIG_FILE`] is searched upward from cwd and defaults are used when
    /// none is found.
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let found = match explicit {
            Some(path) => {
                Some(find_config_file(path).ok_or_else(|| ConfigError::NotFound(path.into()))?)
            }
            None => find_config_file(Path::new(CONFIG_FILE)),
        };

        let mut config = match &found {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.config_path = found;

        config.apply_overrides(overrides);
        config.validate()?;
        crate::logger::set_verbose(config.watch.verbose);

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        log!("warning"; "unknown fields in {}:", path.display());
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        Self::update_option(&mut self.watch.mode, overrides.mode.as_ref());
        Self::update_option(
            &mut self.watch.poll_interval_ms,
            overrides.poll_interval_ms.as_ref(),
        );
        Self::update_option(&mut self.watch.verbose, overrides.verbose.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "[watch] poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a config snippet, asserting it has no unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    let (parsed, ignored) = Config::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
