//! Configuration management for trip
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI flags (highest precedence, applied by the caller)
//! 2. Environment variables (TRIP_* prefix, `__` between sections)
//! 3. A file named with `--config`
//! 4. trip.local.toml (gitignored, local overrides)
//! 5. trip.toml (project config)
//! 6. ~/.config/trip/config.toml (user defaults)
//! 7. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main trip configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    pub preload: PreloadConfig,
    pub faults: FaultsConfig,
    pub log: LogConfig,
}

/// Where to find the interposition object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Explicit path; when unset the object is looked up beside the `trip`
    /// executable under `library_name`.
    pub library: Option<PathBuf>,
    pub library_name: String,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            library: None,
            library_name: trip::relaunch::PRELOAD_LIBRARY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultsConfig {
    /// Chance used by rules that do not give one.
    pub default_chance: f64,
}

impl Default for FaultsConfig {
    fn default() -> Self {
        Self {
            default_chance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive for the bootstrap.
    pub filter: String,
    /// Turn on debug output inside the target as well.
    pub trace_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            trace_target: false,
        }
    }
}

impl TripConfig {
    /// Reject values no run could use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        trip::rule::validate_chance("faults.default_chance", self.faults.default_chance)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let name = &self.preload.library_name;
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "preload.library_name must be a bare file name, got \"{name}\""
            )));
        }

        if let Some(library) = &self.preload.library {
            if library.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "preload.library is empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if let Some(library) = &mut self.preload.library {
            if library.is_relative() {
                *library = base.join(&*library);
            }
        }
    }

    /// The effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TripConfig::default();
        assert_eq!(config.preload.library, None);
        assert_eq!(config.preload.library_name, "libtrip_preload.so");
        assert_eq!(config.faults.default_chance, 1.0);
        assert_eq!(config.log.filter, "warn");
        assert!(!config.log.trace_target);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_chance_is_validated() {
        for chance in [0.0, -1.0, 1.5, f64::NAN] {
            let mut config = TripConfig::default();
            config.faults.default_chance = chance;
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationError(_))),
                "{chance} accepted"
            );
        }
    }

    #[test]
    fn test_library_name_must_be_bare() {
        let mut config = TripConfig::default();
        config.preload.library_name = "lib/x.so".to_string();
        assert!(config.validate().is_err());
        config.preload.library_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = TripConfig::default();
        config.preload.library = Some(PathBuf::from("build/libtrip_preload.so"));
        config.resolve_paths("/home/user/project");

        assert_eq!(
            config.preload.library,
            Some(PathBuf::from("/home/user/project/build/libtrip_preload.so"))
        );
    }

    #[test]
    fn test_to_toml() {
        let rendered = TripConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[faults]"));
        assert!(rendered.contains("default_chance = 1.0"));
        assert!(rendered.contains("library_name = \"libtrip_preload.so\""));
    }
}
