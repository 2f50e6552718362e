//! Layered loading: defaults, user file, project files, `--config`, environment.

use crate::{Paths, TripConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "TRIP";

pub struct ConfigLoader {
    project_dir: PathBuf,
    extra_file: Option<PathBuf>,
    env_source: Option<HashMap<String, String>>,
    user_config: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            extra_file: None,
            env_source: None,
            user_config: true,
        }
    }

    /// Where `trip.toml` and `trip.local.toml` are looked up.
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Merge an explicitly named file after the local config. Unlike the
    /// discovered files it must exist.
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.extra_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Skip `~/.config/trip/config.toml`.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Files to merge, lowest precedence first, each with whether it must exist.
    fn files(&self) -> Vec<(PathBuf, bool)> {
        let mut files = Vec::new();
        if self.user_config {
            if let Ok(user) = Paths::new().user_config_file() {
                files.push((user, false));
            }
        }
        files.push((Paths::project_config_file(&self.project_dir), false));
        files.push((Paths::local_config_file(&self.project_dir), false));
        if let Some(extra) = &self.extra_file {
            files.push((extra.clone(), true));
        }
        files
    }

    /// Merges defaults, the config files and `TRIP_*` variables, then
    /// resolves relative paths and validates the result.
    pub fn load(self) -> Result<TripConfig> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&TripConfig::default())?);

        for (path, required) in self.files() {
            if required || path.exists() {
                builder = builder.add_source(
                    config::File::from(path)
                        .required(required)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // TRIP_PRELOAD__LIBRARY, TRIP_FAULTS__DEFAULT_CHANCE, ...
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_source.clone()),
        );

        let mut merged: TripConfig = builder
            .build()
            .and_then(|merged| merged.try_deserialize())
            .context("Failed to read trip configuration")?;
        merged.resolve_paths(&self.project_dir);
        merged.validate()?;
        Ok(merged)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
