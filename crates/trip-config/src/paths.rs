//! Where configuration files live.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("", "", "trip"),
        }
    }

    /// `~/.config/trip/config.toml` on Linux.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        let dirs = self.project_dirs.as_ref().ok_or_else(|| {
            ConfigError::XdgError("no home directory to look for config.toml in".to_string())
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Project config file (trip.toml)
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("trip.toml")
    }

    /// Local overrides (trip.local.toml, gitignored)
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("trip.local.toml")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
