//! Configuration file lookup.
//!
//! Lookup order when no path is given on the command line:
//!
//! - `config.yaml` in the current working directory
//! - `config.yaml` next to the executable when a `.portable` marker exists there
//! - `config.yaml` in the platform config directory (`~/.config/TCI Surface GW`
//!   on Linux, `%APPDATA%\TCI Surface GW` on Windows)

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for the platform config directory
const APP_NAME: &str = "TCI Surface GW";

/// Default configuration file name
pub const CONFIG_FILE: &str = "config.yaml";

/// Where the configuration file was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    WorkingDirectory,
    Portable,
    Installed,
}

/// Resolved configuration path
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    pub source: ConfigSource,
}

impl AppPaths {
    /// Resolve the configuration file for this process
    pub fn detect(explicit: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        Self::resolve(explicit, &cwd, &exe_dir, dirs::config_dir())
    }

    fn resolve(
        explicit: Option<&Path>,
        cwd: &Path,
        exe_dir: &Path,
        config_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = explicit {
            return Self {
                config: path.to_path_buf(),
                source: ConfigSource::CommandLine,
            };
        }

        let cwd_config = cwd.join(CONFIG_FILE);
        if cwd_config.exists() {
            return Self {
                config: cwd_config,
                source: ConfigSource::WorkingDirectory,
            };
        }

        if exe_dir.join(".portable").exists() {
            return Self {
                config: exe_dir.join(CONFIG_FILE),
                source: ConfigSource::Portable,
            };
        }

        let base = config_dir.unwrap_or_else(|| {
            debug!("No platform config directory, using executable directory");
            exe_dir.to_path_buf()
        });
        Self {
            config: base.join(APP_NAME).join(CONFIG_FILE),
            source: ConfigSource::Installed,
        }
    }
}
