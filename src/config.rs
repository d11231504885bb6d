use crate::platform::TerminationSignal;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up next to the launcher executable.
pub const CONFIG_FILE_NAME: &str = "aria2c-launch.toml";

/// Top-level configuration loaded from aria2c-launch.toml.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    pub binary: BinaryConfig,
    pub logging: LoggingConfig,
    pub signals: SignalsConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinaryConfig {
    /// Explicit binary path. Relative paths resolve against the config file's directory.
    pub path: Option<PathBuf>,
    /// Directory holding the bundled binary, relative to the launcher executable.
    pub bin_dir: PathBuf,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalsConfig {
    /// Signals relayed to aria2c when sent to the launcher's pid.
    pub forward: Vec<TerminationSignal>,
}

// --- Default implementations ---

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            bin_dir: PathBuf::from("bin"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            forward: vec![TerminationSignal::Term],
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A loaded config together with the directory its relative paths are anchored to.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: LauncherConfig,
    pub base_dir: PathBuf,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl LauncherConfig {
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read and parse the file at `path`. A missing file is an error here.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents, path)
    }
}

/// Load the launcher config.
///
/// An explicitly requested file must exist. Otherwise `CONFIG_FILE_NAME` is
/// looked up in `launcher_dir` and defaults apply when it is absent.
pub fn load_config(
    explicit: Option<&Path>,
    launcher_dir: &Path,
) -> Result<LoadedConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (launcher_dir.join(CONFIG_FILE_NAME), false),
    };

    if !required && !path.is_file() {
        return Ok(LoadedConfig {
            config: LauncherConfig::default(),
            base_dir: launcher_dir.to_path_buf(),
            source: None,
        });
    }

    let config = LauncherConfig::load(&path)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(LoadedConfig {
        config,
        base_dir,
        source: Some(path),
    })
}
