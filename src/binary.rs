//! Locating the aria2c binary and building the launch request.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::BinaryConfig;
use crate::error::LaunchError;
use crate::platform::PlatformClass;

/// What to run: a verified executable and the arguments passed to it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub executable: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchRequest {
    /// Build a request after checking that `executable` can be run.
    ///
    /// `args` of `None` means the launcher's own arguments, minus the program name.
    pub fn new(executable: PathBuf, args: Option<Vec<OsString>>) -> Result<Self, LaunchError> {
        verify_executable(&executable)?;
        let args = args.unwrap_or_else(|| std::env::args_os().skip(1).collect());
        Ok(Self { executable, args })
    }
}

/// Pick the binary path. Precedence: environment override, then `binary.path`
/// from the config (relative to `config_dir`), then `<launcher_dir>/<bin_dir>/aria2c`.
pub fn resolve_executable(
    env_override: Option<&Path>,
    binary: &BinaryConfig,
    config_dir: &Path,
    launcher_dir: &Path,
    class: PlatformClass,
) -> PathBuf {
    if let Some(path) = env_override {
        return path.to_path_buf();
    }
    if let Some(path) = &binary.path {
        return config_dir.join(path);
    }
    launcher_dir
        .join(&binary.bin_dir)
        .join(class.binary_file_name())
}

/// Directory containing the running launcher executable.
pub fn launcher_dir() -> Result<PathBuf, LaunchError> {
    let exe = std::env::current_exe().map_err(|e| LaunchError::LauncherLocation { source: e })?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn verify_executable(path: &Path) -> Result<(), LaunchError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => {
            return Err(LaunchError::MissingExecutable {
                path: path.to_path_buf(),
            })
        }
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(LaunchError::NotExecutable {
                path: path.to_path_buf(),
            });
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(())
}
