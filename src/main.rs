mod binary;
mod config;
mod error;
mod platform;
mod signals;
mod supervisor;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use binary::LaunchRequest;
use error::LaunchError;
use platform::{BuildTarget, PlatformClass, SignalRoute};

/// Launches the bundled aria2c, relays termination signals to it, and exits
/// with its exit code.
///
/// Every command-line argument belongs to aria2c, so launcher settings are read
/// from the environment only.
#[derive(Parser, Debug)]
#[command(
    name = "aria2c-launch",
    version,
    about,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct LauncherEnv {
    /// Path to the aria2c binary (overrides config and the bundled location)
    #[arg(long, env = "ARIA2C_BINARY")]
    binary: Option<PathBuf>,

    /// Config file path (default: aria2c-launch.toml next to the launcher)
    #[arg(long, env = "ARIA2C_LAUNCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. `info` or `aria2c_launch=debug`
    #[arg(long, env = "ARIA2C_LAUNCHER_LOG")]
    log: Option<String>,
}

impl LauncherEnv {
    fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(["aria2c-launch"])
    }
}

fn init_logging(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // stdout belongs to aria2c.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

async fn launch(env: LauncherEnv) -> Result<std::convert::Infallible, LaunchError> {
    let launcher_dir = binary::launcher_dir()?;
    let loaded = config::load_config(env.config.as_deref(), &launcher_dir)?;

    init_logging(
        env.log
            .as_deref()
            .unwrap_or(loaded.config.logging.filter.as_str()),
    );
    tracing::debug!(?env, config = ?loaded.source, "launcher settings");

    let class = PlatformClass::current();
    let executable = binary::resolve_executable(
        env.binary.as_deref(),
        &loaded.config.binary,
        &loaded.base_dir,
        &launcher_dir,
        class,
    );
    let request = LaunchRequest::new(executable, None)?;
    let route = SignalRoute::resolve(class, &loaded.config.signals.forward);

    supervisor::run(route, request).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let env = match LauncherEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("aria2c-launch: invalid launcher environment: {e}");
            return ExitCode::FAILURE;
        }
    };

    match launch(env).await {
        Ok(never) => match never {},
        Err(e) => {
            tracing::debug!(error = ?e, "launch failed");
            eprintln!("aria2c-launch: {e}");
            if e.is_provisioning() {
                if let Some(target) = BuildTarget::current() {
                    eprintln!(
                        "aria2c-launch: expected the {} static build of aria2c",
                        target.aria2_build
                    );
                }
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_launcher_env_definition_is_valid() {
        LauncherEnv::command().debug_assert();
    }

    #[test]
    fn test_launcher_env_flags_map_to_fields() {
        let env = LauncherEnv::try_parse_from([
            "aria2c-launch",
            "--binary",
            "/opt/aria2/aria2c",
            "--log",
            "debug",
        ])
        .unwrap();
        assert_eq!(env.binary, Some(PathBuf::from("/opt/aria2/aria2c")));
        assert_eq!(env.log.as_deref(), Some("debug"));
    }
}
