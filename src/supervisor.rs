//! Single child lifecycle: spawn aria2c with inherited stdio, absorb console
//! interrupts, relay termination signals, and report its exit status.

use std::convert::Infallible;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::binary::LaunchRequest;
use crate::error::LaunchError;
use crate::platform::{ConsoleSignal, SignalRoute, TerminationSignal};
use crate::signals;

/// Lifecycle of the supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    Spawning,
    Running,
    Terminated(i32),
    FailedToStart,
}

impl SupervisorState {
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (NotStarted, Spawning)
                | (Spawning, Running)
                | (Spawning, FailedToStart)
                | (Running, Running)
                | (Running, Terminated(_))
        )
    }
}

/// What woke the wait loop.
#[derive(Debug)]
enum WaitOutcome {
    Exited(ExitStatus),
    /// A console signal; the child got it from the OS already.
    Interrupted(ConsoleSignal),
    /// A termination signal aimed at the launcher that must be relayed.
    Forward(TerminationSignal),
    Error(std::io::Error),
}

/// Result of a completed supervision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Exit code to hand back to the caller.
    pub exit_code: i32,
    /// Child PID (for logging/diagnostics).
    pub pid: u32,
    /// Console interrupts absorbed while waiting.
    pub interrupts: u32,
    /// Termination signals relayed to the child.
    pub forwarded: u32,
}

pub struct Supervisor {
    route: SignalRoute,
    state: SupervisorState,
    interrupts: u32,
    forwarded: u32,
}

impl Supervisor {
    pub fn new(route: SignalRoute) -> Self {
        Self {
            route,
            state: SupervisorState::NotStarted,
            interrupts: 0,
            forwarded: 0,
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "supervisor state change");
        self.state = next;
    }

    /// Run the child to completion and return its exit code.
    ///
    /// Takes `self` by value: one supervisor owns exactly one child.
    pub async fn supervise(
        mut self,
        request: &LaunchRequest,
    ) -> Result<SupervisorReport, LaunchError> {
        let mut console = signals::install_console(&self.route)?;

        self.transition(SupervisorState::Spawning);
        info!(
            executable = %request.executable.display(),
            args = ?request.args,
            launcher_pid = std::process::id(),
            "launching aria2c"
        );
        let spawned = Command::new(&request.executable)
            .args(&request.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.transition(SupervisorState::FailedToStart);
                return Err(LaunchError::Spawn {
                    path: request.executable.clone(),
                    source: e,
                });
            }
        };

        // Only None once the child has been waited on.
        let pid = child.id().unwrap_or(0);
        self.transition(SupervisorState::Running);

        let mut termination = signals::install_termination(&self.route);
        info!(pid, forwarding = termination.len(), "aria2c started");

        let status = loop {
            // Child exit wins ties so nothing is relayed after it has been reaped.
            let outcome = tokio::select! {
                biased;
                res = child.wait() => match res {
                    Ok(status) => WaitOutcome::Exited(status),
                    Err(e) => WaitOutcome::Error(e),
                },
                sig = console.recv() => WaitOutcome::Interrupted(sig),
                sig = termination.recv() => WaitOutcome::Forward(sig),
            };

            match outcome {
                WaitOutcome::Exited(status) => break status,
                WaitOutcome::Interrupted(sig) => {
                    self.interrupts += 1;
                    self.transition(SupervisorState::Running);
                    info!(
                        signal = sig.name(),
                        count = self.interrupts,
                        "interrupt received, waiting for aria2c to shut down"
                    );
                }
                WaitOutcome::Forward(sig) => self.forward(pid, sig),
                WaitOutcome::Error(e) => {
                    warn!(pid, error = %e, "waiting on aria2c failed");
                    return Err(LaunchError::Wait { pid, source: e });
                }
            }
        };

        let exit_code = exit_code(status);
        self.transition(SupervisorState::Terminated(exit_code));
        info!(
            pid,
            exit_code,
            interrupts = self.interrupts,
            forwarded = self.forwarded,
            "aria2c exited"
        );

        Ok(SupervisorReport {
            exit_code,
            pid,
            interrupts: self.interrupts,
            forwarded: self.forwarded,
        })
    }

    #[cfg(unix)]
    fn forward(&mut self, pid: u32, sig: TerminationSignal) {
        match signals::forward_to_child(pid, sig) {
            Ok(signals::Delivery::Delivered) => {
                self.forwarded += 1;
                info!(pid, signal = sig.name(), "forwarded signal to aria2c");
            }
            Ok(signals::Delivery::ChildGone) => {
                debug!(pid, signal = sig.name(), "aria2c already gone, signal dropped");
            }
            Err(e) => {
                warn!(pid, signal = sig.name(), error = %e, "failed to forward signal");
            }
        }
    }

    #[cfg(not(unix))]
    fn forward(&mut self, pid: u32, sig: TerminationSignal) {
        warn!(pid, signal = sig.name(), "signal forwarding unsupported on this platform");
    }
}

/// Exit code the launcher reports for a child status.
///
/// A child killed by signal `n` maps to `128 + n`, as a shell would report it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

/// Supervise `request` and terminate the process with the child's exit code.
///
/// Returns only on a startup or wait failure.
pub async fn run(route: SignalRoute, request: LaunchRequest) -> Result<Infallible, LaunchError> {
    let report = Supervisor::new(route).supervise(&request).await?;
    debug!(
        pid = report.pid,
        exit_code = report.exit_code,
        "exiting with aria2c's status"
    );
    std::process::exit(report.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_allows_happy_path() {
        use SupervisorState::*;
        assert!(NotStarted.can_transition_to(Spawning));
        assert!(Spawning.can_transition_to(Running));
        assert!(Running.can_transition_to(Running));
        assert!(Running.can_transition_to(Terminated(0)));
        assert!(Spawning.can_transition_to(FailedToStart));
    }

    #[test]
    fn test_state_machine_rejects_shortcuts() {
        use SupervisorState::*;
        assert!(!NotStarted.can_transition_to(Running));
        assert!(!Spawning.can_transition_to(Terminated(0)));
        assert!(!Terminated(0).can_transition_to(Running));
        assert!(!FailedToStart.can_transition_to(Spawning));
        assert!(!Running.can_transition_to(FailedToStart));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use crate::platform::PlatformClass;
        use std::os::unix::process::ExitStatusExt;
        use std::path::PathBuf;

        fn route() -> SignalRoute {
            // No forwards: these tests share a process and must not react to
            // termination signals aimed at it.
            SignalRoute::resolve(PlatformClass::Posix, &[])
        }

        fn sh(script: &str) -> LaunchRequest {
            LaunchRequest::new(
                PathBuf::from("/bin/sh"),
                Some(vec!["-c".into(), script.into()]),
            )
            .unwrap()
        }

        #[test]
        fn test_exit_code_passes_normal_codes_through() {
            assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
            assert_eq!(exit_code(ExitStatus::from_raw(42 << 8)), 42);
        }

        #[test]
        fn test_exit_code_maps_signal_deaths() {
            assert_eq!(exit_code(ExitStatus::from_raw(15)), 143);
            assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        }

        #[tokio::test]
        async fn test_supervise_returns_child_exit_code() {
            let report = Supervisor::new(route())
                .supervise(&sh("exit 42"))
                .await
                .unwrap();
            assert_eq!(report.exit_code, 42);
            assert!(report.pid > 0);
            assert_eq!(report.interrupts, 0);
            assert_eq!(report.forwarded, 0);
        }

        #[tokio::test]
        async fn test_supervise_success() {
            let report = Supervisor::new(route())
                .supervise(&sh("true"))
                .await
                .unwrap();
            assert_eq!(report.exit_code, 0);
        }

        #[tokio::test]
        async fn test_supervise_child_killed_by_signal() {
            let report = Supervisor::new(route())
                .supervise(&sh("kill -9 $$"))
                .await
                .unwrap();
            assert_eq!(report.exit_code, 137);
        }

        #[tokio::test]
        async fn test_supervise_waits_for_slow_child() {
            let start = std::time::Instant::now();
            let report = Supervisor::new(route())
                .supervise(&sh("sleep 0.2; exit 3"))
                .await
                .unwrap();
            assert_eq!(report.exit_code, 3);
            assert!(start.elapsed().as_millis() >= 150);
        }

        #[tokio::test]
        async fn test_supervise_spawn_failure() {
            use std::os::unix::fs::PermissionsExt;
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("aria2c");
            // Executable bit set, but not a format the kernel can exec.
            std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let request = LaunchRequest::new(path, Some(vec![])).unwrap();
            let err = Supervisor::new(route())
                .supervise(&request)
                .await
                .unwrap_err();
            assert!(matches!(err, LaunchError::Spawn { .. }));
            assert!(err.to_string().contains("failed to spawn"));
        }
    }
}
