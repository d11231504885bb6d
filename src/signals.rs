//! Signal listeners for the supervisor.
//!
//! Console signals (Ctrl-C, Ctrl-Break) reach aria2c on their own because it
//! shares the launcher's process group/console, so they are only absorbed here.
//! Termination signals (`kill <launcher pid>`) target the launcher alone and are
//! relayed to the child by pid.

use std::future::poll_fn;
use std::task::{Context, Poll};

use crate::error::LaunchError;
use crate::platform::{ConsoleSignal, SignalRoute, TerminationSignal};

enum Listener {
    #[cfg(unix)]
    Unix(tokio::signal::unix::Signal),
    #[cfg(windows)]
    CtrlC(tokio::signal::windows::CtrlC),
    #[cfg(windows)]
    CtrlBreak(tokio::signal::windows::CtrlBreak),
}

impl Listener {
    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>> {
        match self {
            #[cfg(unix)]
            Listener::Unix(sig) => sig.poll_recv(cx),
            #[cfg(windows)]
            Listener::CtrlC(sig) => sig.poll_recv(cx),
            #[cfg(windows)]
            Listener::CtrlBreak(sig) => sig.poll_recv(cx),
        }
    }
}

/// A set of installed listeners, each tagged with the signal it reports.
///
/// Handlers stay installed for the life of the process once created.
pub struct SignalSet<S> {
    listeners: Vec<(S, Listener)>,
}

impl<S: Copy> SignalSet<S> {
    /// Wait for the next signal in the set. An empty set never resolves.
    pub async fn recv(&mut self) -> S {
        poll_fn(|cx| {
            for (tag, listener) in self.listeners.iter_mut() {
                if let Poll::Ready(Some(())) = listener.poll_recv(cx) {
                    return Poll::Ready(*tag);
                }
            }
            Poll::Pending
        })
        .await
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

fn install_console_listener(signal: ConsoleSignal) -> std::io::Result<Listener> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match signal {
            ConsoleSignal::Interrupt => unix_signal(SignalKind::interrupt()).map(Listener::Unix),
            ConsoleSignal::Break => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Ctrl-Break has no POSIX equivalent",
            )),
        }
    }
    #[cfg(windows)]
    {
        use tokio::signal::windows;
        match signal {
            ConsoleSignal::Interrupt => windows::ctrl_c().map(Listener::CtrlC),
            ConsoleSignal::Break => windows::ctrl_break().map(Listener::CtrlBreak),
        }
    }
}

/// Install handlers for every console signal in the route.
///
/// Once installed, a console signal no longer terminates the launcher; it only
/// wakes the wait loop. Failure is fatal because it happens before any spawn.
pub fn install_console(route: &SignalRoute) -> Result<SignalSet<ConsoleSignal>, LaunchError> {
    let mut listeners = Vec::with_capacity(route.console.len());
    for &signal in route.console {
        let listener =
            install_console_listener(signal).map_err(|e| LaunchError::SignalSetup {
                signal: signal.name(),
                source: e,
            })?;
        listeners.push((signal, listener));
    }
    Ok(SignalSet { listeners })
}

/// Install handlers for the termination signals to relay.
///
/// Called after the child exists, so a failure here is logged and that signal
/// keeps its default disposition instead of aborting supervision.
pub fn install_termination(route: &SignalRoute) -> SignalSet<TerminationSignal> {
    let mut listeners = Vec::new();
    #[cfg(unix)]
    for &signal in &route.forward {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};
        match unix_signal(SignalKind::from_raw(signal.as_nix() as i32)) {
            Ok(listener) => listeners.push((signal, Listener::Unix(listener))),
            Err(e) => tracing::warn!(
                signal = signal.name(),
                error = %e,
                "failed to install forwarding handler"
            ),
        }
    }
    #[cfg(not(unix))]
    if !route.forward.is_empty() {
        tracing::debug!(forward = ?route.forward, "no forwarding on this platform");
    }
    SignalSet { listeners }
}

/// Result of relaying a signal to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The child had already exited and been reaped.
    ChildGone,
}

/// Send `signal` to the child with the given pid.
///
/// A child that exited but was not yet reaped is a zombie and accepts the
/// signal as a no-op. `ESRCH` means it is fully gone.
#[cfg(unix)]
pub fn forward_to_child(
    pid: u32,
    signal: TerminationSignal,
) -> Result<Delivery, nix::errno::Errno> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // kill(0, ..) would address the launcher's own process group.
    if pid == 0 {
        return Err(Errno::EINVAL);
    }
    match kill(Pid::from_raw(pid as i32), signal.as_nix()) {
        Ok(()) => Ok(Delivery::Delivered),
        Err(Errno::ESRCH) => Ok(Delivery::ChildGone),
        Err(e) => Err(e),
    }
}
