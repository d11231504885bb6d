//! Platform tables: which signals count as console broadcasts, which may be
//! forwarded, and which aria2 static build belongs to this target.

use serde::Deserialize;

/// How the running OS delivers interrupts and termination requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformClass {
    /// Signals by number; `kill <pid>` targets one process.
    Posix,
    /// Console control events broadcast to every process attached to the console.
    Console,
}

impl PlatformClass {
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformClass::Console
        } else {
            PlatformClass::Posix
        }
    }

    /// Console signals for this platform class. All of them are absorbed the same way.
    pub fn console_signals(self) -> &'static [ConsoleSignal] {
        match self {
            PlatformClass::Posix => &[ConsoleSignal::Interrupt],
            PlatformClass::Console => &[ConsoleSignal::Interrupt, ConsoleSignal::Break],
        }
    }

    /// Whether explicit termination signals can be relayed to a child by pid.
    pub fn supports_forwarding(self) -> bool {
        self == PlatformClass::Posix
    }

    /// File name of the aria2c binary on this platform.
    pub fn binary_file_name(self) -> &'static str {
        match self {
            PlatformClass::Posix => "aria2c",
            PlatformClass::Console => "aria2c.exe",
        }
    }
}

/// A signal the OS broadcasts to the whole foreground process group or console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// Ctrl-Break.
    Break,
}

impl ConsoleSignal {
    pub fn name(self) -> &'static str {
        match self {
            ConsoleSignal::Interrupt => "SIGINT",
            ConsoleSignal::Break => "SIGBREAK",
        }
    }
}

/// A signal sent to the launcher's pid only, which the child never sees unless relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum TerminationSignal {
    Term,
    Hup,
    Quit,
    Usr1,
    Usr2,
}

impl TerminationSignal {
    pub const ALL: [TerminationSignal; 5] = [
        TerminationSignal::Term,
        TerminationSignal::Hup,
        TerminationSignal::Quit,
        TerminationSignal::Usr1,
        TerminationSignal::Usr2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TerminationSignal::Term => "SIGTERM",
            TerminationSignal::Hup => "SIGHUP",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Usr1 => "SIGUSR1",
            TerminationSignal::Usr2 => "SIGUSR2",
        }
    }

    /// Parse `SIGTERM`, `TERM` or `term`.
    pub fn parse(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let full = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{upper}")
        };
        Self::ALL.into_iter().find(|sig| sig.name() == full)
    }

    #[cfg(unix)]
    pub fn as_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;
        match self {
            TerminationSignal::Term => Signal::SIGTERM,
            TerminationSignal::Hup => Signal::SIGHUP,
            TerminationSignal::Quit => Signal::SIGQUIT,
            TerminationSignal::Usr1 => Signal::SIGUSR1,
            TerminationSignal::Usr2 => Signal::SIGUSR2,
        }
    }
}

impl TryFrom<String> for TerminationSignal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TerminationSignal::parse(&value).ok_or_else(|| {
            let supported: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
            format!(
                "unsupported signal '{value}', expected one of: {}",
                supported.join(", ")
            )
        })
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Signal handling plan, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRoute {
    pub console: &'static [ConsoleSignal],
    pub forward: Vec<TerminationSignal>,
}

impl SignalRoute {
    /// Build the route for `class`, dropping forwards the platform cannot perform.
    pub fn resolve(class: PlatformClass, requested: &[TerminationSignal]) -> Self {
        let mut forward = Vec::new();
        if class.supports_forwarding() {
            for sig in requested {
                if !forward.contains(sig) {
                    forward.push(*sig);
                }
            }
        } else if !requested.is_empty() {
            tracing::debug!(
                ?requested,
                "termination forwarding is unavailable on this platform, ignoring"
            );
        }
        Self {
            console: class.console_signals(),
            forward,
        }
    }
}

/// An aria2 static build and the platform it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTarget {
    /// Build identifier used by the static release archives.
    pub aria2_build: &'static str,
    pub arch: &'static str,
    pub os: &'static str,
}

pub const BUILD_TARGETS: [BuildTarget; 4] = [
    BuildTarget {
        aria2_build: "x86_64-linux-musl",
        arch: "x86_64",
        os: "linux",
    },
    BuildTarget {
        aria2_build: "aarch64-linux-musl",
        arch: "aarch64",
        os: "linux",
    },
    BuildTarget {
        aria2_build: "x86_64-w64-mingw32",
        arch: "x86_64",
        os: "windows",
    },
    BuildTarget {
        aria2_build: "i686-w64-mingw32",
        arch: "x86",
        os: "windows",
    },
];

impl BuildTarget {
    pub fn find(arch: &str, os: &str) -> Option<Self> {
        BUILD_TARGETS
            .into_iter()
            .find(|t| t.arch == arch && t.os == os)
    }

    /// The build matching the platform this launcher was compiled for, if any.
    pub fn current() -> Option<Self> {
        Self::find(std::env::consts::ARCH, std::env::consts::OS)
    }
}
