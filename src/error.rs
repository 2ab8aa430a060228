//! Error taxonomy for the shell pool.
//!
//! Mirrors the kinds in spec §7 exactly so a host can match on them instead
//! of parsing messages. Hand-rolled `Display` + `impl std::error::Error`,
//! matching the style of `WorktrunkError` in the teacher crate rather than a
//! `thiserror` derive.

use std::fmt;
use std::io;

/// Everything that can go wrong running a command through the pool.
#[derive(Debug)]
pub enum Error {
    /// No candidate bash binary exists on any of the searched paths.
    ShellNotFound,
    /// The OS refused to spawn a shell process.
    SpawnFailed(io::Error),
    /// `start(n)` was called with `n >= MAX_SHELLS`.
    Insane { requested: usize, max: usize },
    /// The `ping` round-trip used to validate a checked-out runner mismatched.
    RunnerCorrupted,
    /// A runner emitted `DEATH_LINE`, signalling it took a fatal signal.
    RunnerDied,
    /// A line appeared outside the control grammar the framing protocol defines.
    ProtocolViolation(String),
    /// The auxiliary shell is not alive when an operation needed it.
    AuxDead,
    /// Both stdout and stderr sentinels were not observed after the normal path.
    Incomplete,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShellNotFound => write!(
                f,
                "no bash-compatible shell found (searched /bin/bash, /usr/bin/bash, /usr/local/bin/bash)"
            ),
            Error::SpawnFailed(e) => write!(f, "failed to spawn shell: {e}"),
            Error::Insane { requested, max } => write!(
                f,
                "refusing to start {requested} runners (MAX_SHELLS is {max})"
            ),
            Error::RunnerCorrupted => {
                write!(f, "runner failed ping round-trip; likely residue from a prior command")
            }
            Error::RunnerDied => write!(f, "runner shell died unexpectedly (DEATH_LINE observed)"),
            Error::ProtocolViolation(line) => {
                write!(f, "protocol violation: unexpected line {line:?}")
            }
            Error::AuxDead => write!(f, "auxiliary shell is not alive"),
            Error::Incomplete => write!(f, "command did not reach both sentinels"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SpawnFailed(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
