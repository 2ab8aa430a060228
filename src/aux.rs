//! C3 (Process-Tree Killer) and C6 (Background Launcher).
//!
//! Both operations are short, bounded writes to a single long-lived
//! auxiliary shell (spec §3, §4.3, §4.6), so they live together here behind
//! one `AuxShell` wrapper. The pool's state lock (held by the caller, see
//! `pool.rs`) serializes every use of it — this module itself does no
//! locking.

use crate::error::Error;
use crate::shell::Shell;

/// Shell function, installed once at auxiliary-shell startup, that prints a
/// PID and every transitive descendant via `pgrep -P`.
const ALLKIDS_DEF: &str = r#"allkids() { local p="$1"; echo "$p"; for c in $(pgrep -P "$p" 2>/dev/null); do allkids "$c"; done; }"#;

/// The single long-lived shell used for process-tree kills and background
/// launches.
pub struct AuxShell {
    shell: Shell,
}

impl AuxShell {
    /// Spawn the auxiliary shell and install `allkids`. Called at most once,
    /// from `Pool::start`'s first invocation (spec §3 "Lifecycle").
    pub fn spawn() -> Result<Self, Error> {
        let mut shell = Shell::spawn()?;
        shell
            .write_line(ALLKIDS_DEF)
            .map_err(|_| Error::AuxDead)?;
        Ok(Self { shell })
    }

    fn require_alive(&mut self) -> Result<(), Error> {
        if self.shell.alive() {
            Ok(())
        } else {
            Err(Error::AuxDead)
        }
    }

    /// C3: recursively SIGKILL `pid` and every descendant. Best-effort — no
    /// confirmation of termination is attempted; the caller's recovery
    /// drain (engine §4.5e) is what actually observes the outcome.
    pub fn kill_tree(&mut self, pid: u32) -> Result<(), Error> {
        self.require_alive()?;
        self.shell
            .write_line(&format!("kill -9 $(allkids {pid}) 2>/dev/null"))
            .map_err(|_| Error::AuxDead)
    }

    /// C6: submit `cmd` as a detached background job. No output is
    /// captured, no PID returned, no status surfaced (spec §4.6).
    pub fn run_background(&mut self, cmd: &str) -> Result<(), Error> {
        self.require_alive()?;
        self.shell
            .write_line(&format!("({cmd}) &"))
            .map_err(|_| Error::AuxDead)
    }
}
