//! C1 — Shell Adapter.
//!
//! Spawns a Bourne-Again-compatible shell as a subprocess with piped
//! stdin/stdout/stderr, and exposes line-oriented reads/writes over those
//! pipes. Mirrors `ShellConfig::get()` in the teacher's `shell_exec.rs`
//! (ordered candidate list, cached first match) but targets an interactive,
//! long-lived `bash` process rather than a one-shot `sh -c` invocation.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, ChildStderr, Command, Stdio};
use std::sync::OnceLock;

use crate::error::Error;

/// Ordered candidate paths for a Bourne-Again-compatible shell. First
/// existing path wins and is cached for the lifetime of the process.
const BASH_CANDIDATES: &[&str] = &["/bin/bash", "/usr/bin/bash", "/usr/local/bin/bash"];

static BASH_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

fn find_bash() -> Option<&'static Path> {
    BASH_PATH
        .get_or_init(|| {
            BASH_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
        })
        .as_deref()
}

/// A spawned shell process with its three standard streams wired up as
/// line-oriented readers/writers.
pub struct Shell {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

impl Shell {
    /// Locate a bash-compatible shell and spawn it with no arguments,
    /// reading its own commands from stdin.
    pub fn spawn() -> Result<Self, Error> {
        let bash = find_bash().ok_or(Error::ShellNotFound)?;

        let mut child = Command::new(bash)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::SpawnFailed)?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
        let stderr = BufReader::new(child.stderr.take().expect("piped stderr"));

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    /// Conservative liveness check: true unless the child has already been
    /// observed to exit via a non-blocking `try_wait`. The protocol still
    /// detects death independently via `DEATH_LINE` (spec §4.1), since a
    /// shell can die between this check and the next write.
    pub fn alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Write one line to the shell's stdin, appending `\n`, and flush.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    /// Write a pre-formatted multi-line block verbatim (already
    /// newline-terminated) and flush. Used for the driver script, which is
    /// built as one string rather than line by line.
    pub fn write_block(&mut self, block: &str) -> io::Result<()> {
        self.stdin.write_all(block.as_bytes())?;
        self.stdin.flush()
    }

    /// Read one line from stdout, without the trailing newline. `Ok(None)`
    /// on EOF.
    pub fn read_stdout_line(&mut self) -> io::Result<Option<String>> {
        read_line(&mut self.stdout)
    }

    /// Read one line from stderr, without the trailing newline. `Ok(None)`
    /// on EOF.
    pub fn read_stderr_line(&mut self) -> io::Result<Option<String>> {
        read_line(&mut self.stderr)
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let n = reader.read_line(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}
