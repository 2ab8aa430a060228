//! C2 — Framing Protocol.
//!
//! Builds the driver script written to a runner's stdin (spec §4.2) and
//! classifies the lines that come back out of it. The wire format is fixed
//! by spec §6 — bit-exact constants, one-line-per-event, control lines bear
//! no `+`/`-` prefix so a raw user line that happens to look like a control
//! line is routed to the callback instead of being misparsed (the
//! disambiguation rule in §4.2).

use std::path::Path;

pub const EXIT_LINE: &str = "SHELLPOOL_EXIT";
pub const STATUS_LINE: &str = "SHELLPOOL_STATUS";
pub const PID_LINE: &str = "SHELLPOOL_PID";
pub const DEATH_LINE: &str = "SHELLPOOL_UNEXPECTED_DEATH";

/// The `trap` line sent once, immediately after a runner shell is spawned,
/// so its own unexpected death becomes observable on both streams (§4.1).
pub fn death_trap_line() -> String {
    format!(
        "trap 'echo {DEATH_LINE}; echo {DEATH_LINE} 1>&2; exit 1' HUP INT TERM"
    )
}

/// The driver script for one invocation of `cmd`, already written to the
/// temp file at `script_path`. See §4.2 for the construction rationale;
/// this is a direct transcription of the seven numbered steps there.
pub fn driver_script(script_path: &Path) -> String {
    let f = shell_quote(&script_path.display().to_string());
    format!(
        "set -o pipefail\n\
         __sp_stdout_prefix() {{ while IFS= read -r __sp_l || [ -n \"$__sp_l\" ]; do printf '+%s\\n' \"$__sp_l\"; done; }}\n\
         __sp_stderr_prefix() {{ while IFS= read -r __sp_l || [ -n \"$__sp_l\" ]; do printf -- '-%s\\n' \"$__sp_l\"; done; }}\n\
         ( ( bash {f} </dev/null | __sp_stdout_prefix ) 3>&1 1>&2 2>&3 | __sp_stderr_prefix ) 2>&1 &\n\
         __sp_pid=$!\n\
         echo \"{PID_LINE} $__sp_pid\" 1>&2\n\
         wait \"$__sp_pid\"\n\
         __sp_status=$?\n\
         printf '\\n{STATUS_LINE} %d\\n' \"$__sp_status\"\n\
         echo {EXIT_LINE}\n\
         echo {EXIT_LINE} 1>&2\n"
    )
}

/// The contents of the temp script `F`: the user's command, preceded by a
/// trap that kills the whole process group on interrupt so descendants die
/// together with it.
pub fn user_script(cmd: &str) -> String {
    format!("trap 'kill -- -$BASHPID' INT TERM\n{cmd}\n")
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// What a line read from the runner's stdout stream means.
#[derive(Debug, PartialEq, Eq)]
pub enum StdoutEvent {
    Ignore,
    Stdout(String),
    Stderr(String),
    Status(i32),
    Death,
    Exit,
    Violation(String),
}

pub fn classify_stdout(line: &str) -> StdoutEvent {
    if line.is_empty() {
        StdoutEvent::Ignore
    } else if let Some(rest) = line.strip_prefix('+') {
        StdoutEvent::Stdout(rest.to_string())
    } else if let Some(rest) = line.strip_prefix('-') {
        StdoutEvent::Stderr(rest.to_string())
    } else if let Some(rest) = line.strip_prefix(STATUS_LINE).and_then(|r| r.strip_prefix(' ')) {
        match rest.trim().parse::<i32>() {
            Ok(n) => StdoutEvent::Status(n),
            Err(_) => StdoutEvent::Violation(line.to_string()),
        }
    } else if line == DEATH_LINE {
        StdoutEvent::Death
    } else if line == EXIT_LINE {
        StdoutEvent::Exit
    } else {
        StdoutEvent::Violation(line.to_string())
    }
}

/// What a line read from the runner's stderr stream means, once the PID
/// line has already been consumed outside this loop (§4.2).
#[derive(Debug, PartialEq, Eq)]
pub enum StderrEvent {
    Ignore,
    Death,
    Exit,
    Violation(String),
}

pub fn classify_stderr(line: &str) -> StderrEvent {
    if line.is_empty() {
        StderrEvent::Ignore
    } else if line == DEATH_LINE {
        StderrEvent::Death
    } else if line == EXIT_LINE {
        StderrEvent::Exit
    } else {
        StderrEvent::Violation(line.to_string())
    }
}

/// Parse a `PID_LINE <p>` line, returning the PID. Any other content is a
/// protocol violation (§4.5 step 2c).
pub fn parse_pid_line(line: &str) -> Option<u32> {
    line.strip_prefix(PID_LINE)
        .and_then(|r| r.strip_prefix(' '))
        .and_then(|r| r.trim().parse().ok())
}
