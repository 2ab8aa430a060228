//! C5 — Execution Engine.
//!
//! `Pool::run` checks out a runner, drives the framing protocol (§4.2)
//! against it, delivers tagged lines to the caller's callback, and computes
//! the exit status — cleaning up the process tree and draining the runner
//! if the command was cut short (§4.5).

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tempfile::Builder;

use crate::config;
use crate::error::Error;
use crate::framing::{self, StderrEvent, StdoutEvent};
use crate::pool::{Pool, Runner};
use crate::trace;

/// Which stream a line delivered to the callback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Stdout,
    Stderr,
}

/// The default line callback offered to callers (spec §6): writes
/// stdout-kind lines to the host's stdout and stderr-kind lines to the
/// host's stderr, flushing after each so output interleaves with whatever
/// else the host prints.
pub fn default_line_callback(line: &str, kind: LineKind) {
    match kind {
        LineKind::Stdout => {
            let mut out = io::stdout();
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
        LineKind::Stderr => {
            let mut err = io::stderr();
            let _ = writeln!(err, "{line}");
            let _ = err.flush();
        }
    }
}

#[derive(Default)]
struct CancelState {
    pid: Option<u32>,
    cancel_requested: bool,
}

/// A handle another thread can use to abort an in-flight `run()` call
/// (spec §5 "Cancellation and timeouts").
///
/// Cloning shares the same underlying run: pass one half to the thread
/// calling `run`, keep the other to call `Pool::cancel` from elsewhere.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<Mutex<CancelState>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the PID once the engine learns it; returns true if a
    /// cancellation was already requested, meaning the caller should kill
    /// the tree immediately instead of waiting.
    fn register_pid(&self, pid: u32) -> bool {
        let mut state = self.0.lock().unwrap();
        state.pid = Some(pid);
        state.cancel_requested
    }
}

impl Pool {
    /// Execute `cmd` through a checked-out runner, delivering each line of
    /// output to `each_line` as it arrives, and returning the command's
    /// exit status.
    pub fn run(&self, cmd: &str, each_line: impl FnMut(&str, LineKind)) -> Result<i32, Error> {
        self.run_cancelable(cmd, each_line, None)
    }

    /// As `run`, but `cancel` lets another thread abort the command via
    /// `Pool::cancel(cancel)` while it's in flight.
    pub fn run_cancelable(
        &self,
        cmd: &str,
        mut each_line: impl FnMut(&str, LineKind),
        cancel: Option<&CancelToken>,
    ) -> Result<i32, Error> {
        let t0 = Instant::now();

        let tmp = Builder::new()
            .prefix("shellpool-")
            .suffix(".tmp")
            .tempfile()
            .map_err(Error::SpawnFailed)?;
        std::fs::write(tmp.path(), framing::user_script(cmd)).map_err(Error::SpawnFailed)?;

        let result = self.with_runner(|runner| {
            run_in_runner(runner, self, tmp.path(), cancel, &mut each_line)
        });
        // `tmp` (a NamedTempFile) is deleted here regardless of outcome —
        // the RAII counterpart of the source's "with-file-to-be-deleted"
        // scoping macro (§9).
        drop(tmp);

        let dur_us = t0.elapsed().as_micros();
        let outcome = match &result {
            Ok(status) => format!("exit={status}"),
            Err(e) => format!("error={e}"),
        };
        trace::run_finished(cmd, dur_us, &outcome);

        result
    }

    /// Abort an in-flight `run_cancelable` call associated with `token`.
    /// If the command's PID isn't known yet, the kill is deferred until
    /// the engine learns it.
    pub fn cancel(&self, token: &CancelToken) -> Result<(), Error> {
        let pid = {
            let mut state = token.0.lock().unwrap();
            state.cancel_requested = true;
            state.pid
        };
        match pid {
            Some(pid) => self.kill_tree(pid),
            None => Ok(()),
        }
    }
}

fn ping(runner: &mut Runner) -> Result<(), Error> {
    runner.shell.write_line("echo ping").map_err(|_| Error::RunnerDied)?;
    match runner.shell.read_stdout_line().map_err(|_| Error::RunnerDied)? {
        Some(line) if line == "ping" => Ok(()),
        _ => Err(Error::RunnerCorrupted),
    }
}

fn read_pid_line(runner: &mut Runner) -> Result<u32, Error> {
    let line = runner
        .shell
        .read_stderr_line()
        .map_err(|_| Error::RunnerDied)?
        .ok_or(Error::RunnerDied)?;
    framing::parse_pid_line(&line).ok_or(Error::ProtocolViolation(line))
}

fn run_in_runner(
    runner: &mut Runner,
    pool: &Pool,
    script_path: &Path,
    cancel: Option<&CancelToken>,
    each_line: &mut dyn FnMut(&str, LineKind),
) -> Result<i32, Error> {
    // 2a. ping round-trip guards against residue from a prior command.
    if let Err(e) = ping(runner) {
        runner.mark_errored();
        return Err(e);
    }

    // 2b. write the driver script.
    let script = framing::driver_script(script_path);
    if runner.shell.write_block(&script).is_err() {
        runner.mark_errored();
        return Err(Error::RunnerDied);
    }

    // 2c. the PID line always precedes any other stderr output.
    let pid = match read_pid_line(runner) {
        Ok(pid) => pid,
        Err(e) => {
            runner.mark_errored();
            return Err(e);
        }
    };
    if let Some(token) = cancel
        && token.register_pid(pid)
    {
        // A cancellation was requested before we even learned the PID.
        let _ = pool.kill_tree(pid);
    }

    // 2d. stdout loop, then stderr loop.
    let mut exit_status = None;
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut abort_err: Option<Error> = None;

    loop {
        let line = match runner.shell.read_stdout_line() {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => {
                runner.mark_errored();
                abort_err = Some(Error::RunnerDied);
                break;
            }
        };
        if config::debug_enabled() {
            trace::raw_line("stdout", &line);
        }
        match framing::classify_stdout(&line) {
            StdoutEvent::Ignore => {}
            StdoutEvent::Stdout(s) => each_line(&s, LineKind::Stdout),
            StdoutEvent::Stderr(s) => each_line(&s, LineKind::Stderr),
            StdoutEvent::Status(n) => exit_status = Some(n),
            StdoutEvent::Death => {
                runner.mark_errored();
                abort_err = Some(Error::RunnerDied);
                break;
            }
            StdoutEvent::Exit => {
                stdout_done = true;
                break;
            }
            StdoutEvent::Violation(l) => {
                runner.mark_errored();
                abort_err = Some(Error::ProtocolViolation(l));
                break;
            }
        }
    }

    if abort_err.is_none() {
        loop {
            let line = match runner.shell.read_stderr_line() {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    runner.mark_errored();
                    abort_err = Some(Error::RunnerDied);
                    break;
                }
            };
            if config::debug_enabled() {
                trace::raw_line("stderr", &line);
            }
            match framing::classify_stderr(&line) {
                StderrEvent::Ignore => {}
                StderrEvent::Death => {
                    runner.mark_errored();
                    abort_err = Some(Error::RunnerDied);
                    break;
                }
                StderrEvent::Exit => {
                    stderr_done = true;
                    break;
                }
                StderrEvent::Violation(l) => {
                    runner.mark_errored();
                    abort_err = Some(Error::ProtocolViolation(l));
                    break;
                }
            }
        }
    }

    // 2e. protected cleanup: runs even on abort.
    if !(stdout_done && stderr_done) {
        let _ = pool.kill_tree(pid);
        if !stdout_done {
            drain_stream(runner, true);
        }
        if !stderr_done && !runner.is_errored() {
            drain_stream(runner, false);
        }
    }

    if let Some(e) = abort_err {
        return Err(e);
    }

    match exit_status {
        Some(status) if stdout_done && stderr_done => Ok(status),
        _ => {
            runner.mark_errored();
            Err(Error::Incomplete)
        }
    }
}

/// Recovery drain (§4.5e): read and discard lines on a stream that didn't
/// reach its sentinel, stopping at a line whose *suffix* equals
/// `EXIT_LINE` — a suffix match, not equality, because an interrupted
/// partial line with no trailing newline can precede the sentinel.
fn drain_stream(runner: &mut Runner, stdout: bool) {
    loop {
        let line = if stdout {
            runner.shell.read_stdout_line()
        } else {
            runner.shell.read_stderr_line()
        };
        match line {
            Ok(Some(l)) => {
                if l == framing::DEATH_LINE {
                    runner.mark_errored();
                    return;
                }
                if l.ends_with(framing::EXIT_LINE) {
                    return;
                }
            }
            Ok(None) | Err(_) => {
                runner.mark_errored();
                return;
            }
        }
    }
}
