//! Structured debug-log lines for pool activity.
//!
//! Adapted from `shell_exec::trace_instant` / `thread_id_number`: a monotonic
//! microsecond timestamp plus the OS thread id, logged through `log::debug!`
//! so the host's own subscriber decides whether any of it is ever printed.

use std::sync::OnceLock;
use std::time::Instant;

static TRACE_EPOCH: OnceLock<Instant> = OnceLock::new();

fn trace_epoch() -> &'static Instant {
    TRACE_EPOCH.get_or_init(Instant::now)
}

fn thread_id_number() -> u64 {
    let debug_str = format!("{:?}", std::thread::current().id());
    debug_str
        .strip_prefix("ThreadId(")
        .and_then(|s| s.strip_suffix(")"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Emit an instant marker: `[shellpool-trace] ts=<us> tid=<n> event="..."`.
pub fn instant(event: &str) {
    let ts = Instant::now().duration_since(*trace_epoch()).as_micros();
    log::debug!(
        "[shellpool-trace] ts={} tid={} event=\"{}\"",
        ts,
        thread_id_number(),
        event
    );
}

/// Emit a completed-run marker with duration and outcome.
pub fn run_finished(cmd: &str, dur_us: u128, outcome: &str) {
    let ts = Instant::now().duration_since(*trace_epoch()).as_micros();
    let truncated: String = cmd.chars().take(80).collect();
    log::debug!(
        "[shellpool-trace] ts={} tid={} cmd=\"{}\" dur_us={} outcome={}",
        ts,
        thread_id_number(),
        truncated,
        dur_us,
        outcome
    );
}

/// Verbose per-line dump, only ever called when `config::debug_enabled()`.
pub fn raw_line(stream: &str, line: &str) {
    log::trace!("[shellpool-trace] raw {}: {:?}", stream, line);
}
