//! shellpool — a bounded pool of pre-forked worker shells for running
//! commands with line-streamed output.
//!
//! A [`Pool`] keeps a fixed number of long-lived `bash` processes warm and
//! hands them out to [`Pool::run`] calls under a counting semaphore, so
//! commands don't pay shell-startup cost and concurrency stays bounded.
//! Output is delivered to the caller's callback one line at a time, tagged
//! with which stream (`stdout`/`stderr`) it came from, as the command runs.
//!
//! ```no_run
//! let pool = shellpool::Pool::new();
//! pool.start(4)?;
//! let status = pool.run("echo hello", shellpool::default_line_callback)?;
//! assert_eq!(status, 0);
//! # Ok::<(), shellpool::Error>(())
//! ```
//!
//! # Global State
//!
//! | Module | Global | Purpose |
//! |--------|--------|---------|
//! | [`config`] | `DEBUG` | Cached `SHELLPOOL_DEBUG` env lookup |
//! | [`shell`] | `BASH_PATH` | Cached bash-candidate detection |
//! | [`trace`] | `TRACE_EPOCH` | Monotonic base for trace timestamps |
//! | (this module) | `DEFAULT_POOL` | Process-wide convenience pool (§6) |

mod aux;
pub mod config;
mod engine;
pub mod error;
mod framing;
pub mod pool;
mod shell;
mod sync;
pub mod trace;

use std::sync::OnceLock;

pub use engine::{default_line_callback, CancelToken, LineKind};
pub use error::{Error, Result};
pub use pool::{Pool, Runner};

static DEFAULT_POOL: OnceLock<Pool> = OnceLock::new();

fn default_pool() -> &'static Pool {
    DEFAULT_POOL.get_or_init(|| Pool::with_max_shells(config::max_shells()))
}

/// Add `n` runners to the process-wide default pool, starting its auxiliary
/// shell first if this is the first call. A convenience wrapper over
/// [`Pool::start`] for callers happy to share one pool process-wide (§9).
pub fn start(n: usize) -> Result<()> {
    default_pool().start(n)
}

/// Run `cmd` through the process-wide default pool. See [`Pool::run`].
pub fn run(cmd: &str, each_line: impl FnMut(&str, LineKind)) -> Result<i32> {
    default_pool().run(cmd, each_line)
}

/// Submit `cmd` as a detached background job via the process-wide default
/// pool. See [`Pool::run_background`].
pub fn run_background(cmd: &str) -> Result<()> {
    default_pool().run_background(cmd)
}
