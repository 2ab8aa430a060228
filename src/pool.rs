//! C4 — Runner Pool.
//!
//! Owns a set of long-lived worker shells (`Runner`s), hands them out under
//! a counting semaphore, and reinstates or permanently evicts them on
//! return (spec §3, §4.4).
//!
//! # Invariants
//! - (I1) `semaphore.available() == available.len()` outside critical sections.
//! - (I2) no runner in `available` has `errored == true`.
//! - (I3) a checked-out runner is referenced by exactly one caller.
//!
//! These hold because every place a permit is added (`add_runners_locked`,
//! the reinstate path in `with_runner`) also pushes exactly one runner into
//! `available` in the same critical section, and every place a runner is
//! dropped instead of reinstated (`with_runner`'s evict path) calls
//! `SemaphoreGuard::forget` instead of letting it repay.

use std::sync::{Arc, Mutex};

use crate::aux::AuxShell;
use crate::config::DEFAULT_MAX_SHELLS;
use crate::error::Error;
use crate::framing;
use crate::shell::Shell;
use crate::sync::Semaphore;
use crate::trace;

/// A persistent worker shell, checked out exclusively by one `run()` call
/// at a time.
pub struct Runner {
    pub(crate) shell: Shell,
    errored: bool,
}

impl Runner {
    /// Mark this runner irrecoverable. It will be evicted, not reinstated,
    /// when the current `with_runner` call returns.
    pub(crate) fn mark_errored(&mut self) {
        self.errored = true;
    }

    pub(crate) fn is_errored(&self) -> bool {
        self.errored
    }
}

struct State {
    aux: Option<AuxShell>,
    available: Vec<Runner>,
}

struct PoolInner {
    state: Mutex<State>,
    semaphore: Semaphore,
    max_shells: usize,
}

/// A bounded set of worker shells. Cloning shares the same underlying pool
/// (cheap `Arc` clone) — see §9's note that a process-wide singleton is a
/// convenience, not a requirement, of this design.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    /// A pool with the default `MAX_SHELLS` ceiling and no runners yet —
    /// call `start(n)` before running anything.
    pub fn new() -> Self {
        Self::with_max_shells(DEFAULT_MAX_SHELLS)
    }

    /// A pool with a custom `MAX_SHELLS` ceiling.
    pub fn with_max_shells(max_shells: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(State {
                    aux: None,
                    available: Vec::new(),
                }),
                semaphore: Semaphore::new(0),
                max_shells,
            }),
        }
    }

    /// Idempotently ensure the auxiliary shell exists, then add `n` runners.
    pub fn start(&self, n: usize) -> Result<(), Error> {
        if n >= self.inner.max_shells {
            return Err(Error::Insane {
                requested: n,
                max: self.inner.max_shells,
            });
        }

        let mut state = self.inner.state.lock().unwrap();
        if state.aux.is_none() {
            state.aux = Some(AuxShell::spawn()?);
            trace::instant("auxiliary shell started");
        }
        self.add_runners_locked(&mut state, n)
    }

    fn add_runners_locked(&self, state: &mut State, n: usize) -> Result<(), Error> {
        let mut spawned = Vec::with_capacity(n);
        for _ in 0..n {
            let mut shell = Shell::spawn()?;
            shell
                .write_line(&framing::death_trap_line())
                .map_err(Error::SpawnFailed)?;
            spawned.push(Runner {
                shell,
                errored: false,
            });
        }
        let added = spawned.len();
        state.available.extend(spawned);
        self.inner.semaphore.add_permits(added);
        trace::instant(&format!("added {added} runners"));
        Ok(())
    }

    /// Acquire one runner (blocking until available), run `body`, and
    /// reinstate or evict it depending on whether `body` marked it errored.
    pub fn with_runner<T>(
        &self,
        body: impl FnOnce(&mut Runner) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let guard = self.inner.semaphore.acquire();

        let mut runner = {
            let mut state = self.inner.state.lock().unwrap();
            state
                .available
                .pop()
                .expect("semaphore permit implies an available runner (I1)")
        };

        if !runner.shell.alive() {
            runner.mark_errored();
        }

        let result = if runner.is_errored() {
            Err(Error::RunnerCorrupted)
        } else {
            body(&mut runner)
        };

        if runner.is_errored() {
            guard.forget();
            trace::instant("runner evicted");
        } else {
            let mut state = self.inner.state.lock().unwrap();
            state.available.push(runner);
            drop(state);
            drop(guard);
        }

        result
    }

    /// C3, via the auxiliary shell: recursively SIGKILL `pid` and its
    /// descendants.
    pub(crate) fn kill_tree(&self, pid: u32) -> Result<(), Error> {
        let mut state = self.inner.state.lock().unwrap();
        match state.aux.as_mut() {
            Some(aux) => aux.kill_tree(pid),
            None => Err(Error::AuxDead),
        }
    }

    /// C6, via the auxiliary shell: submit a detached background command.
    pub fn run_background(&self, cmd: &str) -> Result<(), Error> {
        let mut state = self.inner.state.lock().unwrap();
        match state.aux.as_mut() {
            Some(aux) => aux.run_background(cmd),
            None => Err(Error::AuxDead),
        }
    }

    /// Snapshot invariant (I1)/(I2) for tests: permits must equal the
    /// available count, and no available runner may be errored.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let state = self.inner.state.lock().unwrap();
        assert_eq!(self.inner.semaphore.available(), state.available.len());
        assert!(state.available.iter().all(|r| !r.is_errored()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_rejects_insane_count() {
        let pool = Pool::with_max_shells(4);
        let err = pool.start(4).unwrap_err();
        assert!(matches!(err, Error::Insane { requested: 4, max: 4 }));
    }

    #[test]
    fn start_and_with_runner_round_trip() {
        let pool = Pool::new();
        pool.start(1).expect("bash should be present on test hosts");
        pool.check_invariants();

        let out = pool
            .with_runner(|runner| {
                runner.shell.write_line("echo ping").unwrap();
                Ok(runner.shell.read_stdout_line().unwrap())
            })
            .unwrap();
        assert_eq!(out.as_deref(), Some("ping"));
        pool.check_invariants();
    }

    #[test]
    fn errored_runner_is_evicted_not_reinstated() {
        let pool = Pool::new();
        pool.start(1).expect("bash should be present on test hosts");

        let result: Result<(), Error> = pool.with_runner(|runner| {
            runner.mark_errored();
            Ok(())
        });
        assert!(result.is_ok());
        pool.check_invariants();
        assert_eq!(pool.inner.semaphore.available(), 0);
    }
}
