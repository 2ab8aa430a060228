//! A counting semaphore for gating runner concurrency.
//!
//! Ported from the teacher crate's `sync::Semaphore` — a `Mutex` + `Condvar`
//! pair with RAII release on drop. The pool additionally needs to inspect
//! the permit count without acquiring (to check invariant I1 in tests), so
//! `available` is exposed read-only.

use std::sync::{Arc, Condvar, Mutex};

/// A counting semaphore for limiting concurrency.
#[derive(Clone)]
pub struct Semaphore {
    state: Arc<(Mutex<usize>, Condvar)>,
}

/// RAII guard that releases a permit on drop.
pub struct SemaphoreGuard {
    state: Arc<(Mutex<usize>, Condvar)>,
    forgotten: bool,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Arc::new((Mutex::new(permits), Condvar::new())),
        }
    }

    /// Acquire a permit, blocking until one is available.
    pub fn acquire(&self) -> SemaphoreGuard {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        while *available == 0 {
            available = cvar.wait(available).unwrap();
        }
        *available -= 1;
        SemaphoreGuard {
            state: Arc::clone(&self.state),
            forgotten: false,
        }
    }

    /// Add `n` permits, as when the pool grows.
    pub fn add_permits(&self, n: usize) {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        *available += n;
        cvar.notify_all();
    }

    /// Current permit count. Used by tests to check invariant I1.
    pub fn available(&self) -> usize {
        let (lock, _) = &*self.state;
        *lock.lock().unwrap()
    }
}

impl SemaphoreGuard {
    /// Consume the guard without repaying its permit — used when a runner
    /// is evicted instead of reinstated, so the pool shrinks by one.
    pub fn forget(mut self) {
        self.forgotten = true;
    }
}

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        if self.forgotten {
            return;
        }
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        *available += 1;
        cvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn limits_concurrency() {
        let sem = Semaphore::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let sem = sem.clone();
                let counter = Arc::clone(&counter);
                let max_concurrent = Arc::clone(&max_concurrent);
                thread::spawn(move || {
                    let _guard = sem.acquire();
                    let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(current, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn forget_does_not_repay_permit() {
        let sem = Semaphore::new(1);
        assert_eq!(sem.available(), 1);
        let guard = sem.acquire();
        assert_eq!(sem.available(), 0);
        guard.forget();
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn normal_drop_repays_permit() {
        let sem = Semaphore::new(1);
        let guard = sem.acquire();
        assert_eq!(sem.available(), 0);
        drop(guard);
        assert_eq!(sem.available(), 1);
    }
}
