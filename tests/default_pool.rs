//! Exercises the process-wide default pool exposed by the crate's top-level
//! `start`/`run`/`run_background` functions. These all share one
//! `OnceLock`-cached `Pool`, so every test here runs `#[serial]` to avoid
//! racing another test's `start()` against the same singleton — mirroring
//! how the teacher crate serializes tests around its own process-global
//! `OnceLock` state.

use serial_test::serial;
use std::sync::{Arc, Mutex};

#[test]
#[serial]
fn top_level_run_executes_through_the_default_pool() {
    let _ = env_logger::try_init();
    shellpool::start(2).ok(); // already started by an earlier test is fine
    let lines = Arc::new(Mutex::new(Vec::new()));
    let collected = Arc::clone(&lines);
    let status = shellpool::run("echo default-pool", move |line, kind| {
        collected.lock().unwrap().push((line.to_string(), kind));
    })
    .unwrap();
    assert_eq!(status, 0);
    assert_eq!(
        *lines.lock().unwrap(),
        vec![("default-pool".to_string(), shellpool::LineKind::Stdout)]
    );
}

#[test]
#[serial]
fn top_level_run_background_does_not_block() {
    shellpool::start(2).ok();
    shellpool::run_background("sleep 0.1").unwrap();
}
