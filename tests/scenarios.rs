//! End-to-end scenarios against a real `bash`, per the testable properties
//! and numbered scenarios in the spec: round-trip text, exit status
//! propagation, concurrency bound, and kill-and-recover.

use rstest::rstest;
use shellpool::{CancelToken, LineKind, Pool};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn pool_of(n: usize) -> Pool {
    let _ = env_logger::try_init();
    let pool = Pool::new();
    pool.start(n).expect("bash should be present on test hosts");
    pool
}

fn collect(pool: &Pool, cmd: &str) -> (i32, Vec<(String, LineKind)>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let collected = Arc::clone(&lines);
    let status = pool
        .run(cmd, move |line, kind| {
            collected.lock().unwrap().push((line.to_string(), kind));
        })
        .unwrap();
    let lines = Arc::try_unwrap(lines).unwrap().into_inner().unwrap();
    (status, lines)
}

#[rstest]
#[case("echo hello", 0, &[("hello", LineKind::Stdout)])]
#[case("echo hello 1>&2", 0, &[("hello", LineKind::Stderr)])]
#[case("printf 'no-newline'", 0, &[("no-newline", LineKind::Stdout)])]
fn scenario(#[case] cmd: &str, #[case] expect_status: i32, #[case] expect_lines: &[(&str, LineKind)]) {
    let pool = pool_of(1);
    let (status, lines) = collect(&pool, cmd);
    assert_eq!(status, expect_status);
    assert_eq!(lines.len(), expect_lines.len());
    for (got, want) in lines.iter().zip(expect_lines) {
        assert_eq!(got.0, want.0);
        assert_eq!(got.1, want.1);
    }
}

#[test]
fn scenario_mixed_streams_and_nonzero_exit() {
    let pool = pool_of(1);
    let (status, lines) = collect(&pool, "echo out; echo err 1>&2; exit 7");
    assert_eq!(status, 7);
    assert!(lines.contains(&("out".to_string(), LineKind::Stdout)));
    assert!(lines.contains(&("err".to_string(), LineKind::Stderr)));
}

fn shell_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[rstest]
#[case("plain ASCII line")]
#[case("line with   spaces and\ttabs")]
#[case("trailing-newline-line")]
fn round_trip_law(#[case] line: &str) {
    let pool = pool_of(1);
    let cmd = format!("printf '%s\\n' {}", shell_single_quote(line));
    let (status, lines) = collect(&pool, &cmd);
    assert_eq!(status, 0);
    assert_eq!(lines, vec![(line.to_string(), LineKind::Stdout)]);
}

#[test]
fn concurrent_runs_do_not_cross_contaminate() {
    let pool = pool_of(2);
    let start = Instant::now();

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                let expected = format!("t{n}");
                let (status, lines) = collect(&pool, &format!("sleep 0.2; echo {expected}"));
                assert_eq!(status, 0);
                assert_eq!(lines, vec![(expected, LineKind::Stdout)]);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // Bounded to 2 concurrent runners, 4 calls of ~0.2s each: at least two
    // serialized batches must have elapsed.
    assert!(start.elapsed() >= Duration::from_millis(350));
}

#[test]
fn cancelled_run_kills_descendants_and_returns_an_error() {
    let pool = pool_of(1);
    let token = CancelToken::new();

    let cancel_pool = pool.clone();
    let cancel_token = token.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        cancel_pool.cancel(&cancel_token).unwrap();
    });

    let result = pool.run_cancelable("sleep 60 & sleep 60 & wait", |_, _| {}, Some(&token));
    canceller.join().unwrap();

    assert!(result.is_err(), "a killed command must not report success");

    // (P1): the runner is either reinstated (drain succeeded) or
    // permanently evicted. Either way the pool stays internally consistent;
    // topping it up guarantees forward progress regardless of which
    // outcome occurred, and a bounded probe confirms the pool is not
    // wedged.
    pool.start(1).expect("bash should be present on test hosts");
    let (tx, rx) = std::sync::mpsc::channel();
    let probe_pool = pool.clone();
    std::thread::spawn(move || {
        let _ = tx.send(probe_pool.run("true", |_, _| {}));
    });
    let probed = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("pool must remain usable after a cancelled run");
    assert_eq!(probed.unwrap(), 0);
}
