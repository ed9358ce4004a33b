//! Shared helpers for integration tests.

#![allow(dead_code)]

use stream_dedup::infrastructure::mocks::MockClock;

/// Mock clock at a fixed, recent wall-clock time.
pub fn clock() -> MockClock {
    MockClock::at_epoch(1_700_000_000)
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `msg` through the limiter with a succeeding handler and report the
/// decision it was given.
pub fn offer(limiter: &stream_dedup::Limiter, msg: &str) -> bool {
    let mut decision = None;
    limiter
        .process_and_record(msg, |_, process| {
            decision = Some(process);
            Ok::<_, ()>(())
        })
        .unwrap();
    decision.unwrap()
}
