#![allow(dead_code)]

use std::time::Duration;

use swipify_core::remote::memory::InMemoryRemote;
use swipify_core::{BackoffPolicy, RemoteCollectionClient, RetryMode, SessionState, SwipeEngine};

/// Initialize tracing for tests
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}

/// `t1..=tn`
pub fn ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("t{i}")).collect()
}

/// Default schedule: 5 attempts, 1s doubling to 16s.
pub fn policy() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(16),
        mode: RetryMode::Strict,
    }
}

pub fn engine(remote: InMemoryRemote, page_size: usize) -> SwipeEngine<InMemoryRemote> {
    SwipeEngine::new(RemoteCollectionClient::new(remote, policy()).with_page_size(page_size))
}

/// Session whose queue holds `ids` in order.
pub fn state_with_queue(ids: &[String]) -> SessionState {
    let mut state = SessionState::default();
    state.queue.replace(ids.to_vec());
    state
}
