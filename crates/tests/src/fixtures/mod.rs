pub mod events;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Initializes tracing once per test binary. `CROSSTALK_TEST_LOG=debug`
/// turns on output for failing-test archaeology.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var("CROSSTALK_TEST_LOG").unwrap_or_else(|_| "warn".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Drains everything currently sitting in a broadcast receiver.
pub fn drain<T: Clone>(rx: &mut tokio::sync::broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

/// Lets spawned wiring/timer tasks run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
