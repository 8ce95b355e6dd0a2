//! Process-wide log setup.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! the embedding process's job. This module gives it the standard one:
//! JSON lines, filtered through `RUST_LOG`.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global JSON subscriber.
///
/// Filtering comes from `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVES`].
/// Later calls lose the install race and are ignored, so tests can call
/// this freely.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
    }
}
