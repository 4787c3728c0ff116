//! Tracing setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Install a global subscriber. `RUST_LOG` wins over the passed default;
/// calling this more than once is harmless.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("info");
        init("debug");
    }
}
