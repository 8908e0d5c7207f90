//! Tracing subscriber setup for binaries embedding the ordering service.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "info,meridian=debug,sqlx=warn";

/// Initializes the global tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=meridian_ordering=trace` - Trace the ordering service only
/// - Default: [`DEFAULT_DIRECTIVES`]
///
/// Returns `false` when a subscriber was already installed.
pub fn init() -> bool {
    init_with(DEFAULT_DIRECTIVES)
}

pub fn init_with(default_directives: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        init();
        assert!(!init());
    }
}
