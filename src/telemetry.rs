// Structured logging setup.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` subscriber. Respects `RUST_LOG` and
/// defaults to `cubertopic=info`. Safe to call more than once; later calls
/// are no-ops if a subscriber is already installed.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cubertopic=info")),
        )
        .try_init();
}
