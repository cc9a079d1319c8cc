use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// default filter directive when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "community_ledger=info";

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call repeatedly; only the first call installs anything, and a host
/// that already installed its own subscriber keeps it.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
        if fmt().with_env_filter(filter).with_target(true).try_init().is_ok() {
            tracing::info!("community ledger tracing initialized");
        }
    });
}
