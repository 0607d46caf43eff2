pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber; `RUST_LOG` defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
