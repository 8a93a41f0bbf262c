//! Logging configuration for the gateway.
//!
//! There is no TUI to protect from corrupted output, so everything goes to
//! stderr: a single `init_logging()` entry point selecting an `EnvFilter`
//! from `RUST_LOG`, defaulting to `"info"`.

use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
