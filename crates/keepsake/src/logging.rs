//! Log output setup.
//!
//! Library code only emits `tracing` events; binaries decide where they
//! go. Call [`init`] once at the top of `main`.

use tracing_subscriber::EnvFilter;

/// Installs a formatted stderr subscriber filtered by `RUST_LOG`,
/// defaulting to `info`.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with a custom fallback filter such as
/// `"keepsake_persist=debug,info"`.
///
/// Does nothing if a global subscriber is already installed, so tests
/// may call it repeatedly.
pub fn init_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
