pub mod auth; // Sign-in, profile bootstrap, logout
pub mod cache;
pub mod config;
pub mod gateway; // Lab API client + in-memory mock
pub mod models;
pub mod notify;
pub mod session;
pub mod workflow; // Result entry → AI suggestion → completion
pub mod worklist;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`.
/// Safe to call more than once: later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
