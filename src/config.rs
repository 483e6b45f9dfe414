use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "labflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lab API used when `LABFLOW_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Connect timeout used when `LABFLOW_CONNECT_TIMEOUT_SECS` is not set.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const API_URL_VAR: &str = "LABFLOW_API_URL";
const CONNECT_TIMEOUT_VAR: &str = "LABFLOW_CONNECT_TIMEOUT_SECS";

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "labflow=info,reqwest=warn"
}

/// Get the application data directory (~/.labflow).
///
/// `None` when the platform reports no home directory.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".labflow"))
}

/// Location of the persisted bearer credential.
pub fn credential_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("credential"))
}

/// Settings for the HTTP gateway.
///
/// Only the connect phase is bounded. Requests themselves run until the
/// transport reports success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Build from `LABFLOW_API_URL` / `LABFLOW_CONNECT_TIMEOUT_SECS`.
    ///
    /// Unset, empty or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup(API_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let mut config = Self::new(&url);
        match lookup(CONNECT_TIMEOUT_VAR).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.connect_timeout = Duration::from_secs(secs),
            Some(_) => {
                tracing::warn!(var = CONNECT_TIMEOUT_VAR, "Ignoring invalid connect timeout");
            }
            None => {}
        }
        config
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
