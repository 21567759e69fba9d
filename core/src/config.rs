//! Client settings.
//!
//! # Design
//! `ClientConfig` is plain data handed to `SyncController::new` and
//! `UreqTransport::new`. The base URL is the only value read from the
//! environment; timeout and the stale-fetch guard are set in code. A missing
//! or blank `API_BASE_URL` falls back to the local backend and logs the
//! fallback.

use std::env;
use std::time::Duration;

use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Environment variable consulted by [`ClientConfig::from_env`].
pub const BASE_URL_VAR: &str = "API_BASE_URL";

/// Settings for a `SyncController` and its transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout applied by the transport. `None` leaves the
    /// transport's own default in place.
    pub timeout: Option<Duration>,
    /// Drop todo-list results that resolve after a later-issued fetch has
    /// already been applied.
    pub discard_stale_fetches: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            discard_stale_fetches: true,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Reads the base URL from `API_BASE_URL`, falling back to
    /// `http://localhost:5000`.
    pub fn from_env() -> Self {
        match env::var(BASE_URL_VAR) {
            Ok(url) if !url.trim().is_empty() => {
                debug!(base_url = %url, "using {BASE_URL_VAR}");
                Self::new(url.trim())
            }
            _ => {
                info!("{BASE_URL_VAR} not set, using default: {DEFAULT_BASE_URL}");
                Self::default()
            }
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stale_fetch_guard(mut self, enabled: bool) -> Self {
        self.discard_stale_fetches = enabled;
        self
    }
}
