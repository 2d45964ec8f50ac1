//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::relay::Relay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    relay: Relay,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_relay(config, Relay::new())
    }

    /// Wrap an existing relay (tests drive it directly)
    pub fn with_relay(config: Config, relay: Relay) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, relay }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the relay
    pub fn relay(&self) -> &Relay {
        &self.inner.relay
    }
}
