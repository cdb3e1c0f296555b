//! Bridge configuration.
//!
//! The configuration is resolved once, when the bridge is built, and copied
//! into the components that need it. Nothing re-reads the environment per
//! call.
//!
//! # Sources
//!
//! ```ignore
//! // Environment only
//! let config = BridgeConfig::from_env();
//!
//! // TOML file, then environment overrides
//! let config = BridgeConfig::load("/etc/horizon-atspi.toml")?.with_env_overrides();
//! ```
//!
//! A TOML file looks like:
//!
//! ```toml
//! reentry = "cooperative"
//! dispatch_timeout_ms = 1000
//! lease_duration_secs = 15
//! bus_address = "unix:path=/run/user/1000/at-spi/bus"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::names::{ENV_CLIENT, ENV_REENTER_MAIN_LOOP};

/// How a synchronous call waits for its reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentryMode {
    /// Run a nested main loop on the application's context until the reply
    /// arrives. Other queued work keeps being dispatched meanwhile.
    Cooperative,
    /// Block on the bus connection in fixed-length dispatch cycles until the
    /// reply arrives or the connection fails.
    #[default]
    Poll,
}

/// Configuration of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How synchronous calls wait.
    pub reentry: ReentryMode,
    /// Length of one poll-mode dispatch cycle, in milliseconds.
    pub dispatch_timeout_ms: u64,
    /// How long a lease keeps an object's reference alive, in seconds.
    pub lease_duration_secs: u64,
    /// Explicit accessibility bus address. When unset the address is
    /// discovered through the session bus.
    pub bus_address: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            reentry: ReentryMode::default(),
            dispatch_timeout_ms: 1000,
            lease_duration_secs: 15,
            bus_address: None,
        }
    }
}

impl BridgeConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Default configuration with overrides read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| BridgeError::config(path, source))?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Cooperative re-entry is selected when either `AT_SPI_CLIENT` or
    /// `AT_SPI_REENTER_G_MAIN_LOOP` is set, whatever its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_CLIENT).is_some() || lookup(ENV_REENTER_MAIN_LOOP).is_some() {
            self.reentry = ReentryMode::Cooperative;
        }
        self
    }

    /// Set the re-entry mode.
    pub fn reentry(mut self, mode: ReentryMode) -> Self {
        self.reentry = mode;
        self
    }

    /// Set the accessibility bus address.
    pub fn bus_address(mut self, address: impl Into<String>) -> Self {
        self.bus_address = Some(address.into());
        self
    }

    /// Length of one poll-mode dispatch cycle.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Lease duration.
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}
