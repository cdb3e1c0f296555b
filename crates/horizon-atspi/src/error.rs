//! Error types for the bridge.

use std::path::PathBuf;

use horizon_atspi_core::ToolkitError;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge.
///
/// Event emission and key-event forwarding never surface these: a lost
/// signal is dropped and a failed key query counts as "not consumed". They
/// are returned from setup, configuration and the [`Bus`](crate::Bus)
/// implementations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// D-Bus transport error.
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// The toolkit rejected a listener operation.
    #[error("Toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),

    /// Configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The bus connection is closed.
    #[error("Bus connection closed")]
    ConnectionClosed,

    /// Listeners are already registered.
    #[error("Event listeners are already registered")]
    AlreadyRegistered,
}

impl BridgeError {
    /// Create a configuration read error.
    pub fn config(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }
}
