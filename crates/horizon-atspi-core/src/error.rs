//! Error types for the toolkit side of the bridge.

use std::fmt;

/// Errors reported by a [`Toolkit`](crate::Toolkit) listener API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// The listener ID is invalid or has already been removed.
    UnknownListener,
    /// The event type string is not of the form `Toolkit:Type:signal` or `window:signal`.
    InvalidEventType(String),
}

impl fmt::Display for ToolkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownListener => write!(f, "Invalid or already removed listener ID"),
            Self::InvalidEventType(event_type) => {
                write!(f, "Invalid event type '{event_type}'")
            }
        }
    }
}

impl std::error::Error for ToolkitError {}

/// A specialized Result type for toolkit listener operations.
pub type Result<T> = std::result::Result<T, ToolkitError>;
