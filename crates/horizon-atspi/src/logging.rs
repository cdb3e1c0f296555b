//! Tracing targets and span names.
//!
//! The bridge logs through the `tracing` crate and never installs a
//! subscriber. Use these targets in filter directives, e.g.
//! `RUST_LOG=horizon_atspi::reentrant=trace`.

/// Span names used by the bridge.
pub mod span_names {
    /// Emission of one event envelope.
    pub const EMIT: &str = "horizon_atspi::emit";
    /// One synchronous round-trip.
    pub const SYNC_CALL: &str = "horizon_atspi::sync_call";
}

/// Target names for log filtering.
pub mod targets {
    /// Bridge lifecycle.
    pub const BRIDGE: &str = "horizon_atspi::bridge";
    /// Listener registration and teardown.
    pub const LISTENERS: &str = "horizon_atspi::listeners";
    /// Notification normalization.
    pub const NORMALIZE: &str = "horizon_atspi::normalize";
    /// Envelope dispatch.
    pub const DISPATCH: &str = "horizon_atspi::dispatch";
    /// Synchronous call channel.
    pub const REENTRANT: &str = "horizon_atspi::reentrant";
    /// Key event forwarding.
    pub const KEYBOARD: &str = "horizon_atspi::keyboard";
    /// Bus transport.
    pub const BUS: &str = "horizon_atspi::bus";
    /// Reference registry and leases.
    pub const REGISTRY: &str = "horizon_atspi::registry";
}
