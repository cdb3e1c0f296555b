//! AT-SPI event bridge for Horizon.
//!
//! This crate forwards a toolkit's accessibility notifications to assistive
//! technologies over the AT-SPI D-Bus protocol:
//!
//! - **Listeners**: [`ListenerRegistry`] hooks one handler per notification
//!   type into the [`Toolkit`](horizon_atspi_core::Toolkit) and removes them
//!   all again on teardown
//! - **Normalization**: [`normalize`] turns each notification into a uniform
//!   [`Envelope`]
//! - **Marshalling**: [`marshal`] encodes the envelope's payload as a
//!   self-describing variant
//! - **Dispatch**: [`EventDispatcher`] sends envelopes as bus signals
//! - **Synchronous calls**: [`ReentrantCallChannel`] blocks on a reply
//!   without starving the application's main context
//! - **Keyboard**: [`KeyEventAdapter`] asks the registry whether a key event
//!   was consumed
//!
//! [`Bridge`] ties everything together.
//!
//! # Logging
//!
//! Everything is logged through `tracing` under the targets in
//! [`logging::targets`]. The bridge never installs a subscriber.

pub mod bridge;
pub mod bus;
pub mod config;
pub mod dispatch;
mod error;
pub mod keyboard;
pub mod listeners;
pub mod logging;
pub mod marshal;
pub mod names;
pub mod normalize;
pub mod reentrant;
pub mod registry;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use bus::{Bus, EventBody, MethodCall, PendingReply, Reply, ReplyBody, SignalFrame, ZbusBus};
pub use config::{BridgeConfig, ReentryMode};
pub use dispatch::{Envelope, EventDispatcher, EventInterface, signal_name_to_dbus};
pub use error::{BridgeError, Result};
pub use keyboard::{DeviceEvent, DeviceEventType, KeyEventAdapter};
pub use listeners::{EVENT_LISTENERS, ListenerRegistry};
pub use marshal::{BasicValue, EventValue, ObjectReference, Payload, marshal_basic};
pub use normalize::{Normalized, NotificationKind};
pub use reentrant::ReentrantCallChannel;
pub use registry::{AccessibleRegister, ObjectRegistry};
