//! Re-entrant signal primitive used by the toolkit hub.
//!
//! Toolkit notifications are delivered synchronously from inside toolkit
//! code, and a handler may itself cause another emission (or connect and
//! disconnect slots) before it returns. [`Signal::emit`] therefore snapshots
//! the connected slots and releases its lock before invoking any of them.
//!
//! # Example
//!
//! ```
//! use horizon_atspi_core::Signal;
//!
//! let name_changed = Signal::<String>::new();
//! let id = name_changed.connect(|name| println!("renamed to {name}"));
//! name_changed.emit(&"OK".to_string());
//! assert!(name_changed.disconnect(id));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Valid until passed to [`Signal::disconnect`] or until the signal
    /// is cleared with [`Signal::disconnect_all`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// Slots are invoked in connection order on the emitting thread.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot and return its connection ID.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether `id` is still connected.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(id)
    }

    /// Block or unblock emission.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking every slot connected at the time of the call.
    ///
    /// Returns the number of slots invoked.
    #[tracing::instrument(skip_all, target = "horizon_atspi_core::signal", level = "trace")]
    pub fn emit(&self, args: &Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: "horizon_atspi_core::signal", "signal blocked, skipping emit");
            return 0;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: "horizon_atspi_core::signal", connection_count = slots.len(), "emitting signal");

        for slot in &slots {
            slot(args);
        }
        slots.len()
    }
}

static_assertions::assert_impl_all!(Signal<String>: Send, Sync);
