//! Global listener API of the toolkit.
//!
//! The bridge never connects to individual objects. It installs process-wide
//! hooks: one global listener per notification type (`"Gtk:AtkObject:state-change"`,
//! `"window:create"`, ...), a focus tracker and a key snooper. The [`Toolkit`]
//! trait is that API; [`ToolkitHub`] is an in-process implementation built on
//! [`Signal`], used by toolkits that route their accessibility notifications
//! through it and by tests.
//!
//! # Event type strings
//!
//! Event types have the form `Toolkit:Type:signal` (three parts) or
//! `window:signal` (two parts). The signal part is matched against the
//! emission's signal name, so the hub keys listeners by the full string.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, ToolkitError};
use crate::notification::{KeyEventStruct, Notification};
use crate::object::AccessibleRef;
use crate::signal::{ConnectionId, Signal};

new_key_type! {
    /// Handle returned when installing a toolkit listener.
    pub struct ListenerId;
}

/// Global event listener. The return value is ignored by the hub.
pub type EventListener = Arc<dyn Fn(&Notification) -> bool + Send + Sync>;

/// Focus tracker, called with the newly focused object.
pub type FocusTracker = Arc<dyn Fn(&AccessibleRef) + Send + Sync>;

/// Key snooper. Returns `true` if the key event was consumed.
pub type KeySnooper = Arc<dyn Fn(&KeyEventStruct) -> bool + Send + Sync>;

/// Process-wide listener API of an accessibility toolkit.
pub trait Toolkit: Send + Sync {
    /// Install a global listener for `event_type`.
    fn add_global_event_listener(
        &self,
        event_type: &str,
        listener: EventListener,
    ) -> Result<ListenerId>;

    /// Remove a global listener.
    fn remove_global_event_listener(&self, id: ListenerId) -> Result<()>;

    /// Install a focus tracker.
    fn add_focus_tracker(&self, tracker: FocusTracker) -> ListenerId;

    /// Remove a focus tracker.
    fn remove_focus_tracker(&self, id: ListenerId) -> Result<()>;

    /// Install a key snooper.
    fn add_key_event_listener(&self, listener: KeySnooper) -> ListenerId;

    /// Remove a key snooper.
    fn remove_key_event_listener(&self, id: ListenerId) -> Result<()>;

    /// Root of the accessibility tree (the application object).
    fn root(&self) -> AccessibleRef;
}

/// Validate an event type string.
pub fn validate_event_type(event_type: &str) -> Result<()> {
    let parts: Vec<&str> = event_type.split(':').collect();
    let valid = match parts.as_slice() {
        [toolkit, signal] => !toolkit.is_empty() && !signal.is_empty(),
        [toolkit, type_name, signal] => {
            !toolkit.is_empty() && !type_name.is_empty() && !signal.is_empty()
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ToolkitError::InvalidEventType(event_type.to_string()))
    }
}

struct GlobalListener {
    event_type: String,
    connection: ConnectionId,
}

/// In-process [`Toolkit`] implementation.
///
/// Notifications are routed with [`emit`](Self::emit), focus changes with
/// [`emit_focus`](Self::emit_focus) and key events with
/// [`emit_key_event`](Self::emit_key_event). All delivery is synchronous on
/// the calling thread.
pub struct ToolkitHub {
    root: AccessibleRef,
    signals: Mutex<HashMap<String, Arc<Signal<Notification>>>>,
    listeners: Mutex<SlotMap<ListenerId, GlobalListener>>,
    focus: Signal<AccessibleRef>,
    focus_trackers: Mutex<SlotMap<ListenerId, ConnectionId>>,
    key_listeners: Mutex<SlotMap<ListenerId, KeySnooper>>,
}

impl ToolkitHub {
    /// Create a hub whose tree is rooted at `root`.
    pub fn new(root: AccessibleRef) -> Self {
        Self {
            root,
            signals: Mutex::new(HashMap::new()),
            listeners: Mutex::new(SlotMap::with_key()),
            focus: Signal::new(),
            focus_trackers: Mutex::new(SlotMap::with_key()),
            key_listeners: Mutex::new(SlotMap::with_key()),
        }
    }

    fn signal_for(&self, event_type: &str) -> Option<Arc<Signal<Notification>>> {
        self.signals.lock().get(event_type).cloned()
    }

    /// Deliver `notification` to every listener installed for `event_type`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event_type: &str, notification: &Notification) -> usize {
        match self.signal_for(event_type) {
            Some(signal) => signal.emit(notification),
            None => 0,
        }
    }

    /// Report a focus change to every focus tracker.
    pub fn emit_focus(&self, object: &AccessibleRef) -> usize {
        self.focus.emit(object)
    }

    /// Offer a key event to every key snooper.
    ///
    /// Returns `true` if any snooper consumed it. Every snooper is called
    /// even after one has consumed the event.
    pub fn emit_key_event(&self, event: &KeyEventStruct) -> bool {
        let snoopers: Vec<KeySnooper> = self.key_listeners.lock().values().cloned().collect();
        snoopers
            .iter()
            .fold(false, |consumed, snooper| snooper(event) || consumed)
    }

    /// Number of global listeners installed across all event types.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Number of global listeners installed for `event_type`.
    pub fn listener_count_for(&self, event_type: &str) -> usize {
        self.signal_for(event_type)
            .map_or(0, |signal| signal.connection_count())
    }

    /// Number of focus trackers installed.
    pub fn focus_tracker_count(&self) -> usize {
        self.focus_trackers.lock().len()
    }

    /// Number of key snoopers installed.
    pub fn key_listener_count(&self) -> usize {
        self.key_listeners.lock().len()
    }
}

impl Toolkit for ToolkitHub {
    fn add_global_event_listener(
        &self,
        event_type: &str,
        listener: EventListener,
    ) -> Result<ListenerId> {
        validate_event_type(event_type)?;

        let signal = self
            .signals
            .lock()
            .entry(event_type.to_string())
            .or_insert_with(|| Arc::new(Signal::new()))
            .clone();
        let connection = signal.connect(move |notification| {
            listener(notification);
        });

        let id = self.listeners.lock().insert(GlobalListener {
            event_type: event_type.to_string(),
            connection,
        });
        tracing::trace!(target: "horizon_atspi_core::toolkit", event_type, "global listener added");
        Ok(id)
    }

    fn remove_global_event_listener(&self, id: ListenerId) -> Result<()> {
        let listener = self
            .listeners
            .lock()
            .remove(id)
            .ok_or(ToolkitError::UnknownListener)?;
        if let Some(signal) = self.signal_for(&listener.event_type) {
            signal.disconnect(listener.connection);
        }
        tracing::trace!(
            target: "horizon_atspi_core::toolkit",
            event_type = %listener.event_type,
            "global listener removed"
        );
        Ok(())
    }

    fn add_focus_tracker(&self, tracker: FocusTracker) -> ListenerId {
        let connection = self.focus.connect(move |object| tracker(object));
        self.focus_trackers.lock().insert(connection)
    }

    fn remove_focus_tracker(&self, id: ListenerId) -> Result<()> {
        let connection = self
            .focus_trackers
            .lock()
            .remove(id)
            .ok_or(ToolkitError::UnknownListener)?;
        self.focus.disconnect(connection);
        Ok(())
    }

    fn add_key_event_listener(&self, listener: KeySnooper) -> ListenerId {
        self.key_listeners.lock().insert(listener)
    }

    fn remove_key_event_listener(&self, id: ListenerId) -> Result<()> {
        self.key_listeners
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or(ToolkitError::UnknownListener)
    }

    fn root(&self) -> AccessibleRef {
        self.root.clone()
    }
}

static_assertions::assert_impl_all!(ToolkitHub: Send, Sync);
