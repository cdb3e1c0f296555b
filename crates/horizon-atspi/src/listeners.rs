//! Registration of the bridge's toolkit listeners.
//!
//! The bridge hooks into the toolkit with one global listener per
//! notification type in [`EVENT_LISTENERS`], plus a focus tracker and a key
//! snooper whose removal APIs differ from the generic one. The
//! [`ListenerRegistry`] owns every handle it gets back, so teardown can
//! remove exactly what was installed.

use std::sync::Arc;

use horizon_atspi_core::{AccessibleRef, KeyEventStruct, ListenerId, Notification, Toolkit};
use parking_lot::Mutex;

use crate::dispatch::EventDispatcher;
use crate::error::{BridgeError, Result};
use crate::keyboard::KeyEventAdapter;
use crate::logging::targets;
use crate::normalize::{self, Normalized, NotificationKind};

/// Toolkit notification types the bridge listens to, with their handler.
pub const EVENT_LISTENERS: &[(&str, NotificationKind)] = &[
    ("Gtk:AtkObject:property-change", NotificationKind::PropertyChange),
    ("window:create", NotificationKind::Window),
    ("window:destroy", NotificationKind::Window),
    ("window:minimize", NotificationKind::Window),
    ("window:maximize", NotificationKind::Window),
    ("window:restore", NotificationKind::Window),
    ("window:activate", NotificationKind::Window),
    ("window:deactivate", NotificationKind::Window),
    ("Gtk:AtkDocument:load-complete", NotificationKind::Document),
    ("Gtk:AtkDocument:reload", NotificationKind::Document),
    ("Gtk:AtkDocument:load-stopped", NotificationKind::Document),
    ("Gtk:AtkObject:state-change", NotificationKind::StateChange),
    ("Gtk:AtkObject:active-descendant-changed", NotificationKind::ActiveDescendant),
    ("Gtk:AtkComponent:bounds-changed", NotificationKind::Bounds),
    ("Gtk:AtkText:text-selection-changed", NotificationKind::TextSelectionChanged),
    ("Gtk:AtkText:text-changed", NotificationKind::TextChanged),
    ("Gtk:AtkHypertext:link-selected", NotificationKind::LinkSelected),
    ("Gtk:AtkObject:visible-data-changed", NotificationKind::Generic),
    ("Gtk:AtkSelection:selection-changed", NotificationKind::Generic),
    ("Gtk:AtkText:text-attributes-changed", NotificationKind::Generic),
    ("Gtk:AtkText:text-caret-moved", NotificationKind::Generic),
    ("Gtk:AtkTable:row-inserted", NotificationKind::Generic),
    ("Gtk:AtkTable:row-reordered", NotificationKind::Generic),
    ("Gtk:AtkTable:row-deleted", NotificationKind::Generic),
    ("Gtk:AtkTable:column-inserted", NotificationKind::Generic),
    ("Gtk:AtkTable:column-reordered", NotificationKind::Generic),
    ("Gtk:AtkTable:column-deleted", NotificationKind::Generic),
    ("Gtk:AtkTable:model-changed", NotificationKind::Generic),
    ("Gtk:AtkObject:children-changed", NotificationKind::ChildrenChanged),
];

#[derive(Default)]
struct Registrations {
    active: bool,
    listeners: Vec<(&'static str, ListenerId)>,
    focus_tracker: Option<ListenerId>,
    key_listener: Option<ListenerId>,
}

/// Owns the bridge's toolkit subscriptions.
pub struct ListenerRegistry {
    toolkit: Arc<dyn Toolkit>,
    dispatcher: Arc<EventDispatcher>,
    keyboard: Option<Arc<KeyEventAdapter>>,
    registrations: Mutex<Registrations>,
}

impl ListenerRegistry {
    /// Create a registry. Key events are only snooped when `keyboard` is set.
    pub fn new(
        toolkit: Arc<dyn Toolkit>,
        dispatcher: Arc<EventDispatcher>,
        keyboard: Option<Arc<KeyEventAdapter>>,
    ) -> Self {
        Self {
            toolkit,
            dispatcher,
            keyboard,
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Install every listener.
    ///
    /// Fails with [`BridgeError::AlreadyRegistered`] if listeners are
    /// already installed. A listener the toolkit refuses is logged and
    /// skipped; the rest are still installed.
    #[tracing::instrument(skip(self), target = "horizon_atspi::listeners", level = "trace")]
    pub fn register_all(&self) -> Result<()> {
        let mut registrations = self.registrations.lock();
        if registrations.active {
            tracing::warn!(target: targets::LISTENERS, "event listeners already registered");
            return Err(BridgeError::AlreadyRegistered);
        }

        let dispatcher = self.dispatcher.clone();
        registrations.focus_tracker = Some(self.toolkit.add_focus_tracker(Arc::new(
            move |object: &AccessibleRef| {
                let event = normalize::focus(object);
                dispatcher.emit_event(&event.source, &event.envelope);
            },
        )));

        for &(event_type, kind) in EVENT_LISTENERS {
            let dispatcher = self.dispatcher.clone();
            let listener = Arc::new(move |notification: &Notification| {
                forward(&dispatcher, kind.normalize(notification));
                true
            });
            match self.toolkit.add_global_event_listener(event_type, listener) {
                Ok(id) => registrations.listeners.push((event_type, id)),
                Err(err) => tracing::warn!(
                    target: targets::LISTENERS,
                    event_type,
                    error = %err,
                    "toolkit refused listener"
                ),
            }
        }

        if let Some(keyboard) = &self.keyboard {
            let keyboard = keyboard.clone();
            registrations.key_listener = Some(self.toolkit.add_key_event_listener(Arc::new(
                move |event: &KeyEventStruct| keyboard.handle(event),
            )));
        }

        registrations.active = true;
        tracing::debug!(
            target: targets::LISTENERS,
            count = registrations.listeners.len(),
            "event listeners registered"
        );
        Ok(())
    }

    /// Remove every installed listener. Does nothing if none are installed.
    ///
    /// Every removal is attempted; failures are logged, never returned.
    pub fn deregister_all(&self) {
        let registrations = std::mem::take(&mut *self.registrations.lock());
        if !registrations.active {
            tracing::trace!(target: targets::LISTENERS, "no event listeners to remove");
            return;
        }

        if let Some(id) = registrations.focus_tracker {
            if let Err(err) = self.toolkit.remove_focus_tracker(id) {
                tracing::warn!(target: targets::LISTENERS, error = %err, "failed to remove focus tracker");
            }
        }

        for (event_type, id) in registrations.listeners {
            if let Err(err) = self.toolkit.remove_global_event_listener(id) {
                tracing::warn!(
                    target: targets::LISTENERS,
                    event_type,
                    error = %err,
                    "failed to remove listener"
                );
            }
        }

        if let Some(id) = registrations.key_listener {
            if let Err(err) = self.toolkit.remove_key_event_listener(id) {
                tracing::warn!(target: targets::LISTENERS, error = %err, "failed to remove key listener");
            }
        }

        tracing::debug!(target: targets::LISTENERS, "event listeners removed");
    }

    /// Whether listeners are installed.
    pub fn is_registered(&self) -> bool {
        self.registrations.lock().active
    }

    /// Number of global event listeners installed.
    pub fn listener_count(&self) -> usize {
        self.registrations.lock().listeners.len()
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        self.deregister_all();
    }
}

fn forward(dispatcher: &EventDispatcher, event: Option<Normalized>) {
    if let Some(event) = event {
        dispatcher.emit_event(&event.source, &event.envelope);
    }
}

static_assertions::assert_impl_all!(ListenerRegistry: Send, Sync);
