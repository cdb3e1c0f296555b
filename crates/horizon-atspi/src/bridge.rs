//! The bridge facade.
//!
//! [`Bridge`] wires the pieces together for one application: the reference
//! register, the dispatcher, the synchronous call channel, the key event
//! adapter and the listener registry.
//!
//! ```ignore
//! let context = MainContext::new();
//! let bridge = Bridge::connect(toolkit, context.clone(), BridgeConfig::from_env())?;
//! bridge.register_event_listeners()?;
//! // ... run the application's main loop on `context` ...
//! bridge.shutdown();
//! ```

use std::sync::Arc;
use std::time::Instant;

use horizon_atspi_core::{AccessibleRef, KeyEventStruct, MainContext, Toolkit};

use crate::bus::{Bus, ZbusBus};
use crate::config::BridgeConfig;
use crate::dispatch::EventDispatcher;
use crate::error::Result;
use crate::keyboard::KeyEventAdapter;
use crate::listeners::ListenerRegistry;
use crate::logging::targets;
use crate::normalize::{self, Normalized};
use crate::reentrant::ReentrantCallChannel;
use crate::registry::AccessibleRegister;

/// Accessibility bridge for one application.
///
/// # Toplevel windows
///
/// A toolkit that reports `children-changed::add` and
/// `children-changed::remove` on the root accessible needs nothing more:
/// the registered listeners forward them as toplevel window announcements.
/// A host whose windows come and go outside the toolkit's notifications
/// calls [`toplevel_added`](Self::toplevel_added) and
/// [`toplevel_removed`](Self::toplevel_removed) itself. The frames are the
/// same either way.
pub struct Bridge {
    config: BridgeConfig,
    toolkit: Arc<dyn Toolkit>,
    register: Arc<AccessibleRegister>,
    dispatcher: Arc<EventDispatcher>,
    keyboard: Arc<KeyEventAdapter>,
    listeners: ListenerRegistry,
}

impl Bridge {
    /// Connect to the accessibility bus and build the bridge.
    pub fn connect(
        toolkit: Arc<dyn Toolkit>,
        context: Arc<MainContext>,
        config: BridgeConfig,
    ) -> Result<Self> {
        let bus = Arc::new(ZbusBus::connect(&config)?);
        Ok(Self::new(toolkit, bus, context, config))
    }

    /// Build the bridge over an existing bus.
    pub fn new(
        toolkit: Arc<dyn Toolkit>,
        bus: Arc<dyn Bus>,
        context: Arc<MainContext>,
        config: BridgeConfig,
    ) -> Self {
        let root = toolkit.root();
        let register = Arc::new(AccessibleRegister::new(&root, config.lease_duration()));
        let dispatcher = Arc::new(EventDispatcher::new(bus.clone(), register.clone(), root));
        let channel = Arc::new(ReentrantCallChannel::new(bus.clone(), context, &config));
        let keyboard = Arc::new(KeyEventAdapter::new(channel));
        let listeners =
            ListenerRegistry::new(toolkit.clone(), dispatcher.clone(), Some(keyboard.clone()));

        tracing::debug!(
            target: targets::BRIDGE,
            bus_name = %bus.unique_name(),
            reentry = ?config.reentry,
            "bridge created"
        );

        Self {
            config,
            toolkit,
            register,
            dispatcher,
            keyboard,
            listeners,
        }
    }

    /// The configuration the bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The reference register.
    pub fn register(&self) -> &Arc<AccessibleRegister> {
        &self.register
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Start forwarding toolkit notifications and key events.
    pub fn register_event_listeners(&self) -> Result<()> {
        self.listeners.register_all()
    }

    /// Stop forwarding. Safe to call when nothing is registered.
    pub fn deregister_event_listeners(&self) {
        self.listeners.deregister_all();
    }

    /// Whether listeners are installed.
    pub fn is_registered(&self) -> bool {
        self.listeners.is_registered()
    }

    /// Offer a key event to assistive technologies. Returns whether it was
    /// consumed.
    pub fn key_event(&self, event: &KeyEventStruct) -> bool {
        self.keyboard.handle(event)
    }

    /// Send an already normalized event.
    pub fn emit(&self, event: &Normalized) {
        self.dispatcher.emit_event(&event.source, &event.envelope);
    }

    /// Announce a new toplevel window at `index` under the root. Only needed
    /// for windows the toolkit does not report itself.
    pub fn toplevel_added(&self, index: i32, child: &AccessibleRef) {
        self.emit(&normalize::toplevel_added(&self.toolkit.root(), index, child));
    }

    /// Announce that the toplevel window at `index` was removed.
    pub fn toplevel_removed(&self, index: i32, child: &AccessibleRef) {
        self.emit(&normalize::toplevel_removed(&self.toolkit.root(), index, child));
    }

    /// Retract every toplevel window from clients.
    pub fn tidy_windows(&self) {
        for event in normalize::tidy_windows(&self.toolkit.root()) {
            self.emit(&event);
        }
    }

    /// Drop expired leases. Returns how many were dropped.
    pub fn expire_leases(&self) -> usize {
        self.register.expire_leases(Instant::now())
    }

    /// Retract the windows and remove every listener.
    #[tracing::instrument(skip(self), target = "horizon_atspi::bridge", level = "debug")]
    pub fn shutdown(&self) {
        tracing::debug!(target: targets::BRIDGE, "shutting down bridge");
        self.tidy_windows();
        self.deregister_event_listeners();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Reply, ReplyBody};
    use crate::testing::{RecordingBus, TestNode};
    use horizon_atspi_core::{Notification, Param, Role, StateType, ToolkitHub};

    fn bridge() -> (Bridge, Arc<ToolkitHub>, Arc<RecordingBus>) {
        let root = TestNode::new(Role::Application).build();
        let window = TestNode::new(Role::Frame)
            .named("Main")
            .with_states([StateType::Active])
            .build();
        TestNode::add_child(&root, &window);

        let hub = Arc::new(ToolkitHub::new(root));
        let bus = RecordingBus::new();
        let bridge = Bridge::new(
            hub.clone(),
            bus.clone(),
            MainContext::new(),
            BridgeConfig::default(),
        );
        (bridge, hub, bus)
    }

    #[test]
    fn test_key_snooper_round_trip() {
        let (bridge, hub, bus) = bridge();
        bridge.register_event_listeners().unwrap();
        bus.set_reply(Some(Reply::Method(ReplyBody::Bool(true))));

        assert!(hub.emit_key_event(&KeyEventStruct::press(0x61, 38).with_text("a")));
        let calls = bus.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].event.event_string, "a");
        assert!(calls[0].event.is_text);

        bus.set_reply(Some(Reply::Method(ReplyBody::Empty)));
        assert!(!bridge.key_event(&KeyEventStruct::press(0x61, 38)));
    }

    #[test]
    fn test_key_event_without_reply_is_not_consumed() {
        let (bridge, _, bus) = bridge();
        bus.set_failing(true);
        assert!(!bridge.key_event(&KeyEventStruct::press(0xff0d, 36)));
    }

    #[test]
    fn test_shutdown_tidies_and_deregisters() {
        let (bridge, hub, bus) = bridge();
        bridge.register_event_listeners().unwrap();

        bridge.shutdown();
        assert_eq!(bus.members(), vec!["Deactivate", "Destroy"]);
        assert!(!bridge.is_registered());
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.key_listener_count(), 0);
    }

    #[test]
    fn test_toplevel_events_are_not_leased() {
        let (bridge, _hub, bus) = bridge();
        let dialog: AccessibleRef = TestNode::new(Role::Dialog).build();

        bridge.toplevel_added(1, &dialog);
        bridge.toplevel_removed(1, &dialog);

        let frames = bus.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].body.minor, "add");
        assert_eq!(frames[1].body.minor, "remove");
        assert_eq!(bridge.register().lease_count(), 0);
        assert_eq!(frames[0].path.as_str(), crate::names::ROOT_PATH);
    }

    #[test]
    fn test_root_children_changed_matches_toplevel_added() {
        let (bridge, hub, bus) = bridge();
        bridge.register_event_listeners().unwrap();
        let dialog: AccessibleRef = TestNode::new(Role::Dialog).build();

        hub.emit(
            "Gtk:AtkObject:children-changed",
            &Notification::new("children-changed", hub.root())
                .with_detail("add")
                .with_param(Param::UInt(1))
                .with_param(Param::Pointer(Some(dialog.clone()))),
        );
        bridge.toplevel_added(1, &dialog);

        let frames = bus.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0].member, "ChildrenChanged");
        assert_eq!(frames[0].path.as_str(), crate::names::ROOT_PATH);
    }
}
