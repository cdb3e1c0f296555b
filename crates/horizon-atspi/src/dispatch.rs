//! Event envelopes and their dispatch as bus signals.
//!
//! An [`Envelope`] is the uniform shape every toolkit notification is
//! normalized into. [`EventDispatcher::emit_event`] resolves the source's
//! object path, derives the signal member from the major name, encodes the
//! payload, appends a reference to the application root and sends the frame.
//!
//! Emission is fire-and-forget: a frame the bus refuses is dropped and only
//! logged.

use std::sync::Arc;

use horizon_atspi_core::AccessibleRef;

use crate::bus::{Bus, EventBody, SignalFrame};
use crate::logging::{span_names, targets};
use crate::marshal::{EventValue, ObjectReference, marshal};
use crate::names::event;
use crate::registry::ObjectRegistry;

/// Member of the children-changed signal. Events with this member never
/// refresh the source's lease.
pub const CHILDREN_CHANGED_MEMBER: &str = "ChildrenChanged";

/// Broad category of an event, selecting the signal interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EventInterface {
    #[default]
    Object,
    Window,
    Document,
    Focus,
}

impl EventInterface {
    /// D-Bus interface name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => event::OBJECT,
            Self::Window => event::WINDOW,
            Self::Document => event::DOCUMENT,
            Self::Focus => event::FOCUS,
        }
    }
}

/// A normalized event, ready for dispatch.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub interface: EventInterface,
    /// Base name, e.g. `state-changed`. Becomes the signal member.
    pub major: String,
    /// Qualifier such as a property or state name. `None` is sent as `""`.
    pub minor: Option<String>,
    pub detail1: i32,
    pub detail2: i32,
    pub value: EventValue,
}

impl Envelope {
    /// Create an envelope with empty minor, zero details and no payload.
    pub fn new(interface: EventInterface, major: impl Into<String>) -> Self {
        Self {
            interface,
            major: major.into(),
            ..Self::default()
        }
    }

    /// Set the minor name.
    pub fn minor(mut self, minor: impl Into<String>) -> Self {
        self.minor = Some(minor.into());
        self
    }

    /// Set the minor name from an optional value.
    pub fn minor_opt(mut self, minor: Option<impl Into<String>>) -> Self {
        self.minor = minor.map(Into::into);
        self
    }

    /// Set both detail fields.
    pub fn details(mut self, detail1: i32, detail2: i32) -> Self {
        self.detail1 = detail1;
        self.detail2 = detail2;
        self
    }

    /// Set the payload.
    pub fn value(mut self, value: EventValue) -> Self {
        self.value = value;
        self
    }

    /// Signal member this envelope is sent as.
    pub fn member(&self) -> String {
        signal_name_to_dbus(&self.major)
    }
}

/// Convert a kebab-case signal name into a D-Bus member name.
///
/// The first character is upper-cased; every hyphen is removed and the
/// character following it upper-cased. `"state-changed"` becomes
/// `"StateChanged"`. Already converted names come back unchanged.
pub fn signal_name_to_dbus(name: &str) -> String {
    let mut member = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            member.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            member.push(c);
        }
    }
    member
}

/// Sends envelopes on the shared bus.
pub struct EventDispatcher {
    bus: Arc<dyn Bus>,
    registry: Arc<dyn ObjectRegistry>,
    root: AccessibleRef,
}

impl EventDispatcher {
    /// Create a dispatcher announcing events on behalf of `root`.
    pub fn new(bus: Arc<dyn Bus>, registry: Arc<dyn ObjectRegistry>, root: AccessibleRef) -> Self {
        Self {
            bus,
            registry,
            root,
        }
    }

    /// The application root.
    pub fn root(&self) -> &AccessibleRef {
        &self.root
    }

    /// Client-visible reference to `object`, or the null reference.
    pub fn reference(&self, object: Option<&AccessibleRef>) -> ObjectReference {
        let name = self.bus.unique_name();
        match object {
            Some(object) => ObjectReference::new(name, self.registry.path_for(object)),
            None => ObjectReference::null(name),
        }
    }

    /// Build the frame for `envelope` raised by `source`.
    pub fn frame(&self, source: &AccessibleRef, envelope: &Envelope) -> SignalFrame {
        let value = marshal(&envelope.value, |object| self.reference(object));
        SignalFrame {
            path: self.registry.path_for(source),
            interface: envelope.interface.as_str(),
            member: envelope.member(),
            body: EventBody {
                minor: envelope.minor.clone().unwrap_or_default(),
                detail1: envelope.detail1,
                detail2: envelope.detail2,
                value,
                announcer: self.reference(Some(&self.root)),
            },
        }
    }

    /// Send `envelope` as a signal from `source`.
    ///
    /// Unless the member is `ChildrenChanged`, the source's lease is
    /// refreshed afterwards, whether or not the send succeeded.
    pub fn emit_event(&self, source: &AccessibleRef, envelope: &Envelope) {
        let span = tracing::trace_span!(span_names::EMIT, major = %envelope.major);
        let _enter = span.enter();

        let frame = self.frame(source, envelope);
        tracing::trace!(
            target: targets::DISPATCH,
            path = frame.path.as_str(),
            interface = frame.interface,
            member = %frame.member,
            minor = %frame.body.minor,
            detail1 = frame.body.detail1,
            detail2 = frame.body.detail2,
            "emitting event"
        );

        if let Err(err) = self.bus.emit_signal(&frame) {
            tracing::debug!(
                target: targets::DISPATCH,
                member = %frame.member,
                error = %err,
                "event dropped"
            );
        }

        if frame.member != CHILDREN_CHANGED_MEMBER {
            self.registry.lease_if_needed(source);
        }
    }
}

static_assertions::assert_impl_all!(EventDispatcher: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Payload;
    use crate::names::{NULL_PATH, ROOT_PATH};
    use crate::registry::AccessibleRegister;
    use crate::testing::{RecordingBus, TestNode};
    use horizon_atspi_core::Role;
    use std::time::Duration;

    fn dispatcher() -> (EventDispatcher, Arc<RecordingBus>, Arc<AccessibleRegister>) {
        let bus = RecordingBus::new();
        let root: AccessibleRef = TestNode::new(Role::Application).build();
        let registry = Arc::new(AccessibleRegister::new(&root, Duration::from_secs(15)));
        let dispatcher = EventDispatcher::new(bus.clone(), registry.clone(), root);
        (dispatcher, bus, registry)
    }

    #[test]
    fn test_member_transform() {
        assert_eq!(signal_name_to_dbus("state-change"), "StateChange");
        assert_eq!(signal_name_to_dbus("children-changed"), "ChildrenChanged");
        assert_eq!(signal_name_to_dbus("a"), "A");
        assert_eq!(signal_name_to_dbus(""), "");
        assert_eq!(signal_name_to_dbus("load-complete"), "LoadComplete");
        assert_eq!(signal_name_to_dbus("PropertyChange"), "PropertyChange");
    }

    #[test]
    fn test_member_transform_is_idempotent() {
        for name in [
            "state-changed",
            "text-caret-moved",
            "a",
            "x-",
            "-leading",
            "double--hyphen",
        ] {
            let once = signal_name_to_dbus(name);
            assert_eq!(signal_name_to_dbus(&once), once, "for {name}");
        }
    }

    #[test]
    fn test_frame_layout() {
        let (dispatcher, bus, _) = dispatcher();
        let source: AccessibleRef = TestNode::new(Role::CheckBox).build();

        let envelope = Envelope::new(EventInterface::Object, "state-changed")
            .minor("checked")
            .details(1, 0);
        dispatcher.emit_event(&source, &envelope);

        let frames = bus.frames();
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.interface, "org.a11y.atspi.Event.Object");
        assert_eq!(frame.member, "StateChanged");
        assert_eq!(frame.body.minor, "checked");
        assert_eq!((frame.body.detail1, frame.body.detail2), (1, 0));
        assert_eq!(frame.body.value, Payload::Int32(0));
        assert_eq!(frame.body.announcer.path.as_str(), ROOT_PATH);
        assert_eq!(frame.body.announcer.name, bus.unique_name());
        assert_ne!(frame.path.as_str(), ROOT_PATH);
    }

    #[test]
    fn test_missing_minor_is_empty() {
        let (dispatcher, bus, _) = dispatcher();
        let source: AccessibleRef = TestNode::new(Role::Frame).build();

        dispatcher.emit_event(&source, &Envelope::new(EventInterface::Window, "create"));
        assert_eq!(bus.frames()[0].body.minor, "");
    }

    #[test]
    fn test_null_reference_payload() {
        let (dispatcher, bus, _) = dispatcher();
        let source: AccessibleRef = TestNode::new(Role::List).build();

        let envelope = Envelope::new(EventInterface::Object, "children-changed")
            .minor("remove")
            .value(EventValue::reference(None));
        dispatcher.emit_event(&source, &envelope);

        let reference = bus.frames()[0].body.value.as_reference().cloned().unwrap();
        assert_eq!(reference.path.as_str(), NULL_PATH);
    }

    #[test]
    fn test_children_changed_is_not_leased() {
        let (dispatcher, _, registry) = dispatcher();
        let source: AccessibleRef = TestNode::new(Role::List).build();

        dispatcher.emit_event(
            &source,
            &Envelope::new(EventInterface::Object, "children-changed").minor("add"),
        );
        assert_eq!(registry.lease_count(), 0);

        dispatcher.emit_event(
            &source,
            &Envelope::new(EventInterface::Object, "visible-data-changed"),
        );
        assert!(registry.is_leased(&source));
    }

    #[test]
    fn test_send_failure_is_swallowed() {
        let (dispatcher, bus, registry) = dispatcher();
        let source: AccessibleRef = TestNode::new(Role::Label).build();
        bus.set_failing(true);

        dispatcher.emit_event(&source, &Envelope::new(EventInterface::Focus, "focus"));
        assert!(bus.frames().is_empty());
        assert!(registry.is_leased(&source));
    }
}
