//! Key event forwarding.
//!
//! Every native key event is offered to the registry's device event
//! controller before the application handles it. The controller answers
//! whether an assistive technology consumed the event; if so the toolkit
//! drops it.

use std::sync::Arc;

use horizon_atspi_core::{KeyEventStruct, KeyEventType};
use serde::{Deserialize, Serialize};
use unicode_general_category::{GeneralCategory, get_general_category};
use zvariant::Type;

use crate::bus::MethodCall;
use crate::logging::targets;
use crate::reentrant::ReentrantCallChannel;

/// Device event type as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventType {
    Pressed,
    Released,
    /// Anything else the toolkit reports. Sent as 0.
    Unknown,
}

impl DeviceEventType {
    /// Wire value.
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Pressed => 0,
            Self::Released => 1,
            Self::Unknown => 0,
        }
    }
}

impl From<KeyEventType> for DeviceEventType {
    fn from(kind: KeyEventType) -> Self {
        match kind {
            KeyEventType::Press => Self::Pressed,
            KeyEventType::Release => Self::Released,
            KeyEventType::Other(_) => Self::Unknown,
        }
    }
}

/// Key event in wire form. Signature `(inuqsbi)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct DeviceEvent {
    /// Key symbol.
    pub id: i32,
    /// Hardware keycode.
    pub hw_code: i16,
    pub timestamp: u32,
    /// Low 16 bits of the modifier state.
    pub modifiers: u16,
    /// Text the key produces, `""` when none.
    pub event_string: String,
    /// Whether `event_string` is a single printable character.
    pub is_text: bool,
    /// [`DeviceEventType`] wire value.
    pub event_type: i32,
}

impl From<&KeyEventStruct> for DeviceEvent {
    fn from(event: &KeyEventStruct) -> Self {
        let (event_string, is_text) = match event.string.as_deref() {
            Some(bytes) => (
                String::from_utf8_lossy(bytes).into_owned(),
                is_printable_char(bytes),
            ),
            None => (String::new(), false),
        };

        Self {
            // Key symbols and hardware codes are reinterpreted, not range-checked.
            id: event.keyval as i32,
            hw_code: event.keycode as i16,
            timestamp: event.timestamp,
            modifiers: (event.state & 0xFFFF) as u16,
            event_string,
            is_text,
            event_type: DeviceEventType::from(event.kind).as_i32(),
        }
    }
}

/// True when `bytes` is valid UTF-8 holding exactly one printable character.
///
/// Control, format, unassigned and surrogate code points are not printable.
pub fn is_printable_char(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => is_printable(c),
        _ => false,
    }
}

fn is_printable(c: char) -> bool {
    !matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Unassigned
            | GeneralCategory::Surrogate
    )
}

/// Offers native key events to the registry and reports whether they were
/// consumed.
pub struct KeyEventAdapter {
    channel: Arc<ReentrantCallChannel>,
}

impl KeyEventAdapter {
    /// Create an adapter sending through `channel`.
    pub fn new(channel: Arc<ReentrantCallChannel>) -> Self {
        Self { channel }
    }

    /// Forward `event` and wait for the verdict. Any failure counts as not
    /// consumed.
    #[tracing::instrument(skip_all, target = "horizon_atspi::keyboard", level = "trace")]
    pub fn handle(&self, event: &KeyEventStruct) -> bool {
        let device_event = DeviceEvent::from(event);
        tracing::trace!(
            target: targets::KEYBOARD,
            id = device_event.id,
            hw_code = device_event.hw_code,
            is_text = device_event.is_text,
            "forwarding key event"
        );

        let consumed = self
            .channel
            .call(MethodCall::notify_listeners_sync(device_event))
            .is_some_and(|reply| reply.consumed());

        tracing::trace!(target: targets::KEYBOARD, consumed, "key event verdict");
        consumed
    }
}
