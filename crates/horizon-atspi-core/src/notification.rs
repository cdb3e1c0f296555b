//! Toolkit notifications delivered to global event listeners.
//!
//! A [`Notification`] mirrors a toolkit signal emission: the signal's base
//! name, an optional detail quark (`"add"` in `children-changed::add`), and
//! the positional parameter list. Parameter 0 is always the emitting object;
//! the meaning of the remaining positions is fixed per signal.

use crate::object::{AccessibleRef, Rect};

/// One positional parameter of a toolkit signal emission.
#[derive(Debug, Clone)]
pub enum Param {
    /// A typed object reference (the emitter, parameter 0).
    Object(AccessibleRef),
    /// An untyped pointer that may or may not point to an accessible object.
    Pointer(Option<AccessibleRef>),
    /// A signed integer.
    Int(i32),
    /// An unsigned integer.
    UInt(u32),
    /// A boolean.
    Bool(bool),
    /// A string, possibly null.
    Str(Option<String>),
    /// A boxed rectangle.
    Boxed(Rect),
    /// Property-change values.
    Property(PropertyValues),
}

impl Param {
    /// The integer value, if this is an `Int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The object, if this is an `Object` or a `Pointer` to an accessible.
    pub fn as_object(&self) -> Option<&AccessibleRef> {
        match self {
            Self::Object(object) => Some(object),
            Self::Pointer(pointer) => pointer.as_ref(),
            _ => None,
        }
    }
}

/// Payload of a `property-change` emission.
#[derive(Debug, Clone)]
pub struct PropertyValues {
    /// Kebab-case property name, e.g. `accessible-name`.
    pub property_name: String,
    /// The new value, when the toolkit supplies one (table header indices).
    pub new_value: Option<Box<Param>>,
}

impl PropertyValues {
    /// Property change without a new value.
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            new_value: None,
        }
    }

    /// Attach a new value.
    pub fn with_new_value(mut self, value: Param) -> Self {
        self.new_value = Some(Box::new(value));
        self
    }
}

/// A toolkit signal emission as seen by a global event listener.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Base signal name, e.g. `children-changed`.
    pub signal_name: String,
    /// Detail quark, e.g. `add`.
    pub detail: Option<String>,
    /// Positional parameters; index 0 is the emitter.
    pub params: Vec<Param>,
}

impl Notification {
    /// Create a notification emitted by `source`.
    pub fn new(signal_name: impl Into<String>, source: AccessibleRef) -> Self {
        Self {
            signal_name: signal_name.into(),
            detail: None,
            params: vec![Param::Object(source)],
        }
    }

    /// Set the detail quark.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Append a positional parameter.
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// The emitting object (parameter 0).
    pub fn source(&self) -> Option<&AccessibleRef> {
        match self.params.first() {
            Some(Param::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    /// Integer parameter at `index`, or `None` if absent or of another type.
    pub fn int_param(&self, index: usize) -> Option<i32> {
        self.param(index).and_then(Param::as_int)
    }

    /// The detail quark as a string slice.
    pub fn detail_str(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Kind of a native key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventType {
    /// Key pressed.
    Press,
    /// Key released.
    Release,
    /// Any other native event kind.
    Other(i32),
}

/// A native key event, as handed to key snoopers by the toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEventStruct {
    /// Event kind.
    pub kind: KeyEventType,
    /// Modifier state mask.
    pub state: u32,
    /// Key symbol value.
    pub keyval: u32,
    /// Raw text bytes produced by the key, if any. Not guaranteed to be UTF-8.
    pub string: Option<Vec<u8>>,
    /// Hardware keycode.
    pub keycode: u16,
    /// Event time in milliseconds.
    pub timestamp: u32,
}

impl KeyEventStruct {
    /// A key press without text.
    pub fn press(keyval: u32, keycode: u16) -> Self {
        Self {
            kind: KeyEventType::Press,
            state: 0,
            keyval,
            string: None,
            keycode,
            timestamp: 0,
        }
    }

    /// Set the produced text.
    pub fn with_text(mut self, text: &str) -> Self {
        self.string = Some(text.as_bytes().to_vec());
        self
    }
}
