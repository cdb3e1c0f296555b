//! Event payload encoding.
//!
//! The normalizer describes an event's payload as an [`EventValue`], a small
//! closed set of encoders: a basic scalar, a rectangle, an object reference,
//! or the zero placeholder used when an event carries nothing meaningful.
//! [`marshal`] turns that description into a [`Payload`], the concrete value
//! that goes into the frame's variant slot.
//!
//! Null strings and null object paths never reach the wire. A null string
//! becomes `""`; a null path becomes [`NULL_PATH`], since an empty string is
//! not a valid object path.

use horizon_atspi_core::{AccessibleRef, Rect};
use serde::{Deserialize, Serialize};
use zvariant::{ObjectPath, OwnedObjectPath, Type, Value};

use crate::names::NULL_PATH;

/// Reference to an accessible as seen by clients: the owning connection's
/// bus name plus the object's path. Wire signature `(so)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
pub struct ObjectReference {
    /// Unique bus name of the application.
    pub name: String,
    /// Object path within the application.
    pub path: OwnedObjectPath,
}

impl ObjectReference {
    /// Create a reference.
    pub fn new(name: impl Into<String>, path: OwnedObjectPath) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    /// Reference to no object.
    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, null_path())
    }

    /// Whether this references no object.
    pub fn is_null(&self) -> bool {
        self.path.as_str() == NULL_PATH
    }
}

pub(crate) fn null_path() -> OwnedObjectPath {
    ObjectPath::from_static_str_unchecked(NULL_PATH).into()
}

/// A single basic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicValue {
    Int32(i32),
    UInt32(u32),
    String(Option<String>),
    ObjectPath(Option<OwnedObjectPath>),
}

/// Payload of an event as chosen by the normalizer.
#[derive(Debug, Clone, Default)]
pub enum EventValue {
    /// No meaningful payload. Encoded as int32 zero.
    #[default]
    Placeholder,
    /// A basic scalar.
    Basic(BasicValue),
    /// A rectangle, encoded as `(iiii)`.
    Rect(Rect),
    /// An object reference, encoded as `(so)`. `None` is the null reference.
    Reference(Option<AccessibleRef>),
}

impl EventValue {
    /// A string payload; `None` is sent as `""`.
    pub fn string(value: Option<String>) -> Self {
        Self::Basic(BasicValue::String(value))
    }

    /// An unsigned integer payload.
    pub fn uint(value: u32) -> Self {
        Self::Basic(BasicValue::UInt32(value))
    }

    /// A reference payload.
    pub fn reference(object: Option<AccessibleRef>) -> Self {
        Self::Reference(object)
    }
}

/// Encoded payload, ready to be wrapped in a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Int32(i32),
    UInt32(u32),
    String(String),
    ObjectPath(OwnedObjectPath),
    Rect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Reference(ObjectReference),
}

impl Payload {
    /// D-Bus signature of the value inside the variant.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Int32(_) => "i",
            Self::UInt32(_) => "u",
            Self::String(_) => "s",
            Self::ObjectPath(_) => "o",
            Self::Rect { .. } => "(iiii)",
            Self::Reference(_) => "(so)",
        }
    }

    /// Build the variant content.
    pub fn to_variant(&self) -> Value<'static> {
        match self {
            Self::Int32(value) => Value::I32(*value),
            Self::UInt32(value) => Value::U32(*value),
            Self::String(value) => Value::from(value.clone()),
            Self::ObjectPath(path) => Value::ObjectPath(path.clone().into_inner()),
            Self::Rect {
                x,
                y,
                width,
                height,
            } => Value::from((*x, *y, *width, *height)),
            Self::Reference(reference) => {
                Value::from((reference.name.clone(), reference.path.clone().into_inner()))
            }
        }
    }

    /// String content, if this is a string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Reference content, if this is a reference payload.
    pub fn as_reference(&self) -> Option<&ObjectReference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Encode a basic value.
pub fn marshal_basic(value: &BasicValue) -> Payload {
    match value {
        BasicValue::Int32(value) => Payload::Int32(*value),
        BasicValue::UInt32(value) => Payload::UInt32(*value),
        BasicValue::String(value) => Payload::String(value.clone().unwrap_or_default()),
        BasicValue::ObjectPath(path) => {
            Payload::ObjectPath(path.clone().unwrap_or_else(null_path))
        }
    }
}

/// Encode an event value. `resolve` turns an object (or none) into its
/// client-visible reference.
pub fn marshal<F>(value: &EventValue, resolve: F) -> Payload
where
    F: FnOnce(Option<&AccessibleRef>) -> ObjectReference,
{
    match value {
        EventValue::Placeholder => Payload::Int32(0),
        EventValue::Basic(basic) => marshal_basic(basic),
        EventValue::Rect(rect) => Payload::Rect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        },
        EventValue::Reference(object) => Payload::Reference(resolve(object.as_ref())),
    }
}
