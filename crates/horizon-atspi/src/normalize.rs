//! Notification normalization.
//!
//! One handler per notification kind turns the toolkit's positional
//! parameter list into an [`Envelope`]. Parameter 0 is always the emitting
//! object. The other positions are fixed per kind:
//!
//! | Kind | Parameters |
//! |------|------------|
//! | property change | 1: [`PropertyValues`] |
//! | state change | 1: state name, 2: new value |
//! | bounds changed | 1: boxed rectangle (optional) |
//! | active descendant | 1: the new descendant |
//! | link selected | 1: link index |
//! | text changed, text selection changed | 1: offset, 2: length |
//! | children changed | 1: index, 2: the child (optional) |
//! | generic | 1, 2: integers, when present |
//!
//! A missing source or a parameter of the wrong kind where one is required
//! is a contract violation by the toolkit: it is logged, asserted in debug
//! builds and the notification is dropped. Optional integers of the wrong
//! type read as 0 and absent strings as `""`.

use horizon_atspi_core::{AccessibleRef, Notification, Param, PropertyValues, StateType};

use crate::dispatch::{Envelope, EventInterface};
use crate::logging::targets;
use crate::marshal::EventValue;

/// Major name of property change events.
pub const PROPERTY_CHANGE: &str = "PropertyChange";
/// Major name of state change events.
pub const STATE_CHANGED: &str = "state-changed";
/// Major name of children change events.
pub const CHILDREN_CHANGED: &str = "children-changed";

/// A normalized notification: who raised it and what to send.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub source: AccessibleRef,
    pub envelope: Envelope,
}

impl Normalized {
    fn new(source: &AccessibleRef, envelope: Envelope) -> Self {
        Self {
            source: source.clone(),
            envelope,
        }
    }
}

/// Notification kinds with a dedicated handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    PropertyChange,
    StateChange,
    Window,
    Document,
    Bounds,
    ActiveDescendant,
    LinkSelected,
    TextChanged,
    TextSelectionChanged,
    ChildrenChanged,
    Generic,
}

impl NotificationKind {
    /// Run the handler for this kind.
    pub fn normalize(self, notification: &Notification) -> Option<Normalized> {
        match self {
            Self::PropertyChange => property_change(notification),
            Self::StateChange => state_change(notification),
            Self::Window => window(notification),
            Self::Document => document(notification),
            Self::Bounds => bounds_changed(notification),
            Self::ActiveDescendant => active_descendant_changed(notification),
            Self::LinkSelected => link_selected(notification),
            Self::TextChanged => text_changed(notification),
            Self::TextSelectionChanged => text_selection_changed(notification),
            Self::ChildrenChanged => children_changed(notification),
            Self::Generic => generic(notification),
        }
    }
}

fn contract_violation(notification: &Notification, problem: &str) {
    tracing::error!(
        target: targets::NORMALIZE,
        signal = %notification.signal_name,
        problem,
        "malformed notification"
    );
    debug_assert!(
        false,
        "malformed {} notification: {problem}",
        notification.signal_name
    );
}

fn source_of(notification: &Notification) -> Option<&AccessibleRef> {
    let source = notification.source();
    if source.is_none() {
        contract_violation(notification, "parameter 0 is not an object");
    }
    source
}

fn int_or_zero(notification: &Notification, index: usize) -> i32 {
    notification.int_param(index).unwrap_or(0)
}

/// Focus moved to `object`.
pub fn focus(object: &AccessibleRef) -> Normalized {
    Normalized::new(object, Envelope::new(EventInterface::Focus, "focus").minor(""))
}

/// `property-change`. Sends the property's new value where one is known.
///
/// Name, description, parent, table summary and header changes are skipped
/// when the new value is absent.
pub fn property_change(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let Some(Param::Property(values)) = notification.param(1) else {
        contract_violation(notification, "parameter 1 is not a property value");
        return None;
    };
    let value = property_value(source, values)?;

    let envelope = Envelope::new(EventInterface::Object, PROPERTY_CHANGE)
        .minor(values.property_name.as_str())
        .value(value);
    Some(Normalized::new(source, envelope))
}

fn property_value(source: &AccessibleRef, values: &PropertyValues) -> Option<EventValue> {
    let index = values
        .new_value
        .as_deref()
        .and_then(Param::as_int)
        .unwrap_or(0);

    let value = match values.property_name.as_str() {
        "accessible-name" => EventValue::string(Some(source.name()?)),
        "accessible-description" => EventValue::string(Some(source.description()?)),
        "accessible-parent" => EventValue::reference(Some(source.parent()?)),
        "accessible-role" => EventValue::uint(source.role().as_u32()),
        "accessible-table-summary" => EventValue::reference(Some(table_of(source)?.summary()?)),
        "accessible-table-column-header" => {
            EventValue::reference(Some(table_of(source)?.column_header(index)?))
        }
        "accessible-table-row-header" => {
            EventValue::reference(Some(table_of(source)?.row_header(index)?))
        }
        "accessible-table-row-description" => {
            EventValue::string(table_of(source)?.row_description(index))
        }
        "accessible-table-column-description" => {
            EventValue::string(table_of(source)?.column_description(index))
        }
        "accessible-table-caption-object" => EventValue::reference(table_of(source)?.caption()),
        _ => EventValue::Placeholder,
    };
    Some(value)
}

fn table_of(source: &AccessibleRef) -> Option<&dyn horizon_atspi_core::Table> {
    let table = source.as_table();
    if table.is_none() {
        tracing::debug!(
            target: targets::NORMALIZE,
            id = %source.id(),
            "table property change on an object without a table"
        );
    }
    table
}

/// `state-change`. Detail 1 is the new value as 0 or 1.
pub fn state_change(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let state = match notification.param(1) {
        Some(Param::Str(name)) => name.clone(),
        _ => {
            contract_violation(notification, "parameter 1 is not a state name");
            return None;
        }
    };
    let enabled = matches!(notification.param(2), Some(Param::Bool(true)));

    let envelope = Envelope::new(EventInterface::Object, STATE_CHANGED)
        .minor_opt(state)
        .details(i32::from(enabled), 0);
    Some(Normalized::new(source, envelope))
}

fn named_lifecycle(notification: &Notification, interface: EventInterface) -> Option<Normalized> {
    let source = source_of(notification)?;
    let envelope = Envelope::new(interface, notification.signal_name.as_str())
        .minor("")
        .value(EventValue::string(source.name()));
    Some(Normalized::new(source, envelope))
}

/// Window lifecycle: create, destroy, minimize, maximize, restore,
/// activate, deactivate. Carries the window's name.
pub fn window(notification: &Notification) -> Option<Normalized> {
    named_lifecycle(notification, EventInterface::Window)
}

/// Document lifecycle: load-complete, reload, load-stopped. Carries the
/// document's name.
pub fn document(notification: &Notification) -> Option<Normalized> {
    named_lifecycle(notification, EventInterface::Document)
}

/// `bounds-changed`. Only sent when the notification carries a rectangle.
pub fn bounds_changed(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let Some(Param::Boxed(rect)) = notification.param(1) else {
        return None;
    };
    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor("")
        .value(EventValue::Rect(*rect));
    Some(Normalized::new(source, envelope))
}

/// `active-descendant-changed`. Detail 1 is the descendant's index in its
/// parent.
pub fn active_descendant_changed(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let Some(child) = notification.param(1).and_then(Param::as_object) else {
        contract_violation(notification, "parameter 1 is not an object");
        return None;
    };
    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor_opt(notification.detail_str())
        .details(child.index_in_parent(), 0)
        .value(EventValue::reference(Some(child.clone())));
    Some(Normalized::new(source, envelope))
}

/// `link-selected`. Detail 1 is the link index.
pub fn link_selected(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor_opt(notification.detail_str())
        .details(int_or_zero(notification, 1), 0);
    Some(Normalized::new(source, envelope))
}

/// `text-changed`. Details are offset and length; the value is the text in
/// that range.
pub fn text_changed(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let offset = int_or_zero(notification, 1);
    let length = int_or_zero(notification, 2);
    let text = source
        .as_text()
        .and_then(|text| text.text(offset, offset.saturating_add(length)));

    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor_opt(notification.detail_str())
        .details(offset, length)
        .value(EventValue::string(text));
    Some(Normalized::new(source, envelope))
}

/// `text-selection-changed`. Details are offset and length; the value is
/// always `""`.
pub fn text_selection_changed(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor_opt(notification.detail_str())
        .details(int_or_zero(notification, 1), int_or_zero(notification, 2))
        .value(EventValue::string(Some(String::new())));
    Some(Normalized::new(source, envelope))
}

/// `children-changed`. Detail 1 is the child's index. The child is taken
/// from the notification, or looked up by index for additions, or sent as
/// the null reference.
pub fn children_changed(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let index = match notification.param(1) {
        Some(Param::UInt(index)) => *index as i32,
        Some(Param::Int(index)) => *index,
        _ => 0,
    };
    let minor = notification.detail_str();

    let child = match notification.param(2).and_then(Param::as_object) {
        Some(child) => Some(child.clone()),
        None if minor == Some("add") => source.child_at(index),
        None => None,
    };

    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor_opt(minor)
        .details(index, 0)
        .value(EventValue::reference(child));
    Some(Normalized::new(source, envelope))
}

/// Everything else: visible-data-changed, selection-changed,
/// text-attributes-changed, text-caret-moved and the table row/column
/// signals. Integer parameters 1 and 2 become the details.
pub fn generic(notification: &Notification) -> Option<Normalized> {
    let source = source_of(notification)?;
    let envelope = Envelope::new(EventInterface::Object, notification.signal_name.as_str())
        .minor("")
        .details(int_or_zero(notification, 1), int_or_zero(notification, 2));
    Some(Normalized::new(source, envelope))
}

fn toplevel(root: &AccessibleRef, minor: &str, index: i32, child: &AccessibleRef) -> Normalized {
    let envelope = Envelope::new(EventInterface::Object, CHILDREN_CHANGED)
        .minor(minor)
        .details(index, 0)
        .value(EventValue::reference(Some(child.clone())));
    Normalized::new(root, envelope)
}

/// A toplevel window was added under `root` at `index`.
pub fn toplevel_added(root: &AccessibleRef, index: i32, child: &AccessibleRef) -> Normalized {
    toplevel(root, "add", index, child)
}

/// A toplevel window was removed from `root` at `index`.
pub fn toplevel_removed(root: &AccessibleRef, index: i32, child: &AccessibleRef) -> Normalized {
    toplevel(root, "remove", index, child)
}

/// Events that retract every toplevel window of `root`: `deactivate` for an
/// active window, then `destroy`.
pub fn tidy_windows(root: &AccessibleRef) -> Vec<Normalized> {
    let mut events = Vec::new();
    for index in 0..root.child_count() {
        let Some(window) = root.child_at(index) else {
            continue;
        };
        let name = window.name();
        if window.state_set().contains(StateType::Active) {
            events.push(Normalized::new(
                &window,
                Envelope::new(EventInterface::Window, "deactivate")
                    .value(EventValue::string(name.clone())),
            ));
        }
        events.push(Normalized::new(
            &window,
            Envelope::new(EventInterface::Window, "destroy").value(EventValue::string(name)),
        ));
    }
    events
}
