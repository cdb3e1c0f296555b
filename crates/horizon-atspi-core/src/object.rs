//! Read-only view of the toolkit's accessible object tree.
//!
//! The bridge never mutates toolkit objects. Everything it needs is expressed
//! through the [`Accessible`] capability trait and the optional [`Text`] and
//! [`Table`] interfaces that an object may expose.
//!
//! # Key Types
//!
//! - [`Accessible`] - Capability interface implemented by toolkit objects
//! - [`AccessibleRef`] - Shared handle passed around in notifications
//! - [`AccessibleId`] - Stable in-process identity of an object
//! - [`Role`] - Accessibility role, transmitted as its numeric value
//! - [`StateSet`] - Set of [`StateType`] flags
//! - [`Rect`] - Screen rectangle carried by bounds notifications

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared handle to an accessible object.
pub type AccessibleRef = Arc<dyn Accessible>;

/// Stable in-process identity of an accessible object.
///
/// Two handles refer to the same object iff their IDs are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessibleId(u64);

static NEXT_ACCESSIBLE_ID: AtomicU64 = AtomicU64::new(1);

impl AccessibleId {
    /// Allocate a fresh, process-unique ID.
    pub fn next() -> Self {
        Self(NEXT_ACCESSIBLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an ID from a raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 value of this ID.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccessibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability interface over a node of the toolkit's accessibility tree.
///
/// All accessors are read-only. Accessors returning `Option` may legitimately
/// return `None` (an unnamed widget, a detached node); the bridge normalizes
/// those to empty values before anything reaches the wire.
pub trait Accessible: Send + Sync + fmt::Debug {
    /// Stable identity of this object.
    fn id(&self) -> AccessibleId;

    /// Accessible name, if any.
    fn name(&self) -> Option<String>;

    /// Accessible description, if any.
    fn description(&self) -> Option<String>;

    /// Parent in the accessibility tree.
    fn parent(&self) -> Option<AccessibleRef>;

    /// Accessibility role.
    fn role(&self) -> Role;

    /// Index of this object within its parent, or -1 if detached.
    fn index_in_parent(&self) -> i32;

    /// Number of accessible children.
    fn child_count(&self) -> i32;

    /// Child at `index`, if it exists.
    fn child_at(&self, index: i32) -> Option<AccessibleRef>;

    /// Current state set.
    fn state_set(&self) -> StateSet;

    /// The text interface, if this object implements it.
    fn as_text(&self) -> Option<&dyn Text> {
        None
    }

    /// The table interface, if this object implements it.
    fn as_table(&self) -> Option<&dyn Table> {
        None
    }
}

/// Text capability of an accessible object.
pub trait Text: Send + Sync {
    /// Text between character offsets `start` (inclusive) and `end` (exclusive).
    fn text(&self, start: i32, end: i32) -> Option<String>;
}

/// Table capability of an accessible object.
pub trait Table: Send + Sync {
    /// Summary object.
    fn summary(&self) -> Option<AccessibleRef>;

    /// Caption object.
    fn caption(&self) -> Option<AccessibleRef>;

    /// Header object of `column`.
    fn column_header(&self, column: i32) -> Option<AccessibleRef>;

    /// Header object of `row`.
    fn row_header(&self, row: i32) -> Option<AccessibleRef>;

    /// Description of `row`.
    fn row_description(&self, row: i32) -> Option<String>;

    /// Description of `column`.
    fn column_description(&self, column: i32) -> Option<String>;
}

/// A screen rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Accessibility role of an object.
///
/// The discriminants are the values transmitted on the wire, so the order
/// must never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Role {
    #[default]
    Invalid = 0,
    AcceleratorLabel,
    Alert,
    Animation,
    Arrow,
    Calendar,
    Canvas,
    CheckBox,
    CheckMenuItem,
    ColorChooser,
    ColumnHeader,
    ComboBox,
    DateEditor,
    DesktopIcon,
    DesktopFrame,
    Dial,
    Dialog,
    DirectoryPane,
    DrawingArea,
    FileChooser,
    Filler,
    FontChooser,
    Frame,
    GlassPane,
    HtmlContainer,
    Icon,
    Image,
    InternalFrame,
    Label,
    LayeredPane,
    List,
    ListItem,
    Menu,
    MenuBar,
    MenuItem,
    OptionPane,
    PageTab,
    PageTabList,
    Panel,
    PasswordText,
    PopupMenu,
    ProgressBar,
    PushButton,
    RadioButton,
    RadioMenuItem,
    RootPane,
    RowHeader,
    ScrollBar,
    ScrollPane,
    Separator,
    Slider,
    SplitPane,
    SpinButton,
    Statusbar,
    Table,
    TableCell,
    TableColumnHeader,
    TableRowHeader,
    TearOffMenuItem,
    Terminal,
    Text,
    ToggleButton,
    ToolBar,
    ToolTip,
    Tree,
    TreeTable,
    Unknown,
    Viewport,
    Window,
    Header,
    Footer,
    Paragraph,
    Ruler,
    Application,
    Autocomplete,
    EditBar,
    Embedded,
    Entry,
    Chart,
    Caption,
    DocumentFrame,
    Heading,
    Page,
    Section,
    RedundantObject,
    Form,
    Link,
    InputMethodWindow,
}

impl Role {
    /// Numeric value transmitted on the wire.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// A single accessibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateType {
    Active = 0,
    Armed,
    Busy,
    Checked,
    Defunct,
    Editable,
    Enabled,
    Expandable,
    Expanded,
    Focusable,
    Focused,
    Horizontal,
    Iconified,
    Modal,
    MultiLine,
    Multiselectable,
    Opaque,
    Pressed,
    Resizable,
    Selectable,
    Selected,
    Sensitive,
    Showing,
    SingleLine,
    Stale,
    Transient,
    Vertical,
    Visible,
}

impl StateType {
    /// The kebab-case name used in `state-changed` notifications.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Armed => "armed",
            Self::Busy => "busy",
            Self::Checked => "checked",
            Self::Defunct => "defunct",
            Self::Editable => "editable",
            Self::Enabled => "enabled",
            Self::Expandable => "expandable",
            Self::Expanded => "expanded",
            Self::Focusable => "focusable",
            Self::Focused => "focused",
            Self::Horizontal => "horizontal",
            Self::Iconified => "iconified",
            Self::Modal => "modal",
            Self::MultiLine => "multi-line",
            Self::Multiselectable => "multiselectable",
            Self::Opaque => "opaque",
            Self::Pressed => "pressed",
            Self::Resizable => "resizable",
            Self::Selectable => "selectable",
            Self::Selected => "selected",
            Self::Sensitive => "sensitive",
            Self::Showing => "showing",
            Self::SingleLine => "single-line",
            Self::Stale => "stale",
            Self::Transient => "transient",
            Self::Vertical => "vertical",
            Self::Visible => "visible",
        }
    }
}

/// A set of [`StateType`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateSet(u64);

impl StateSet {
    /// An empty state set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a state.
    pub fn insert(&mut self, state: StateType) {
        self.0 |= 1 << state as u8;
    }

    /// Remove a state.
    pub fn remove(&mut self, state: StateType) {
        self.0 &= !(1 << state as u8);
    }

    /// Whether `state` is in the set.
    pub const fn contains(&self, state: StateType) -> bool {
        self.0 & (1 << state as u8) != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<StateType> for StateSet {
    fn from_iter<I: IntoIterator<Item = StateType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for state in iter {
            set.insert(state);
        }
        set
    }
}
