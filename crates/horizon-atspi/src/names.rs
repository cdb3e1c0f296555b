//! Well-known AT-SPI bus names, object paths and interfaces.

/// Bus name of the AT-SPI registry daemon.
pub const REGISTRY_BUS_NAME: &str = "org.a11y.atspi.Registry";

/// Path used for references to no object.
pub const NULL_PATH: &str = "/org/a11y/atspi/null";
/// Path of the application's root accessible.
pub const ROOT_PATH: &str = "/org/a11y/atspi/accessible/root";
/// Prefix of every other accessible's path.
pub const ACCESSIBLE_PATH_PREFIX: &str = "/org/a11y/atspi/accessible";

/// Object path of the device event controller.
pub const DEC_PATH: &str = "/org/a11y/atspi/registry/deviceeventcontroller";
/// Device event controller interface.
pub const DEC_INTERFACE: &str = "org.a11y.atspi.DeviceEventController";
/// Method asking the registry whether a key event was consumed.
pub const NOTIFY_LISTENERS_SYNC: &str = "NotifyListenersSync";

/// Event interfaces.
pub mod event {
    /// Object events.
    pub const OBJECT: &str = "org.a11y.atspi.Event.Object";
    /// Window events.
    pub const WINDOW: &str = "org.a11y.atspi.Event.Window";
    /// Document events.
    pub const DOCUMENT: &str = "org.a11y.atspi.Event.Document";
    /// Focus events.
    pub const FOCUS: &str = "org.a11y.atspi.Event.Focus";
}

/// Accessibility bus launcher, queried on the session bus for the a11y bus address.
pub const A11Y_BUS_NAME: &str = "org.a11y.Bus";
/// Object path of the bus launcher.
pub const A11Y_BUS_PATH: &str = "/org/a11y/bus";
/// Bus launcher interface.
pub const A11Y_BUS_INTERFACE: &str = "org.a11y.Bus";

/// Environment variable selecting cooperative re-entry.
pub const ENV_REENTER_MAIN_LOOP: &str = "AT_SPI_REENTER_G_MAIN_LOOP";
/// Older spelling of [`ENV_REENTER_MAIN_LOOP`], still honoured.
pub const ENV_CLIENT: &str = "AT_SPI_CLIENT";
