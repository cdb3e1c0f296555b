//! Toolkit-side primitives for the Horizon AT-SPI bridge.
//!
//! This crate holds everything the bridge consumes from the UI toolkit
//! without knowing anything about D-Bus:
//!
//! - **Object Model**: The read-only [`Accessible`] capability interface
//! - **Notifications**: Positional signal emissions and native key events
//! - **Signals**: A re-entrant [`Signal`] primitive
//! - **Toolkit**: The global listener API ([`Toolkit`]) and an in-process
//!   implementation ([`ToolkitHub`])
//! - **Main Loop**: A task queue with nestable loops, used to keep the
//!   execution context alive while a synchronous call is outstanding
//! - **Completion**: One-shot reply slots
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_atspi_core::{Notification, Param, Toolkit, ToolkitHub};
//! # use horizon_atspi_core::{Accessible, AccessibleId, AccessibleRef, Role, StateSet};
//! # #[derive(Debug)]
//! # struct App(AccessibleId);
//! # impl Accessible for App {
//! #     fn id(&self) -> AccessibleId { self.0 }
//! #     fn name(&self) -> Option<String> { Some("demo".into()) }
//! #     fn description(&self) -> Option<String> { None }
//! #     fn parent(&self) -> Option<AccessibleRef> { None }
//! #     fn role(&self) -> Role { Role::Application }
//! #     fn index_in_parent(&self) -> i32 { -1 }
//! #     fn child_count(&self) -> i32 { 0 }
//! #     fn child_at(&self, _index: i32) -> Option<AccessibleRef> { None }
//! #     fn state_set(&self) -> StateSet { StateSet::empty() }
//! # }
//!
//! let hub = ToolkitHub::new(Arc::new(App(AccessibleId::next())));
//! hub.add_global_event_listener(
//!     "Gtk:AtkObject:state-change",
//!     Arc::new(|notification| {
//!         println!("state change: {:?}", notification.param(1));
//!         true
//!     }),
//! )?;
//!
//! let notification = Notification::new("state-change", hub.root())
//!     .with_param(Param::Str(Some("focused".into())))
//!     .with_param(Param::Bool(true));
//! hub.emit("Gtk:AtkObject:state-change", &notification);
//! # Ok::<(), horizon_atspi_core::ToolkitError>(())
//! ```

pub mod completion;
mod error;
pub mod main_loop;
pub mod notification;
pub mod object;
pub mod signal;
pub mod toolkit;

pub use completion::{CompletionHandle, CompletionWaiter, completion_pair};
pub use error::{Result, ToolkitError};
pub use main_loop::{MainContext, MainLoop, MainLoopHandle};
pub use notification::{KeyEventStruct, KeyEventType, Notification, Param, PropertyValues};
pub use object::{
    Accessible, AccessibleId, AccessibleRef, Rect, Role, StateSet, StateType, Table, Text,
};
pub use signal::{ConnectionId, Signal};
pub use toolkit::{EventListener, FocusTracker, KeySnooper, ListenerId, Toolkit, ToolkitHub};
