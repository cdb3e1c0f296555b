//! Bus transport.
//!
//! The dispatcher and the synchronous call channel talk to the bus only
//! through the [`Bus`] trait. [`ZbusBus`] implements it over a blocking
//! `zbus` connection to the accessibility bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use horizon_atspi_core::{CompletionHandle, CompletionWaiter, completion_pair};
use zvariant::{OwnedObjectPath, Value};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::keyboard::DeviceEvent;
use crate::logging::targets;
use crate::marshal::{ObjectReference, Payload};
use crate::names::{
    A11Y_BUS_INTERFACE, A11Y_BUS_NAME, A11Y_BUS_PATH, DEC_INTERFACE, DEC_PATH,
    NOTIFY_LISTENERS_SYNC, REGISTRY_BUS_NAME,
};

// ============================================================================
// Frames
// ============================================================================

/// Body of an event signal. Wire signature `(siiv(so))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBody {
    pub minor: String,
    pub detail1: i32,
    pub detail2: i32,
    /// Sent wrapped in a variant.
    pub value: Payload,
    /// Reference to the application root.
    pub announcer: ObjectReference,
}

impl EventBody {
    /// Wire signature of the body.
    pub const SIGNATURE: &'static str = "siiv(so)";

    /// Wire representation of the body.
    pub fn to_wire(&self) -> (String, i32, i32, Value<'static>, ObjectReference) {
        (
            self.minor.clone(),
            self.detail1,
            self.detail2,
            self.value.to_variant(),
            self.announcer.clone(),
        )
    }
}

/// One event signal, addressed and ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFrame {
    /// Path of the source object.
    pub path: OwnedObjectPath,
    pub interface: &'static str,
    /// Signal member, e.g. `StateChanged`.
    pub member: String,
    pub body: EventBody,
}

/// A method call expecting a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub destination: &'static str,
    pub path: &'static str,
    pub interface: &'static str,
    pub member: &'static str,
    pub event: DeviceEvent,
}

impl MethodCall {
    /// Ask the device event controller whether `event` is consumed.
    pub fn notify_listeners_sync(event: DeviceEvent) -> Self {
        Self {
            destination: REGISTRY_BUS_NAME,
            path: DEC_PATH,
            interface: DEC_INTERFACE,
            member: NOTIFY_LISTENERS_SYNC,
            event,
        }
    }
}

/// Content of a successful method return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Bool(bool),
    Empty,
    /// Body that did not have the expected shape.
    Unexpected(String),
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Method(ReplyBody),
    Error { name: String, message: String },
}

impl Reply {
    /// Whether the reply says the event was consumed. Anything but a
    /// boolean `true` return is "not consumed".
    pub fn consumed(&self) -> bool {
        matches!(self, Self::Method(ReplyBody::Bool(true)))
    }
}

/// Slot receiving the reply. Completed with `None` when the call failed in
/// transit.
pub type PendingReply = CompletionWaiter<Option<Reply>>;

// ============================================================================
// Bus trait
// ============================================================================

/// The shared bus connection.
pub trait Bus: Send + Sync {
    /// Unique name of this connection, used in object references.
    fn unique_name(&self) -> String;

    /// Send a signal. Signals are fire-and-forget.
    fn emit_signal(&self, frame: &SignalFrame) -> Result<()>;

    /// Send a method call. The returned slot is completed when the reply
    /// arrives or the call fails.
    fn send_with_reply(&self, call: &MethodCall) -> Result<PendingReply>;

    /// Process bus traffic for up to `timeout`, returning early once
    /// `pending` completes. Returns `false` once the connection has failed.
    fn read_write_dispatch(&self, pending: &PendingReply, timeout: Duration) -> bool;
}

// ============================================================================
// zbus implementation
// ============================================================================

/// One dispatch cycle: block until `pending` completes, the connection is
/// closed, or `timeout` elapses. Returns `false` once the connection is
/// closed.
///
/// The wait happens under the completion's own lock, so a reply that lands
/// between the caller's completion check and this call is not missed.
pub(crate) fn dispatch_cycle(
    closed: &AtomicBool,
    pending: &PendingReply,
    timeout: Duration,
) -> bool {
    if closed.load(Ordering::SeqCst) {
        return false;
    }
    pending.wait_timeout(timeout);
    !closed.load(Ordering::SeqCst)
}

type CallJob = (MethodCall, CompletionHandle<Option<Reply>>);

/// Dedicated thread performing blocking method calls in submission order.
///
/// The thread exits once the owning [`ZbusBus`] is dropped.
struct CallWorker {
    sender: Sender<CallJob>,
}

impl CallWorker {
    fn spawn(connection: zbus::blocking::Connection, closed: Arc<AtomicBool>) -> Result<Self> {
        let (sender, receiver) = unbounded::<CallJob>();
        std::thread::Builder::new()
            .name("horizon-atspi-calls".into())
            .spawn(move || {
                for (call, handle) in receiver {
                    handle.complete(perform_call(&connection, &closed, &call));
                }
                tracing::trace!(target: targets::BUS, "call worker stopped");
            })
            .map_err(|err| BridgeError::Bus(zbus::Error::InputOutput(Arc::new(err))))?;
        Ok(Self { sender })
    }

    fn submit(&self, call: MethodCall, handle: CompletionHandle<Option<Reply>>) -> Result<()> {
        self.sender
            .send((call, handle))
            .map_err(|_| BridgeError::ConnectionClosed)
    }
}

fn perform_call(
    connection: &zbus::blocking::Connection,
    closed: &AtomicBool,
    call: &MethodCall,
) -> Option<Reply> {
    let result = connection.call_method(
        Some(call.destination),
        call.path,
        Some(call.interface),
        call.member,
        &(call.event.clone(),),
    );
    match result {
        Ok(message) => Some(Reply::Method(match message.body().deserialize::<bool>() {
            Ok(value) => ReplyBody::Bool(value),
            Err(err) => ReplyBody::Unexpected(err.to_string()),
        })),
        Err(zbus::Error::MethodError(name, message, _)) => Some(Reply::Error {
            name: name.to_string(),
            message: message.unwrap_or_default(),
        }),
        Err(err) => {
            tracing::debug!(target: targets::BUS, error = %err, "method call failed");
            if is_transport_failure(&err) {
                closed.store(true, Ordering::SeqCst);
            }
            None
        }
    }
}

/// [`Bus`] over a blocking zbus connection.
pub struct ZbusBus {
    connection: zbus::blocking::Connection,
    closed: Arc<AtomicBool>,
    worker: CallWorker,
}

impl ZbusBus {
    /// Connect to the accessibility bus.
    ///
    /// Uses `config.bus_address` when set. Otherwise the address is asked
    /// from the bus launcher on the session bus, and the session bus itself
    /// is used when no launcher answers.
    pub fn connect(config: &BridgeConfig) -> Result<Self> {
        let connection = match &config.bus_address {
            Some(address) => Self::open(address)?,
            None => {
                let session = zbus::blocking::Connection::session()?;
                match discover_address(&session) {
                    Ok(address) => Self::open(&address)?,
                    Err(err) => {
                        tracing::warn!(
                            target: targets::BUS,
                            error = %err,
                            "accessibility bus not found, using the session bus"
                        );
                        session
                    }
                }
            }
        };
        Self::from_connection(connection)
    }

    /// Wrap an existing connection. Starts the call worker thread.
    pub fn from_connection(connection: zbus::blocking::Connection) -> Result<Self> {
        let closed = Arc::new(AtomicBool::new(false));
        let worker = CallWorker::spawn(connection.clone(), closed.clone())?;
        Ok(Self {
            connection,
            closed,
            worker,
        })
    }

    fn open(address: &str) -> Result<zbus::blocking::Connection> {
        tracing::debug!(target: targets::BUS, address, "connecting to accessibility bus");
        Ok(zbus::blocking::ConnectionBuilder::address(address)?.build()?)
    }

    /// Mark the connection closed. Later dispatch cycles report failure.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether the connection was closed or failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(BridgeError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

fn discover_address(session: &zbus::blocking::Connection) -> Result<String> {
    let reply = session.call_method(
        Some(A11Y_BUS_NAME),
        A11Y_BUS_PATH,
        Some(A11Y_BUS_INTERFACE),
        "GetAddress",
        &(),
    )?;
    Ok(reply.body().deserialize::<String>()?)
}

fn is_transport_failure(err: &zbus::Error) -> bool {
    matches!(err, zbus::Error::InputOutput(_) | zbus::Error::Handshake(_))
}

impl Bus for ZbusBus {
    fn unique_name(&self) -> String {
        self.connection
            .unique_name()
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    fn emit_signal(&self, frame: &SignalFrame) -> Result<()> {
        self.check_open()?;
        let result = self.connection.emit_signal(
            None::<zbus::names::BusName<'_>>,
            frame.path.as_str(),
            frame.interface,
            frame.member.as_str(),
            &frame.body.to_wire(),
        );
        if let Err(err) = &result {
            if is_transport_failure(err) {
                self.close();
            }
        }
        Ok(result?)
    }

    fn send_with_reply(&self, call: &MethodCall) -> Result<PendingReply> {
        self.check_open()?;
        let (handle, waiter) = completion_pair();
        self.worker.submit(call.clone(), handle)?;
        Ok(waiter)
    }

    fn read_write_dispatch(&self, pending: &PendingReply, timeout: Duration) -> bool {
        dispatch_cycle(&self.closed, pending, timeout)
    }
}

static_assertions::assert_impl_all!(ZbusBus: Send, Sync);
