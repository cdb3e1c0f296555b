//! Fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use horizon_atspi::{Bus, BridgeError, MethodCall, PendingReply, Reply, Result, SignalFrame};
use horizon_atspi_core::{
    Accessible, AccessibleId, AccessibleRef, Role, StateSet, StateType, Text, completion_pair,
};
use parking_lot::Mutex;

/// Route bridge logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A widget in a small test tree.
#[derive(Debug)]
pub struct Widget {
    id: AccessibleId,
    role: Role,
    name: Option<String>,
    text: Option<Content>,
    states: StateSet,
    parent: Mutex<Option<Weak<dyn Accessible>>>,
    children: Mutex<Vec<AccessibleRef>>,
}

impl Widget {
    pub fn new(role: Role, name: Option<&str>) -> Arc<Self> {
        Self::build(role, name, None, StateSet::empty())
    }

    pub fn with_text(role: Role, text: &str) -> Arc<Self> {
        Self::build(role, None, Some(Content(text.to_string())), StateSet::empty())
    }

    pub fn active(role: Role, name: &str) -> Arc<Self> {
        let mut states = StateSet::empty();
        states.insert(StateType::Active);
        Self::build(role, Some(name), None, states)
    }

    fn build(role: Role, name: Option<&str>, text: Option<Content>, states: StateSet) -> Arc<Self> {
        Arc::new(Self {
            id: AccessibleId::next(),
            role,
            name: name.map(str::to_string),
            text,
            states,
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn push(parent: &Arc<Self>, child: &Arc<Widget>) {
        let as_parent: AccessibleRef = parent.clone();
        *child.parent.lock() = Some(Arc::downgrade(&as_parent));
        parent.children.lock().push(child.clone());
    }
}

impl Accessible for Widget {
    fn id(&self) -> AccessibleId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn description(&self) -> Option<String> {
        None
    }

    fn parent(&self) -> Option<AccessibleRef> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    fn role(&self) -> Role {
        self.role
    }

    fn index_in_parent(&self) -> i32 {
        let Some(parent) = self.parent() else {
            return -1;
        };
        (0..parent.child_count())
            .find(|&index| parent.child_at(index).is_some_and(|child| child.id() == self.id))
            .unwrap_or(-1)
    }

    fn child_count(&self) -> i32 {
        self.children.lock().len() as i32
    }

    fn child_at(&self, index: i32) -> Option<AccessibleRef> {
        self.children.lock().get(usize::try_from(index).ok()?).cloned()
    }

    fn state_set(&self) -> StateSet {
        self.states
    }

    fn as_text(&self) -> Option<&dyn Text> {
        self.text.as_ref().map(|text| text as &dyn Text)
    }
}

#[derive(Debug)]
struct Content(String);

impl Text for Content {
    fn text(&self, start: i32, end: i32) -> Option<String> {
        let start = usize::try_from(start).ok()?;
        let end = usize::try_from(end).ok()?;
        Some(self.0.chars().skip(start).take(end.saturating_sub(start)).collect())
    }
}

/// In-memory bus. Signals are recorded; method calls are answered with a
/// canned reply. A closed bus drops signals and never answers.
pub struct MemoryBus {
    frames: Mutex<Vec<SignalFrame>>,
    calls: Mutex<Vec<MethodCall>>,
    reply: Mutex<Option<Reply>>,
    closed: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn frames(&self) -> Vec<SignalFrame> {
        self.frames.lock().clone()
    }

    pub fn members(&self) -> Vec<String> {
        self.frames.lock().iter().map(|frame| frame.member.clone()).collect()
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.lock().clone()
    }

    pub fn answer(&self, reply: Reply) {
        *self.reply.lock() = Some(reply);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Bus for MemoryBus {
    fn unique_name(&self) -> String {
        ":1.42".into()
    }

    fn emit_signal(&self, frame: &SignalFrame) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::ConnectionClosed);
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn send_with_reply(&self, call: &MethodCall) -> Result<PendingReply> {
        self.calls.lock().push(call.clone());
        let (handle, waiter) = completion_pair();
        // A closed bus never answers; the pending reply stays empty.
        if !self.is_closed() {
            handle.complete(self.reply.lock().clone());
        }
        Ok(waiter)
    }

    fn read_write_dispatch(&self, _pending: &PendingReply, _timeout: Duration) -> bool {
        !self.is_closed()
    }
}
