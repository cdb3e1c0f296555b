//! Fixtures shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use horizon_atspi_core::{
    Accessible, AccessibleId, AccessibleRef, Role, StateSet, StateType, Table, Text,
    completion_pair,
};
use parking_lot::Mutex;

use crate::bus::{Bus, MethodCall, PendingReply, Reply, SignalFrame};
use crate::error::{BridgeError, Result};

/// Accessible with settable fields.
#[derive(Debug)]
pub(crate) struct TestNode {
    id: AccessibleId,
    role: Role,
    name: Option<String>,
    description: Option<String>,
    text: Option<TestText>,
    table: Option<TestTable>,
    states: Mutex<StateSet>,
    parent: Mutex<Option<Weak<dyn Accessible>>>,
    index: Mutex<i32>,
    children: Mutex<Vec<AccessibleRef>>,
}

impl TestNode {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            id: AccessibleId::next(),
            role,
            name: None,
            description: None,
            text: None,
            table: None,
            states: Mutex::new(StateSet::empty()),
            parent: Mutex::new(None),
            index: Mutex::new(-1),
            children: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub(crate) fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.text = Some(TestText(text.to_string()));
        self
    }

    pub(crate) fn with_table(mut self, table: TestTable) -> Self {
        self.table = Some(table);
        self
    }

    pub(crate) fn with_states<I: IntoIterator<Item = StateType>>(self, states: I) -> Self {
        *self.states.lock() = states.into_iter().collect();
        self
    }

    pub(crate) fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Append `child` and point its parent back at `parent`.
    pub(crate) fn add_child(this: &Arc<Self>, child: &Arc<TestNode>) {
        let parent: AccessibleRef = this.clone();
        let mut children = this.children.lock();
        *child.index.lock() = children.len() as i32;
        *child.parent.lock() = Some(Arc::downgrade(&parent));
        children.push(child.clone());
    }
}

impl Accessible for TestNode {
    fn id(&self) -> AccessibleId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn description(&self) -> Option<String> {
        self.description.clone()
    }

    fn parent(&self) -> Option<AccessibleRef> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    fn role(&self) -> Role {
        self.role
    }

    fn index_in_parent(&self) -> i32 {
        *self.index.lock()
    }

    fn child_count(&self) -> i32 {
        self.children.lock().len() as i32
    }

    fn child_at(&self, index: i32) -> Option<AccessibleRef> {
        let index = usize::try_from(index).ok()?;
        self.children.lock().get(index).cloned()
    }

    fn state_set(&self) -> StateSet {
        *self.states.lock()
    }

    fn as_text(&self) -> Option<&dyn Text> {
        self.text.as_ref().map(|text| text as &dyn Text)
    }

    fn as_table(&self) -> Option<&dyn Table> {
        self.table.as_ref().map(|table| table as &dyn Table)
    }
}

#[derive(Debug)]
pub(crate) struct TestText(String);

impl Text for TestText {
    fn text(&self, start: i32, end: i32) -> Option<String> {
        let start = usize::try_from(start).ok()?;
        let chars = self.0.chars().skip(start);
        Some(match usize::try_from(end) {
            Ok(end) => chars.take(end.saturating_sub(start)).collect(),
            Err(_) => chars.collect(),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestTable {
    pub summary: Option<AccessibleRef>,
    pub caption: Option<AccessibleRef>,
    pub column_headers: Vec<AccessibleRef>,
    pub row_headers: Vec<AccessibleRef>,
    pub row_descriptions: Vec<String>,
    pub column_descriptions: Vec<String>,
}

fn at<T: Clone>(items: &[T], index: i32) -> Option<T> {
    items.get(usize::try_from(index).ok()?).cloned()
}

impl Table for TestTable {
    fn summary(&self) -> Option<AccessibleRef> {
        self.summary.clone()
    }

    fn caption(&self) -> Option<AccessibleRef> {
        self.caption.clone()
    }

    fn column_header(&self, column: i32) -> Option<AccessibleRef> {
        at(&self.column_headers, column)
    }

    fn row_header(&self, row: i32) -> Option<AccessibleRef> {
        at(&self.row_headers, row)
    }

    fn row_description(&self, row: i32) -> Option<String> {
        at(&self.row_descriptions, row)
    }

    fn column_description(&self, column: i32) -> Option<String> {
        at(&self.column_descriptions, column)
    }
}

/// Bus that records signals and answers calls with a canned reply.
pub(crate) struct RecordingBus {
    frames: Mutex<Vec<SignalFrame>>,
    calls: Mutex<Vec<MethodCall>>,
    reply: Mutex<Option<Reply>>,
    failing: AtomicBool,
}

impl RecordingBus {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new(None),
            failing: AtomicBool::new(false),
        })
    }

    pub(crate) fn frames(&self) -> Vec<SignalFrame> {
        self.frames.lock().clone()
    }

    pub(crate) fn members(&self) -> Vec<String> {
        self.frames.lock().iter().map(|f| f.member.clone()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<MethodCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn set_reply(&self, reply: Option<Reply>) {
        *self.reply.lock() = reply;
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Bus for RecordingBus {
    fn unique_name(&self) -> String {
        ":1.99".into()
    }

    fn emit_signal(&self, frame: &SignalFrame) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::ConnectionClosed);
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    fn send_with_reply(&self, call: &MethodCall) -> Result<PendingReply> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::ConnectionClosed);
        }
        self.calls.lock().push(call.clone());
        let (handle, waiter) = completion_pair();
        handle.complete(self.reply.lock().clone());
        Ok(waiter)
    }

    fn read_write_dispatch(&self, _pending: &PendingReply, _timeout: Duration) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}
