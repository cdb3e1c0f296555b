//! Synchronous calls that keep the application responsive.
//!
//! The key event query runs while the toolkit is delivering that very key
//! event, so the calling context is blocked until the registry answers. How
//! it waits depends on [`ReentryMode`]:
//!
//! - **Cooperative**: a nested [`MainLoop`] runs on the application's
//!   [`MainContext`]. Queued work, including new accessibility events, keeps
//!   being dispatched in arrival order. The reply's completion callback quits
//!   the nested loop.
//! - **Poll**: the bus connection is serviced in dispatch cycles of at most
//!   the configured length until the reply is in. A cycle ends early when
//!   the reply lands. A cycle reporting a failed connection abandons the
//!   call.
//!
//! Neither mode has a timeout. A peer that never answers blocks the caller
//! until the connection fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use horizon_atspi_core::{MainContext, MainLoop};

use crate::bus::{Bus, MethodCall, PendingReply, Reply};
use crate::config::{BridgeConfig, ReentryMode};
use crate::logging::{span_names, targets};

/// Clears the in-flight flag when the call finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sends method calls and blocks until their reply.
pub struct ReentrantCallChannel {
    bus: Arc<dyn Bus>,
    context: Arc<MainContext>,
    mode: ReentryMode,
    dispatch_timeout: Duration,
    in_flight: AtomicBool,
}

impl ReentrantCallChannel {
    /// Create a channel. The mode and dispatch timeout are taken from
    /// `config` now and never re-read.
    pub fn new(bus: Arc<dyn Bus>, context: Arc<MainContext>, config: &BridgeConfig) -> Self {
        Self {
            bus,
            context,
            mode: config.reentry,
            dispatch_timeout: config.dispatch_timeout(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// The waiting strategy.
    pub fn mode(&self) -> ReentryMode {
        self.mode
    }

    /// Whether a call is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Send `call` and wait for its reply.
    ///
    /// Returns `None` when the call could not be sent, the connection failed
    /// while waiting, or another call is already outstanding.
    pub fn call(&self, call: MethodCall) -> Option<Reply> {
        let span = tracing::trace_span!(span_names::SYNC_CALL, member = call.member);
        let _enter = span.enter();

        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::warn!(
                target: targets::REENTRANT,
                member = call.member,
                "synchronous call already in flight, not sending"
            );
            return None;
        };

        let pending = match self.bus.send_with_reply(&call) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::debug!(target: targets::REENTRANT, error = %err, "failed to send call");
                return None;
            }
        };

        let reply = match self.mode {
            ReentryMode::Cooperative => self.wait_cooperative(pending),
            ReentryMode::Poll => self.wait_polling(pending),
        };
        tracing::trace!(target: targets::REENTRANT, replied = reply.is_some(), "call finished");
        reply
    }

    fn wait_cooperative(&self, pending: PendingReply) -> Option<Reply> {
        let nested = MainLoop::new(self.context.clone());
        let quit = nested.handle();
        pending.on_complete(move || quit.quit());

        tracing::trace!(
            target: targets::REENTRANT,
            depth = self.context.depth() + 1,
            "entering nested loop"
        );
        nested.run();
        pending.take().flatten()
    }

    fn wait_polling(&self, pending: PendingReply) -> Option<Reply> {
        while !pending.is_complete() {
            if !self.bus.read_write_dispatch(&pending, self.dispatch_timeout) {
                tracing::debug!(
                    target: targets::REENTRANT,
                    "connection failed while waiting for reply"
                );
                return None;
            }
        }
        pending.take().flatten()
    }
}

static_assertions::assert_impl_all!(ReentrantCallChannel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ReplyBody, SignalFrame};
    use crate::error::{BridgeError, Result};
    use crate::keyboard::DeviceEvent;
    use horizon_atspi_core::{CompletionHandle, completion_pair};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Bus whose replies are completed by the test.
    #[derive(Default)]
    struct ScriptedBus {
        pending: Mutex<Vec<CompletionHandle<Option<Reply>>>>,
        open: AtomicBool,
        dispatches: AtomicUsize,
        fail_send: AtomicBool,
    }

    impl ScriptedBus {
        fn open() -> Arc<Self> {
            let bus = Self::default();
            bus.open.store(true, Ordering::SeqCst);
            Arc::new(bus)
        }

        fn reply(&self, reply: Option<Reply>) {
            if let Some(handle) = self.pending.lock().pop() {
                handle.complete(reply);
            }
        }
    }

    impl Bus for ScriptedBus {
        fn unique_name(&self) -> String {
            ":1.7".into()
        }

        fn emit_signal(&self, _frame: &SignalFrame) -> Result<()> {
            Ok(())
        }

        fn send_with_reply(&self, _call: &MethodCall) -> Result<PendingReply> {
            if self.fail_send.load(Ordering::SeqCst) {
                return Err(BridgeError::ConnectionClosed);
            }
            let (handle, waiter) = completion_pair();
            self.pending.lock().push(handle);
            Ok(waiter)
        }

        fn read_write_dispatch(&self, _pending: &PendingReply, _timeout: Duration) -> bool {
            let cycle = self.dispatches.fetch_add(1, Ordering::SeqCst);
            // The peer answers on the third cycle.
            if cycle == 2 {
                self.reply(Some(Reply::Method(ReplyBody::Bool(true))));
            }
            self.open.load(Ordering::SeqCst)
        }
    }

    fn call() -> MethodCall {
        MethodCall::notify_listeners_sync(DeviceEvent {
            id: 0x61,
            hw_code: 38,
            timestamp: 0,
            modifiers: 0,
            event_string: "a".into(),
            is_text: true,
            event_type: 0,
        })
    }

    fn channel(bus: Arc<ScriptedBus>, mode: ReentryMode) -> ReentrantCallChannel {
        let config = BridgeConfig::default().reentry(mode);
        ReentrantCallChannel::new(bus, MainContext::new(), &config)
    }

    #[test]
    fn test_poll_mode_waits_for_reply() {
        let bus = ScriptedBus::open();
        let channel = channel(bus.clone(), ReentryMode::Poll);

        let reply = channel.call(call()).unwrap();
        assert!(reply.consumed());
        assert_eq!(bus.dispatches.load(Ordering::SeqCst), 3);
        assert!(!channel.is_in_flight());
    }

    #[test]
    fn test_poll_mode_closed_connection_returns_none() {
        let bus = Arc::new(ScriptedBus::default());
        let channel = channel(bus.clone(), ReentryMode::Poll);

        assert!(channel.call(call()).is_none());
        assert_eq!(bus.dispatches.load(Ordering::SeqCst), 1);
        assert!(!channel.is_in_flight());
    }

    /// Bus whose dispatch cycles block on the pending reply, answered by a
    /// separate thread.
    struct ThreadedBus {
        closed: AtomicBool,
        replies: Mutex<Vec<std::thread::JoinHandle<()>>>,
    }

    impl Bus for ThreadedBus {
        fn unique_name(&self) -> String {
            ":1.8".into()
        }

        fn emit_signal(&self, _frame: &SignalFrame) -> Result<()> {
            Ok(())
        }

        fn send_with_reply(&self, _call: &MethodCall) -> Result<PendingReply> {
            let (handle, waiter) = completion_pair();
            self.replies.lock().push(std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                handle.complete(Some(Reply::Method(ReplyBody::Bool(true))));
            }));
            Ok(waiter)
        }

        fn read_write_dispatch(&self, pending: &PendingReply, timeout: Duration) -> bool {
            crate::bus::dispatch_cycle(&self.closed, pending, timeout)
        }
    }

    #[test]
    fn test_poll_mode_returns_as_soon_as_reply_lands() {
        let bus = Arc::new(ThreadedBus {
            closed: AtomicBool::new(false),
            replies: Mutex::new(Vec::new()),
        });
        let mut config = BridgeConfig::default().reentry(ReentryMode::Poll);
        config.dispatch_timeout_ms = 30_000;
        let channel = ReentrantCallChannel::new(bus.clone(), MainContext::new(), &config);

        let started = std::time::Instant::now();
        for _ in 0..20 {
            assert!(channel.call(call()).unwrap().consumed());
        }
        assert!(started.elapsed() < Duration::from_secs(10));

        for reply in bus.replies.lock().drain(..) {
            reply.join().unwrap();
        }
    }

    #[test]
    fn test_send_failure_returns_none() {
        let bus = ScriptedBus::open();
        bus.fail_send.store(true, Ordering::SeqCst);
        let channel = channel(bus, ReentryMode::Poll);
        assert!(channel.call(call()).is_none());
    }

    #[test]
    fn test_cooperative_mode_runs_queued_work() {
        let bus = ScriptedBus::open();
        let context = MainContext::new();
        let config = BridgeConfig::default().reentry(ReentryMode::Cooperative);
        let channel = ReentrantCallChannel::new(bus.clone(), context.clone(), &config);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        context.invoke(move || seen_clone.lock().push("queued event"));
        let replier = bus.clone();
        let seen_clone = seen.clone();
        context.invoke(move || {
            seen_clone.lock().push("reply");
            replier.reply(Some(Reply::Method(ReplyBody::Bool(false))));
        });

        let reply = channel.call(call()).unwrap();
        assert!(!reply.consumed());
        assert_eq!(*seen.lock(), vec!["queued event", "reply"]);
        assert_eq!(bus.dispatches.load(Ordering::SeqCst), 0);
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn test_cooperative_mode_reply_from_other_thread() {
        let bus = ScriptedBus::open();
        let channel = channel(bus.clone(), ReentryMode::Cooperative);

        let replier = bus.clone();
        let thread = std::thread::spawn(move || {
            while replier.pending.lock().is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
            replier.reply(None);
        });

        assert!(channel.call(call()).is_none());
        thread.join().unwrap();
    }

    #[test]
    fn test_second_call_while_in_flight_is_refused() {
        let bus = ScriptedBus::open();
        let context = MainContext::new();
        let config = BridgeConfig::default().reentry(ReentryMode::Cooperative);
        let channel = Arc::new(ReentrantCallChannel::new(bus.clone(), context.clone(), &config));
        let nested_result = Arc::new(Mutex::new(None));

        let nested_channel = channel.clone();
        let nested_bus = bus.clone();
        let result = nested_result.clone();
        context.invoke(move || {
            assert!(nested_channel.is_in_flight());
            *result.lock() = Some(nested_channel.call(call()).is_none());
            nested_bus.reply(Some(Reply::Method(ReplyBody::Bool(true))));
        });

        assert!(channel.call(call()).unwrap().consumed());
        assert_eq!(*nested_result.lock(), Some(true));
    }
}
