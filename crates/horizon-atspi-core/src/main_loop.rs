//! Main context and nestable main loops.
//!
//! A [`MainContext`] is the single queue of work owned by the toolkit's
//! execution context: deferred tasks, bus traffic forwarded from reader
//! threads, wake-ups. A [`MainLoop`] repeatedly dispatches that queue until
//! [`MainLoopHandle::quit`] is called. Loops nest: code running inside one
//! iteration may start a second loop on the same context, which keeps the
//! context serviced while the outer code waits for something.
//!
//! ```
//! use horizon_atspi_core::{MainContext, MainLoop};
//!
//! let context = MainContext::new();
//! let main_loop = MainLoop::new(context.clone());
//! let quit = main_loop.handle();
//! context.invoke(move || quit.quit());
//! main_loop.run();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

/// A boxed task closure.
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

enum Dispatch {
    Task(BoxedTask),
    WakeUp,
}

/// Queue of work for one execution context.
pub struct MainContext {
    sender: Sender<Dispatch>,
    receiver: Receiver<Dispatch>,
    depth: AtomicUsize,
}

impl MainContext {
    /// How long a blocking iteration waits before returning with nothing done.
    pub const IDLE_TIMEOUT: Duration = Duration::from_millis(100);

    /// Create a new, empty context.
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = unbounded();
        Arc::new(Self {
            sender,
            receiver,
            depth: AtomicUsize::new(0),
        })
    }

    /// Queue a task to run on the context's next iteration.
    ///
    /// Tasks run in the order they were queued.
    pub fn invoke<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.sender.send(Dispatch::Task(Box::new(task)));
    }

    /// Wake a blocked iteration without queuing work.
    pub fn wakeup(&self) {
        let _ = self.sender.send(Dispatch::WakeUp);
    }

    /// Whether any work is queued.
    pub fn pending(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Number of loops currently running on this context.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Run one iteration.
    ///
    /// Dispatches one queued item. If nothing is queued and `may_block` is
    /// set, waits up to [`Self::IDLE_TIMEOUT`] for something to arrive.
    /// Returns `true` if a task was run.
    pub fn iteration(&self, may_block: bool) -> bool {
        let next = if may_block {
            match self.receiver.recv_timeout(Self::IDLE_TIMEOUT) {
                Ok(dispatch) => Some(dispatch),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            }
        } else {
            self.receiver.try_recv().ok()
        };

        match next {
            Some(Dispatch::Task(task)) => {
                task();
                true
            }
            Some(Dispatch::WakeUp) | None => false,
        }
    }
}

/// A loop dispatching a [`MainContext`] until quit.
pub struct MainLoop {
    context: Arc<MainContext>,
    running: Arc<AtomicBool>,
    quit: Arc<AtomicBool>,
}

impl MainLoop {
    /// Create a loop over `context`. The loop does not start until [`run`](Self::run).
    pub fn new(context: Arc<MainContext>) -> Self {
        Self {
            context,
            running: Arc::new(AtomicBool::new(false)),
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable handle that can stop this loop from any thread.
    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            context: self.context.clone(),
            quit: self.quit.clone(),
        }
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Dispatch the context until the loop is quit.
    ///
    /// A quit requested before `run` is called makes `run` return without
    /// dispatching anything. The quit request is consumed, so the loop can
    /// be run again afterwards.
    pub fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "horizon_atspi_core::main_loop", "main loop is already running");
            return;
        }
        let depth = self.context.depth.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(target: "horizon_atspi_core::main_loop", depth, "entering main loop");

        while !self.quit.load(Ordering::SeqCst) {
            self.context.iteration(true);
        }

        self.quit.store(false, Ordering::SeqCst);
        self.context.depth.fetch_sub(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        tracing::trace!(target: "horizon_atspi_core::main_loop", depth, "left main loop");
    }
}

/// Handle used to stop a running [`MainLoop`].
#[derive(Clone)]
pub struct MainLoopHandle {
    context: Arc<MainContext>,
    quit: Arc<AtomicBool>,
}

impl MainLoopHandle {
    /// Stop the loop after the current iteration.
    pub fn quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.context.wakeup();
    }
}
