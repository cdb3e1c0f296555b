//! Object reference registry.
//!
//! Every accessible announced on the bus is addressed by an object path. The
//! [`ObjectRegistry`] trait is what the dispatcher needs from the component
//! that owns those paths: resolve an object to its path, and refresh a lease
//! that keeps the object alive while clients may still hold the path.
//!
//! [`AccessibleRegister`] is the in-process implementation. The root
//! accessible is always at [`ROOT_PATH`]; every other object gets
//! `/org/a11y/atspi/accessible/<n>` the first time it is resolved, and keeps
//! that path for as long as it lives.
//!
//! Expired leases are swept while new ones are taken, at most once per lease
//! duration, so a register that keeps seeing events never accumulates dead
//! leases. [`AccessibleRegister::expire_leases`] sweeps on demand.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use horizon_atspi_core::{Accessible, AccessibleId, AccessibleRef};
use parking_lot::Mutex;
use zvariant::{ObjectPath, OwnedObjectPath};

use crate::logging::targets;
use crate::names::{ACCESSIBLE_PATH_PREFIX, ROOT_PATH};

/// Maps accessibles to bus object paths and keeps leased ones alive.
pub trait ObjectRegistry: Send + Sync {
    /// Stable object path of `object`.
    fn path_for(&self, object: &AccessibleRef) -> OwnedObjectPath;

    /// Refresh the lease on `object`.
    fn lease_if_needed(&self, object: &AccessibleRef);
}

struct Registered {
    path: u64,
    object: Weak<dyn Accessible>,
}

struct Lease {
    object: AccessibleRef,
    expires: Instant,
}

#[derive(Default)]
struct RegisterState {
    next_path: u64,
    by_id: HashMap<AccessibleId, Registered>,
    by_path: HashMap<u64, AccessibleId>,
    leases: HashMap<AccessibleId, Lease>,
    next_sweep: Option<Instant>,
}

impl RegisterState {
    /// Drop leases expired at `now` and forget paths whose objects are gone.
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.leases.len();
        self.leases.retain(|_, lease| lease.expires > now);
        let expired = before - self.leases.len();

        let Self { by_id, by_path, .. } = self;
        by_id.retain(|_, registered| {
            let alive = registered.object.strong_count() > 0;
            if !alive {
                by_path.remove(&registered.path);
            }
            alive
        });

        if expired > 0 {
            tracing::trace!(target: targets::REGISTRY, expired, "leases expired");
        }
        expired
    }
}

/// Path registry with time-limited leases.
pub struct AccessibleRegister {
    root: AccessibleId,
    lease_duration: Duration,
    state: Mutex<RegisterState>,
}

impl AccessibleRegister {
    /// Create a register whose root is `root`.
    pub fn new(root: &AccessibleRef, lease_duration: Duration) -> Self {
        Self {
            root: root.id(),
            lease_duration,
            state: Mutex::new(RegisterState::default()),
        }
    }

    /// Resolve a path back to the live object registered under it.
    pub fn object_for(&self, path: &str) -> Option<AccessibleRef> {
        let number = path
            .strip_prefix(ACCESSIBLE_PATH_PREFIX)?
            .strip_prefix('/')?
            .parse::<u64>()
            .ok()?;
        let state = self.state.lock();
        let id = state.by_path.get(&number)?;
        state.by_id.get(id)?.object.upgrade()
    }

    /// Whether `object` currently holds an unexpired lease.
    pub fn is_leased(&self, object: &AccessibleRef) -> bool {
        self.state
            .lock()
            .leases
            .get(&object.id())
            .is_some_and(|lease| lease.expires > Instant::now())
    }

    /// Number of leases held, expired or not.
    pub fn lease_count(&self) -> usize {
        self.state.lock().leases.len()
    }

    /// Drop leases that expired at or before `now`. Returns how many were dropped.
    pub fn expire_leases(&self, now: Instant) -> usize {
        self.state.lock().sweep(now)
    }

    fn numbered_path(number: u64) -> OwnedObjectPath {
        ObjectPath::from_string_unchecked(format!("{ACCESSIBLE_PATH_PREFIX}/{number}")).into()
    }
}

impl ObjectRegistry for AccessibleRegister {
    fn path_for(&self, object: &AccessibleRef) -> OwnedObjectPath {
        let id = object.id();
        if id == self.root {
            return ObjectPath::from_static_str_unchecked(ROOT_PATH).into();
        }

        let mut state = self.state.lock();
        if let Some(registered) = state.by_id.get(&id) {
            return Self::numbered_path(registered.path);
        }

        state.next_path += 1;
        let number = state.next_path;
        state.by_id.insert(
            id,
            Registered {
                path: number,
                object: Arc::downgrade(object),
            },
        );
        state.by_path.insert(number, id);
        tracing::trace!(target: targets::REGISTRY, %id, number, "object registered");
        Self::numbered_path(number)
    }

    fn lease_if_needed(&self, object: &AccessibleRef) {
        if object.id() == self.root {
            return;
        }
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.next_sweep.is_none_or(|due| now >= due) {
            state.sweep(now);
            state.next_sweep = Some(now + self.lease_duration);
        }
        state.leases.insert(
            object.id(),
            Lease {
                object: Arc::clone(object),
                expires: now + self.lease_duration,
            },
        );
    }
}

static_assertions::assert_impl_all!(AccessibleRegister: Send, Sync);
