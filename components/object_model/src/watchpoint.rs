//! Watchpoints: one-shot invalidation cells shared with the cache layer.
//!
//! A watchpoint set guards an invariant such as "this structure has never
//! transitioned" or "this slot's value has never been replaced". Caches hold
//! `Rc` handles to the sets they relied on while resolving a property and
//! re-check them on every hit. Firing is sticky: once the guarded event has
//! happened the set can never become watchable again.

use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle of a watchpoint set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchpointState {
    /// The guarded event has not happened and nobody is watching.
    Clear,
    /// At least one cache depends on the guarded invariant.
    Watched,
    /// The guarded event happened. Terminal.
    Invalidated,
}

/// A shared invalidation cell.
///
/// Single mutator thread; interior mutability through `Cell` only.
#[derive(Debug)]
pub struct WatchpointSet {
    state: Cell<WatchpointState>,
    fire_count: Cell<u32>,
}

impl WatchpointSet {
    /// Creates a clear set.
    pub fn new() -> WatchpointSet {
        WatchpointSet {
            state: Cell::new(WatchpointState::Clear),
            fire_count: Cell::new(0),
        }
    }

    /// Creates a set already in the watched state.
    ///
    /// Used for lazily materialized sets whose first observer is the reason
    /// they exist, such as per-slot replacement watchpoints.
    pub fn new_watched() -> WatchpointSet {
        WatchpointSet {
            state: Cell::new(WatchpointState::Watched),
            fire_count: Cell::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatchpointState {
        self.state.get()
    }

    /// Registers interest in the guarded invariant.
    ///
    /// Returns `false` if the set has already been invalidated, in which case
    /// the caller must not cache against it.
    pub fn start_watching(&self) -> bool {
        match self.state.get() {
            WatchpointState::Clear => {
                self.state.set(WatchpointState::Watched);
                true
            }
            WatchpointState::Watched => true,
            WatchpointState::Invalidated => false,
        }
    }

    /// Whether cached entries guarded by this set may still be used.
    pub fn is_still_valid(&self) -> bool {
        self.state.get() != WatchpointState::Invalidated
    }

    /// Whether the guarded event has happened.
    pub fn has_been_invalidated(&self) -> bool {
        self.state.get() == WatchpointState::Invalidated
    }

    /// Records that the guarded event happened.
    ///
    /// Must be called before the mutation becomes observable so that no
    /// cache can read the new state through a stale entry. Returns `true`
    /// when watchers existed, i.e. the fire actually invalidated something.
    pub fn fire(&self) -> bool {
        let had_watchers = self.state.get() == WatchpointState::Watched;
        if self.state.get() != WatchpointState::Invalidated {
            self.state.set(WatchpointState::Invalidated);
            self.fire_count.set(self.fire_count.get() + 1);
        }
        had_watchers
    }

    /// Number of times `fire` flipped this set to invalidated.
    ///
    /// At most 1; redundant fires on an already-invalidated set do not count.
    pub fn fire_count(&self) -> u32 {
        self.fire_count.get()
    }
}

impl Default for WatchpointSet {
    fn default() -> Self {
        WatchpointSet::new()
    }
}

/// Shared handle to a watchpoint set.
pub type WatchpointRef = Rc<WatchpointSet>;
