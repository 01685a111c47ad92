//! Tri-color marking primitives.
//!
//! Objects are classified into three colors:
//! - **White**: Not yet visited (potentially garbage)
//! - **Gray**: Visited but children not yet scanned (in the mark stack)
//! - **Black**: Fully processed (definitely reachable)
//!
//! The tri-color invariant states that no black object points directly to a
//! white object. The write barrier in [`crate::heap::Heap`] maintains this
//! invariant while the mutator runs between marking increments.

use core_types::ObjectRef;
use crossbeam::atomic::AtomicCell;
use crossbeam_deque::{Injector, Steal, Worker};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Mark colors for tri-color marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarkColor {
    /// Unmarked (not yet visited)
    White = 0,
    /// In process (reachable, needs scanning)
    Gray = 1,
    /// Fully processed (reachable, all references scanned)
    Black = 2,
}

/// Atomic mark color for barrier-safe marking operations.
///
/// Colors are read and written through shared references by the write
/// barrier and the marking loop, so they are stored atomically.
#[repr(transparent)]
pub struct AtomicMarkColor(AtomicU8);

impl AtomicMarkColor {
    /// Creates a new atomic mark color with the given initial value.
    pub fn new(color: MarkColor) -> Self {
        AtomicMarkColor(AtomicU8::new(color as u8))
    }

    /// Loads the current mark color.
    pub fn load(&self, ordering: Ordering) -> MarkColor {
        Self::u8_to_color(self.0.load(ordering))
    }

    /// Stores a mark color.
    pub fn store(&self, color: MarkColor, ordering: Ordering) {
        self.0.store(color as u8, ordering);
    }

    /// Atomically compares and exchanges the mark color.
    ///
    /// Returns Ok(old) if the exchange succeeded, Err(actual) if it failed.
    pub fn compare_exchange(
        &self,
        current: MarkColor,
        new: MarkColor,
        success: Ordering,
        failure: Ordering,
    ) -> Result<MarkColor, MarkColor> {
        match self
            .0
            .compare_exchange(current as u8, new as u8, success, failure)
        {
            Ok(v) => Ok(Self::u8_to_color(v)),
            Err(v) => Err(Self::u8_to_color(v)),
        }
    }

    fn u8_to_color(v: u8) -> MarkColor {
        match v {
            0 => MarkColor::White,
            1 => MarkColor::Gray,
            2 => MarkColor::Black,
            _ => MarkColor::White,
        }
    }
}

/// State of the GC cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    /// No GC in progress, mutator running normally
    Idle,
    /// Marking phase - interleaved with mutator increments
    Marking,
    /// Marking finished, unreachable objects awaiting sweep
    Sweeping,
}

impl Default for GcPhase {
    fn default() -> Self {
        GcPhase::Idle
    }
}

/// Mark stack for gray objects.
///
/// Uses a work-stealing deque from crossbeam. The marking loop pushes and
/// pops through the local worker; the write barrier feeds newly shaded
/// objects through the global injector.
pub struct MarkStack {
    /// Local worker deque for the marking loop
    local: Worker<ObjectRef>,
    /// Global injector for roots and barrier-shaded objects
    injector: Injector<ObjectRef>,
    /// Number of items currently in the stack (approximate)
    size: AtomicUsize,
}

impl MarkStack {
    /// Creates a new empty mark stack.
    pub fn new() -> Self {
        MarkStack {
            local: Worker::new_fifo(),
            injector: Injector::new(),
            size: AtomicUsize::new(0),
        }
    }

    /// Pushes an object onto the mark stack.
    ///
    /// The object should be gray (needs scanning).
    pub fn push(&self, obj: ObjectRef) {
        self.local.push(obj);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    /// Pushes an object via the global injector.
    pub fn push_global(&self, obj: ObjectRef) {
        self.injector.push(obj);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    /// Pops an object from the mark stack.
    ///
    /// Tries the local deque first, then steals from the global injector.
    pub fn pop(&self) -> Option<ObjectRef> {
        if let Some(obj) = self.local.pop() {
            self.size.fetch_sub(1, Ordering::Relaxed);
            return Some(obj);
        }

        loop {
            match self.injector.steal() {
                Steal::Success(obj) => {
                    self.size.fetch_sub(1, Ordering::Relaxed);
                    return Some(obj);
                }
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    /// Returns true if the mark stack is empty.
    pub fn is_empty(&self) -> bool {
        self.size.load(Ordering::Relaxed) == 0 && self.injector.is_empty()
    }

    /// Returns the approximate number of items in the stack.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Clears the mark stack.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl Default for MarkStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-heap marking state: one color per slot, the gray stack, and the
/// current phase.
pub(crate) struct MarkState {
    pub(crate) colors: Vec<AtomicMarkColor>,
    pub(crate) stack: MarkStack,
    phase: AtomicCell<GcPhase>,
    pub(crate) barrier_shades: AtomicUsize,
}

impl MarkState {
    pub(crate) fn new() -> Self {
        MarkState {
            colors: Vec::new(),
            stack: MarkStack::new(),
            phase: AtomicCell::new(GcPhase::Idle),
            barrier_shades: AtomicUsize::new(0),
        }
    }

    pub(crate) fn phase(&self) -> GcPhase {
        self.phase.load()
    }

    pub(crate) fn set_phase(&self, phase: GcPhase) {
        self.phase.store(phase);
    }

    pub(crate) fn color(&self, index: usize) -> MarkColor {
        match self.colors.get(index) {
            Some(color) => color.load(Ordering::Acquire),
            None => MarkColor::White,
        }
    }

    pub(crate) fn set_color(&self, index: usize, color: MarkColor) {
        if let Some(slot) = self.colors.get(index) {
            slot.store(color, Ordering::Release);
        }
    }

    /// Shades an object gray if it is white, pushing it onto the stack.
    ///
    /// Returns true if this call performed the white-to-gray transition.
    pub(crate) fn shade(&self, obj: ObjectRef) -> bool {
        let Some(slot) = self.colors.get(obj.index()) else {
            return false;
        };
        let shaded = slot
            .compare_exchange(
                MarkColor::White,
                MarkColor::Gray,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok();
        if shaded {
            self.stack.push_global(obj);
        }
        shaded
    }
}
