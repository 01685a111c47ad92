//! Typed object heap with incremental tri-color collection.
//!
//! The heap is a slab of typed slots addressed by [`ObjectRef`] handles.
//! Allocation reuses slots freed by earlier collections; handles of dead
//! objects become invalid and later resolve to a recycled object or to
//! nothing, which is why only the embedder's reachable handles may be used.
//!
//! Collection runs in three steps that the embedder drives explicitly:
//! [`Heap::begin_marking`] seeds the gray stack from the root set,
//! [`Heap::mark_increment`] performs a bounded slice of marking, and
//! [`Heap::sweep`] reclaims everything still white. [`Heap::collect`] runs
//! the whole cycle at once. Between increments the mutator may keep
//! mutating as long as every newly stored edge is reported through
//! [`Heap::write_barrier`].

use crate::marking::{AtomicMarkColor, GcPhase, MarkColor, MarkState};
use crate::trace::{Trace, Visitor};
use core_types::{JsError, JsResult, ObjectRef};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Configuration for incremental marking slices.
#[derive(Debug, Clone)]
pub struct IncrementalConfig {
    /// Target time slice for each marking increment (microseconds)
    pub time_slice_us: u64,
    /// Maximum objects to mark per increment (0 = unlimited)
    pub max_objects_per_slice: usize,
    /// Minimum objects to mark per increment (prevents too-short slices)
    pub min_objects_per_slice: usize,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        IncrementalConfig {
            time_slice_us: 1000, // 1ms default time slice
            max_objects_per_slice: 10000,
            min_objects_per_slice: 100,
        }
    }
}

/// Configuration for the heap.
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Slots reserved up front
    pub initial_capacity: usize,
    /// Hard limit on live objects (0 = unlimited)
    pub max_objects: usize,
    /// Live-object count above which `needs_collection` reports true
    /// (0 = never)
    pub gc_trigger: usize,
    /// Incremental marking configuration
    pub incremental: IncrementalConfig,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            initial_capacity: 256,
            max_objects: 0,
            gc_trigger: 10000,
            incremental: IncrementalConfig::default(),
        }
    }
}

/// Statistics for heap allocation and collection.
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    /// Number of objects allocated over the heap's lifetime
    pub allocations: usize,
    /// Number of completed collection cycles
    pub collections: usize,
    /// Number of marking increments performed
    pub increments: usize,
    /// Total objects marked across all cycles
    pub objects_marked: usize,
    /// Total objects reclaimed across all cycles
    pub objects_swept: usize,
    /// Number of objects shaded by the write barrier
    pub barrier_shades: usize,
    /// Objects currently live
    pub live_objects: usize,
}

/// Set of handles the embedder declares reachable.
///
/// Roots are the starting points for marking. The runtime keeps its global
/// object, scope values and other long-lived handles here.
#[derive(Debug, Default)]
pub struct RootSet {
    roots: Vec<ObjectRef>,
}

impl RootSet {
    /// Creates an empty root set.
    pub fn new() -> Self {
        RootSet { roots: Vec::new() }
    }

    /// Adds a root. Duplicate adds are ignored.
    pub fn add(&mut self, obj: ObjectRef) {
        if !self.roots.contains(&obj) {
            self.roots.push(obj);
        }
    }

    /// Removes a root. Returns true if it was present.
    pub fn remove(&mut self, obj: ObjectRef) -> bool {
        if let Some(position) = self.roots.iter().position(|&r| r == obj) {
            self.roots.swap_remove(position);
            true
        } else {
            false
        }
    }

    /// Returns whether the handle is rooted.
    pub fn contains(&self, obj: ObjectRef) -> bool {
        self.roots.contains(&obj)
    }

    /// Returns the roots as a slice.
    pub fn as_slice(&self) -> &[ObjectRef] {
        &self.roots
    }

    /// Returns the number of roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// A garbage-collected heap of `T` values.
pub struct Heap<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    marks: MarkState,
    config: HeapConfig,
    stats: GcStats,
}

impl<T: Trace> Heap<T> {
    /// Creates a new heap with default configuration.
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Creates a new heap with custom configuration.
    pub fn with_config(config: HeapConfig) -> Self {
        let mut heap = Heap {
            slots: Vec::new(),
            free: Vec::new(),
            marks: MarkState::new(),
            config,
            stats: GcStats::default(),
        };
        heap.slots.reserve(heap.config.initial_capacity);
        heap
    }

    /// Allocates a value, returning its handle.
    ///
    /// While a collection cycle is active the new object is allocated black
    /// so the in-progress cycle cannot reclaim it.
    ///
    /// # Errors
    ///
    /// Returns an `InternalError` when the configured object limit is
    /// reached.
    pub fn alloc(&mut self, value: T) -> JsResult<ObjectRef> {
        if self.config.max_objects > 0 && self.live_count() >= self.config.max_objects {
            return Err(JsError::internal_error("object heap limit reached"));
        }

        let color = if self.marks.phase() == GcPhase::Idle {
            MarkColor::White
        } else {
            MarkColor::Black
        };

        let index = match self.free.pop() {
            Some(index) => {
                let index = index as usize;
                self.slots[index] = Some(value);
                self.marks.set_color(index, color);
                index
            }
            None => {
                if self.slots.len() > u32::MAX as usize {
                    return Err(JsError::internal_error("object heap index space exhausted"));
                }
                self.slots.push(Some(value));
                self.marks.colors.push(AtomicMarkColor::new(color));
                self.slots.len() - 1
            }
        };

        self.stats.allocations += 1;
        Ok(ObjectRef(index as u32))
    }

    /// Returns a reference to the object, or None for a dead handle.
    pub fn get(&self, obj: ObjectRef) -> Option<&T> {
        self.slots.get(obj.index()).and_then(|slot| slot.as_ref())
    }

    /// Returns a mutable reference to the object, or None for a dead handle.
    ///
    /// Callers that store a new object reference into the value during an
    /// active collection must report the edge through
    /// [`Heap::write_barrier`] afterwards.
    pub fn get_mut(&mut self, obj: ObjectRef) -> Option<&mut T> {
        self.slots
            .get_mut(obj.index())
            .and_then(|slot| slot.as_mut())
    }

    /// Returns whether the handle refers to a live object.
    pub fn contains(&self, obj: ObjectRef) -> bool {
        self.get(obj).is_some()
    }

    /// Returns the number of live objects.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns the number of slots (live plus reusable).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the current collection phase.
    pub fn phase(&self) -> GcPhase {
        self.marks.phase()
    }

    /// Returns whether a marking cycle is active.
    pub fn is_marking(&self) -> bool {
        self.marks.phase() == GcPhase::Marking
    }

    /// Returns whether the live count has crossed the configured trigger.
    pub fn needs_collection(&self) -> bool {
        self.config.gc_trigger > 0 && self.live_count() >= self.config.gc_trigger
    }

    /// Starts a marking cycle from the given roots.
    ///
    /// Resets all colors to white, then shades the roots gray.
    pub fn begin_marking(&mut self, roots: &[ObjectRef]) {
        self.marks.stack.clear();
        for color in &self.marks.colors {
            color.store(MarkColor::White, Ordering::Relaxed);
        }
        self.marks.set_phase(GcPhase::Marking);
        for &root in roots {
            if self.contains(root) {
                self.marks.shade(root);
            }
        }
    }

    /// Performs one bounded increment of marking work.
    ///
    /// Returns true once marking is complete and the heap is ready to
    /// sweep.
    pub fn mark_increment(&mut self) -> bool {
        if self.marks.phase() != GcPhase::Marking {
            return true;
        }

        let start = Instant::now();
        let deadline = start + Duration::from_micros(self.config.incremental.time_slice_us);
        let mut objects_marked = 0;

        while let Some(obj) = self.marks.stack.pop() {
            self.marks.set_color(obj.index(), MarkColor::Black);
            if let Some(value) = self.slots.get(obj.index()).and_then(|slot| slot.as_ref()) {
                let mut visitor = Visitor::new(&self.marks);
                value.trace(&mut visitor);
            }
            objects_marked += 1;

            if objects_marked >= self.config.incremental.min_objects_per_slice {
                if Instant::now() >= deadline {
                    break;
                }
                if self.config.incremental.max_objects_per_slice > 0
                    && objects_marked >= self.config.incremental.max_objects_per_slice
                {
                    break;
                }
            }
        }

        self.stats.increments += 1;
        self.stats.objects_marked += objects_marked;

        let complete = self.marks.stack.is_empty();
        if complete {
            self.marks.set_phase(GcPhase::Sweeping);
        }
        complete
    }

    /// Drains all remaining marking work.
    pub fn finish_marking(&mut self) {
        while !self.mark_increment() {}
    }

    /// Reclaims every object still white, returning the number freed.
    ///
    /// Survivors are reset to white for the next cycle. Does nothing when
    /// no cycle is active; an unfinished marking phase is drained first.
    pub fn sweep(&mut self) -> usize {
        match self.marks.phase() {
            GcPhase::Idle => return 0,
            GcPhase::Marking => self.finish_marking(),
            GcPhase::Sweeping => {}
        }

        let mut swept = 0;
        for index in 0..self.slots.len() {
            if self.slots[index].is_none() {
                continue;
            }
            match self.marks.color(index) {
                MarkColor::White => {
                    self.slots[index] = None;
                    self.free.push(index as u32);
                    swept += 1;
                }
                _ => self.marks.set_color(index, MarkColor::White),
            }
        }

        self.stats.objects_swept += swept;
        self.stats.collections += 1;
        self.marks.set_phase(GcPhase::Idle);
        swept
    }

    /// Runs a full stop-the-world collection cycle.
    ///
    /// Returns the number of objects reclaimed.
    pub fn collect(&mut self, roots: &[ObjectRef]) -> usize {
        self.begin_marking(roots);
        self.finish_marking();
        self.sweep()
    }

    /// Dijkstra-style write barrier.
    ///
    /// Must be called after storing `child` into a field of `parent` while
    /// marking is active. If the parent was already scanned (black) the
    /// child is shaded gray so the new edge cannot be missed.
    pub fn write_barrier(&self, parent: ObjectRef, child: ObjectRef) {
        if self.marks.phase() != GcPhase::Marking {
            return;
        }
        if self.marks.color(parent.index()) == MarkColor::Black && self.marks.shade(child) {
            self.marks.barrier_shades.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Marks `obj` reachable during an active cycle.
    ///
    /// For edges that bypass heap cells, such as a table-held prototype
    /// reference installed while marking is underway. Outside of marking
    /// this is a no-op; the next cycle picks the edge up from its root.
    pub fn shade(&self, obj: ObjectRef) {
        if self.marks.phase() != GcPhase::Marking {
            return;
        }
        if self.marks.shade(obj) {
            self.marks.barrier_shades.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of the heap statistics.
    pub fn stats(&self) -> GcStats {
        let mut stats = self.stats.clone();
        stats.barrier_shades = self.marks.barrier_shades.load(Ordering::Relaxed);
        stats.live_objects = self.live_count();
        stats
    }
}

impl<T: Trace> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}
