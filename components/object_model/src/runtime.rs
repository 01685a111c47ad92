//! The runtime instance: heap, structure table, intern tables, roots.
//!
//! Everything is owned here and passed explicitly; there are no globals.
//! Property operations live in [`crate::ops`] as methods on [`Runtime`],
//! and the cache layer keys its entries on structure ids plus the
//! runtime-wide shape epoch maintained here.

use crate::atoms::{AtomTable, SymbolRegistry};
use crate::butterfly::SPARSE_INDEX_THRESHOLD;
use crate::object::{AccessorPair, CustomAccessorTable, JsObject, ProxyData, ProxyHandler};
use crate::ops::PropertySlot;
use crate::structure::{IndexingMode, StructureId, StructureStats, StructureTable};
use crate::watchpoint::{WatchpointRef, WatchpointSet};
use core_types::{
    parse_array_index, Atom, JsError, JsResult, ObjectRef, PropertyKey, SymbolId, Value,
};
use memory_manager::{GcStats, Heap, HeapConfig, RootSet};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Entries the runtime-wide megamorphic cache holds before a stale-entry
/// purge runs on insert.
pub const MEGAMORPHIC_CACHE_CAPACITY: usize = 1024;

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Heap sizing and incremental-marking budgets.
    pub heap: HeapConfig,
    /// Indices at or above this become named properties. Clamped to the
    /// compiled ceiling [`SPARSE_INDEX_THRESHOLD`].
    pub sparse_index_threshold: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            heap: HeapConfig::default(),
            sparse_index_threshold: SPARSE_INDEX_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    fn normalized(mut self) -> RuntimeConfig {
        if self.sparse_index_threshold == 0 || self.sparse_index_threshold > SPARSE_INDEX_THRESHOLD
        {
            self.sparse_index_threshold = SPARSE_INDEX_THRESHOLD;
        }
        self
    }
}

#[derive(Debug, Clone)]
struct MegamorphicEntry {
    epoch: u64,
    slot: PropertySlot,
}

/// Root interning key component. Two objects share a root structure only
/// when they agree on prototype, indexing mode and species, so a structure
/// id pins down the receiver's kind as well as its shape. Host-custom roots
/// split further by accessor table identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RootSpecies {
    Ordinary,
    Array,
    Proxy,
    HostCustom { table: usize },
    AccessorCell,
}

/// One JavaScript execution core: object heap plus all shared tables.
pub struct Runtime {
    pub(crate) heap: Heap<JsObject>,
    pub(crate) structures: StructureTable,
    atoms: AtomTable,
    symbols: SymbolRegistry,
    roots: RootSet,
    root_structures: FxHashMap<(Option<ObjectRef>, IndexingMode, RootSpecies), StructureId>,
    // Keeps every table that ever keyed a host-custom root alive, so the
    // address in the key cannot be reused by a later allocation.
    rooted_tables: Vec<Rc<CustomAccessorTable>>,
    replacement_watchpoints: FxHashMap<(StructureId, PropertyKey), WatchpointRef>,
    megamorphic: FxHashMap<(StructureId, PropertyKey), MegamorphicEntry>,
    shape_epoch: u64,
    pub(crate) length_atom: Atom,
    config: RuntimeConfig,
}

impl Runtime {
    /// Runtime with default configuration.
    pub fn new() -> Runtime {
        Runtime::with_config(RuntimeConfig::default())
    }

    /// Runtime with explicit tunables.
    pub fn with_config(config: RuntimeConfig) -> Runtime {
        let config = config.normalized();
        let mut atoms = AtomTable::new();
        let length_atom = atoms.intern("length");
        Runtime {
            heap: Heap::with_config(config.heap.clone()),
            structures: StructureTable::new(),
            atoms,
            symbols: SymbolRegistry::new(),
            roots: RootSet::new(),
            root_structures: FxHashMap::default(),
            rooted_tables: Vec::new(),
            replacement_watchpoints: FxHashMap::default(),
            megamorphic: FxHashMap::default(),
            shape_epoch: 0,
            length_atom,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ---- names and symbols ----

    /// Interns a property name.
    pub fn intern(&mut self, name: &str) -> Atom {
        self.atoms.intern(name)
    }

    /// The string behind an interned name.
    pub fn atom_name(&self, atom: Atom) -> &str {
        self.atoms.get(atom)
    }

    /// Mints a fresh symbol.
    pub fn new_symbol(&mut self, description: Option<&str>) -> SymbolId {
        self.symbols.create(description)
    }

    /// A symbol's description, if it has one.
    pub fn symbol_description(&self, id: SymbolId) -> Option<&str> {
        self.symbols.description(id)
    }

    /// Converts a string to a property key, canonicalizing array indices.
    ///
    /// `"3"` becomes an index key; `"03"`, `"-0"` and out-of-range numeric
    /// strings stay names.
    pub fn key_from_str(&mut self, name: &str) -> PropertyKey {
        match parse_array_index(name) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::Name(self.intern(name)),
        }
    }

    /// The key of the array `length` property.
    pub fn length_key(&self) -> PropertyKey {
        PropertyKey::Name(self.length_atom)
    }

    // ---- object construction ----

    fn root_structure(
        &mut self,
        prototype: Value,
        mode: IndexingMode,
        species: RootSpecies,
    ) -> StructureId {
        let handle = match prototype {
            Value::Object(obj) => Some(obj),
            _ => None,
        };
        if let Some(&id) = self.root_structures.get(&(handle, mode, species)) {
            return id;
        }
        if let Some(proto) = handle {
            // The table edge is new; keep it alive if a cycle is underway.
            self.heap.shade(proto);
        }
        let id = self.structures.new_root(prototype, mode);
        self.root_structures.insert((handle, mode, species), id);
        id
    }

    /// Allocates a plain object with the given prototype.
    pub fn new_object(&mut self, prototype: Value) -> JsResult<ObjectRef> {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));
        let structure =
            self.root_structure(prototype, IndexingMode::NoIndexing, RootSpecies::Ordinary);
        self.heap.alloc(JsObject::ordinary(structure))
    }

    /// Allocates an array with the given prototype.
    pub fn new_array(&mut self, prototype: Value) -> JsResult<ObjectRef> {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));
        let structure = self.root_structure(prototype, IndexingMode::Undecided, RootSpecies::Array);
        self.heap.alloc(JsObject::array(structure))
    }

    /// Allocates a proxy wrapping `target` with the given trap set.
    pub fn new_proxy(&mut self, target: Value, handler: Rc<ProxyHandler>) -> JsResult<ObjectRef> {
        debug_assert!(matches!(target, Value::Object(_)));
        let structure =
            self.root_structure(Value::Null, IndexingMode::NoIndexing, RootSpecies::Proxy);
        self.heap
            .alloc(JsObject::proxy(structure, ProxyData { target, handler }))
    }

    /// Allocates a host-custom object with an immutable accessor table.
    ///
    /// Objects built from the same table share a root structure; objects
    /// built from different tables never do, so a cached native getter can
    /// trust the receiver's table.
    pub fn new_host_custom(
        &mut self,
        table: Rc<CustomAccessorTable>,
        prototype: Value,
    ) -> JsResult<ObjectRef> {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));
        let species = RootSpecies::HostCustom {
            table: Rc::as_ptr(&table) as usize,
        };
        if !self.rooted_tables.iter().any(|t| Rc::ptr_eq(t, &table)) {
            self.rooted_tables.push(table.clone());
        }
        let structure = self.root_structure(prototype, IndexingMode::NoIndexing, species);
        self.heap.alloc(JsObject::host_custom(structure, table))
    }

    /// Allocates an internal accessor cell.
    pub(crate) fn new_accessor_cell(&mut self, pair: AccessorPair) -> JsResult<ObjectRef> {
        let structure = self.root_structure(
            Value::Null,
            IndexingMode::NoIndexing,
            RootSpecies::AccessorCell,
        );
        self.heap.alloc(JsObject::accessor_cell(structure, pair))
    }

    // ---- cell access ----

    /// Borrows a live object.
    pub fn object(&self, obj: ObjectRef) -> JsResult<&JsObject> {
        self.heap
            .get(obj)
            .ok_or_else(|| JsError::internal_error("stale object handle"))
    }

    pub(crate) fn object_mut(&mut self, obj: ObjectRef) -> JsResult<&mut JsObject> {
        self.heap
            .get_mut(obj)
            .ok_or_else(|| JsError::internal_error("stale object handle"))
    }

    /// Current structure id of a live object.
    pub fn structure_of(&self, obj: ObjectRef) -> JsResult<StructureId> {
        Ok(self.object(obj)?.structure)
    }

    /// The structure arena.
    pub fn structures(&self) -> &StructureTable {
        &self.structures
    }

    /// Low-level heap access, mainly for driving collection from embedders
    /// and tests. Property mutation goes through the operations instead.
    pub fn heap(&self) -> &Heap<JsObject> {
        &self.heap
    }

    // ---- structure adoption and watchpoints ----

    /// Moves `obj` onto `new_structure`, firing the old structure's
    /// transition watchpoint before the change is observable.
    pub(crate) fn transition_object(&mut self, obj: ObjectRef, new_structure: StructureId) {
        let old = match self.heap.get(obj) {
            Some(cell) => cell.structure,
            None => {
                debug_assert!(false, "transitioning a dead object");
                return;
            }
        };
        if old == new_structure {
            return;
        }
        let watchpoint = self.structures.get(old).transition_watchpoint().clone();
        if watchpoint.is_still_valid() {
            watchpoint.fire();
        }
        self.shape_epoch += 1;
        if let Some(cell) = self.heap.get_mut(obj) {
            cell.structure = new_structure;
        }
    }

    /// Records an in-place layout mutation of a dictionary structure.
    ///
    /// Fires the dictionary's transition watchpoint (its id does not change,
    /// so this is the only invalidation signal) and bumps the shape epoch.
    pub(crate) fn note_dictionary_mutation(&mut self, id: StructureId) {
        let watchpoint = self.structures.get(id).transition_watchpoint().clone();
        if watchpoint.is_still_valid() {
            watchpoint.fire();
        }
        self.shape_epoch += 1;
    }

    /// The transition watchpoint of a structure.
    pub fn transition_watchpoint(&self, id: StructureId) -> WatchpointRef {
        self.structures.get(id).transition_watchpoint().clone()
    }

    /// The replacement watchpoint for a slot, materializing it watched.
    ///
    /// Caches call this to rely on "this slot's value never changes".
    pub fn replacement_watchpoint(&mut self, id: StructureId, key: PropertyKey) -> WatchpointRef {
        self.replacement_watchpoints
            .entry((id, key))
            .or_insert_with(|| Rc::new(WatchpointSet::new_watched()))
            .clone()
    }

    /// Whether a still-valid replacement watchpoint exists for a slot.
    ///
    /// Put caching skips watched slots: every cached replace would fire the
    /// watchpoint it is guarded by.
    pub fn slot_is_watched(&self, id: StructureId, key: PropertyKey) -> bool {
        self.replacement_watchpoints
            .get(&(id, key))
            .map(|set| set.is_still_valid())
            .unwrap_or(false)
    }

    /// Fires the replacement watchpoint for a slot, if one was materialized.
    pub(crate) fn fire_replacement_watchpoint(&mut self, id: StructureId, key: PropertyKey) {
        if let Some(set) = self.replacement_watchpoints.get(&(id, key)) {
            if set.is_still_valid() {
                set.fire();
                self.shape_epoch += 1;
            }
        }
    }

    /// Monotonic counter bumped by every structure transition and
    /// watchpoint fire. Stamps megamorphic cache entries.
    pub fn shape_epoch(&self) -> u64 {
        self.shape_epoch
    }

    // ---- megamorphic cache ----

    /// Looks up a megamorphic resolution for `(structure, key)`.
    ///
    /// Entries stamped with an older epoch are ignored.
    pub fn megamorphic_lookup(
        &self,
        structure: StructureId,
        key: PropertyKey,
    ) -> Option<&PropertySlot> {
        self.megamorphic
            .get(&(structure, key))
            .filter(|entry| entry.epoch == self.shape_epoch)
            .map(|entry| &entry.slot)
    }

    /// Stores a megamorphic resolution stamped with the current epoch.
    ///
    /// Dictionary structures are refused: their layout mutates under an
    /// unchanged id.
    pub fn megamorphic_insert(&mut self, structure: StructureId, key: PropertyKey, slot: PropertySlot) {
        if self.structures.get(structure).is_dictionary() {
            return;
        }
        if self.megamorphic.len() >= MEGAMORPHIC_CACHE_CAPACITY {
            let current = self.shape_epoch;
            self.megamorphic.retain(|_, entry| entry.epoch == current);
        }
        self.megamorphic.insert(
            (structure, key),
            MegamorphicEntry {
                epoch: self.shape_epoch,
                slot,
            },
        );
    }

    // ---- garbage collection ----

    /// Registers a root the collector must keep alive.
    pub fn add_root(&mut self, obj: ObjectRef) {
        self.roots.add(obj);
    }

    /// Removes a registered root.
    pub fn remove_root(&mut self, obj: ObjectRef) -> bool {
        self.roots.remove(obj)
    }

    fn gc_roots(&self) -> Vec<ObjectRef> {
        let mut roots: Vec<ObjectRef> = self.roots.as_slice().to_vec();
        roots.extend(self.structures.prototype_roots());
        roots
    }

    /// Runs a full stop-the-world collection.
    ///
    /// Roots are the registered root set plus every prototype edge held by
    /// the structure table. Returns the number of objects reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self.gc_roots();
        self.heap.collect(&roots)
    }

    /// Starts an incremental marking cycle over the current roots.
    pub fn begin_incremental_marking(&mut self) {
        let roots = self.gc_roots();
        self.heap.begin_marking(&roots);
    }

    /// Runs one bounded marking increment. Returns `true` when marking has
    /// finished and the heap is ready to sweep.
    pub fn incremental_mark_step(&mut self) -> bool {
        self.heap.mark_increment()
    }

    /// Completes the active cycle: drains marking and sweeps.
    ///
    /// Returns the number of objects reclaimed.
    pub fn finish_collection(&mut self) -> usize {
        self.heap.finish_marking();
        self.heap.sweep()
    }

    /// Heap counters snapshot.
    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Structure-table counters.
    pub fn structure_stats(&self) -> &StructureStats {
        self.structures.stats()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}
