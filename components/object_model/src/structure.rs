//! Structures: shared property-layout descriptors and their transition DAG.
//!
//! A structure records everything about an object's shape except the values:
//! the ordered property table (key, slot offset, attributes), the prototype,
//! the indexing mode of the element storage, and the extensible flag. Objects
//! built by identical operation sequences from a common ancestor share one
//! structure, so caches can key on a [`StructureId`] alone.
//!
//! Shared structures are immutable once published. Every shape change is a
//! transition to another structure, found through an interned edge table so
//! repeated sequences converge on the same ids. Dictionary structures are the
//! escape hatch: private to one object, mutated in place, never interned and
//! never the target of an edge.
//!
//! Structures live for the life of the runtime. A cache holding a
//! `StructureId` keeps nothing alive and can never dangle.

use crate::attributes::PropertyAttributes;
use crate::watchpoint::{WatchpointRef, WatchpointSet};
use core_types::{ObjectRef, PropertyKey, Value};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Transition-chain length at which an add demotes to dictionary mode
/// instead of growing a degenerate chain.
pub const TRANSITION_CHAIN_CAP: u32 = 64;

/// Index of a structure in the runtime's [`StructureTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct StructureId(pub u32);

impl StructureId {
    /// Arena slot behind this id.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How the butterfly's element side is encoded.
///
/// The ladder is monotonic: storage only ever transitions to a heavier mode,
/// so a cached mode check can only become stale in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexingMode {
    /// No element storage has ever been touched.
    NoIndexing,
    /// Element storage exists but no element has fixed its encoding.
    Undecided,
    /// All elements are 32-bit integers.
    Int32,
    /// All elements are doubles.
    Double,
    /// Elements are arbitrary values in a dense vector.
    Contiguous,
    /// Dense vector plus a sparse map with per-index attributes.
    ArrayStorage,
}

impl IndexingMode {
    fn rank(self) -> u8 {
        match self {
            IndexingMode::NoIndexing => 0,
            IndexingMode::Undecided => 1,
            IndexingMode::Int32 => 2,
            IndexingMode::Double => 3,
            IndexingMode::Contiguous => 4,
            IndexingMode::ArrayStorage => 5,
        }
    }

    /// Whether `target` is a strictly heavier mode than `self`.
    pub fn can_transition_to(self, target: IndexingMode) -> bool {
        target.rank() > self.rank()
    }

    /// Whether this mode carries a sparse map.
    pub fn is_array_storage(self) -> bool {
        matches!(self, IndexingMode::ArrayStorage)
    }
}

/// One named or symbol-keyed property in a structure's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEntry {
    /// The property key.
    pub key: PropertyKey,
    /// Slot offset into the butterfly's out-of-line storage.
    pub offset: u32,
    /// Attribute bits.
    pub attributes: PropertyAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TransitionKind {
    Add {
        key: PropertyKey,
        attrs: PropertyAttributes,
    },
    Reconfigure {
        key: PropertyKey,
        attrs: PropertyAttributes,
    },
    Indexing(IndexingMode),
    Prototype(Option<ObjectRef>),
    PreventExtensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransitionKey {
    from: StructureId,
    kind: TransitionKind,
}

/// A property-layout descriptor.
///
/// Field mutation happens only through the owning [`StructureTable`], and
/// only while the structure is in dictionary mode.
#[derive(Debug)]
pub struct Structure {
    id: StructureId,
    entries: Vec<PropertyEntry>,
    index: FxHashMap<PropertyKey, usize>,
    prototype: Value,
    indexing_mode: IndexingMode,
    extensible: bool,
    dictionary: bool,
    freed_offsets: Vec<u32>,
    next_offset: u32,
    transition_count: u32,
    transition_watchpoint: WatchpointRef,
}

impl Structure {
    fn new_root(id: StructureId, prototype: Value, indexing_mode: IndexingMode) -> Structure {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));
        Structure {
            id,
            entries: Vec::new(),
            index: FxHashMap::default(),
            prototype,
            indexing_mode,
            extensible: true,
            dictionary: false,
            freed_offsets: Vec::new(),
            next_offset: 0,
            transition_count: 0,
            transition_watchpoint: Rc::new(WatchpointSet::new()),
        }
    }

    /// Child sharing the parent's layout, one transition deeper.
    fn child_of(parent: &Structure, id: StructureId) -> Structure {
        Structure {
            id,
            entries: parent.entries.clone(),
            index: parent.index.clone(),
            prototype: parent.prototype.clone(),
            indexing_mode: parent.indexing_mode,
            extensible: parent.extensible,
            dictionary: false,
            freed_offsets: Vec::new(),
            next_offset: parent.next_offset,
            transition_count: parent.transition_count + 1,
            transition_watchpoint: Rc::new(WatchpointSet::new()),
        }
    }

    /// This structure's id.
    pub fn id(&self) -> StructureId {
        self.id
    }

    /// Prototype value, `Value::Object` or `Value::Null`.
    pub fn prototype(&self) -> &Value {
        &self.prototype
    }

    /// Element-storage encoding.
    pub fn indexing_mode(&self) -> IndexingMode {
        self.indexing_mode
    }

    /// Whether new properties may be added.
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    /// Whether this structure is private to one object and mutable in place.
    pub fn is_dictionary(&self) -> bool {
        self.dictionary
    }

    /// Looks up a property entry by key.
    pub fn get(&self, key: PropertyKey) -> Option<&PropertyEntry> {
        self.index.get(&key).map(|&pos| &self.entries[pos])
    }

    /// Whether the table contains `key`.
    pub fn contains(&self, key: PropertyKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Property entries in insertion order.
    pub fn entries(&self) -> &[PropertyEntry] {
        &self.entries
    }

    /// Number of live properties.
    pub fn property_count(&self) -> usize {
        self.entries.len()
    }

    /// Out-of-line slots the butterfly must back, including freed ones.
    pub fn out_of_line_size(&self) -> u32 {
        self.next_offset
    }

    /// Length of the transition chain from the root.
    pub fn transition_count(&self) -> u32 {
        self.transition_count
    }

    /// Watchpoint fired when an object leaves this structure or, in
    /// dictionary mode, when the layout mutates under the same id.
    pub fn transition_watchpoint(&self) -> &WatchpointRef {
        &self.transition_watchpoint
    }

    /// Whether freed slots dominate live ones (auto-flatten trigger).
    pub fn should_flatten(&self) -> bool {
        self.dictionary && self.freed_offsets.len() > self.entries.len()
    }

    fn proto_handle(&self) -> Option<ObjectRef> {
        match self.prototype {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Counters for structure-table behavior.
#[derive(Debug, Default, Clone)]
pub struct StructureStats {
    /// Structures allocated in the arena, roots and dictionaries included.
    pub structures_created: u64,
    /// Transitions that found an existing interned edge.
    pub transition_hits: u64,
    /// Transitions that created and interned a new edge.
    pub transitions_interned: u64,
    /// Shared structures demoted to private dictionaries.
    pub dictionary_conversions: u64,
    /// Dictionary flattening passes.
    pub flattens: u64,
}

/// Arena of all structures plus the interned transition-edge table.
#[derive(Debug, Default)]
pub struct StructureTable {
    structures: Vec<Structure>,
    transitions: FxHashMap<TransitionKey, StructureId>,
    stats: StructureStats,
}

/// Result of an add transition: the structure to adopt and the slot offset
/// assigned to the new property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAdd {
    /// Structure the object must adopt.
    pub structure: StructureId,
    /// Out-of-line offset of the new property.
    pub offset: u32,
}

impl StructureTable {
    /// Creates an empty table.
    pub fn new() -> StructureTable {
        StructureTable::default()
    }

    fn push(&mut self, structure: Structure) -> StructureId {
        let id = structure.id;
        debug_assert_eq!(id.index(), self.structures.len());
        self.structures.push(structure);
        self.stats.structures_created += 1;
        id
    }

    fn next_id(&self) -> StructureId {
        StructureId(self.structures.len() as u32)
    }

    /// Allocates a fresh root structure with no properties.
    pub fn new_root(&mut self, prototype: Value, indexing_mode: IndexingMode) -> StructureId {
        let id = self.next_id();
        self.push(Structure::new_root(id, prototype, indexing_mode))
    }

    /// Borrows a structure by id.
    pub fn get(&self, id: StructureId) -> &Structure {
        &self.structures[id.index()]
    }

    fn get_mut(&mut self, id: StructureId) -> &mut Structure {
        &mut self.structures[id.index()]
    }

    /// Counters snapshot.
    pub fn stats(&self) -> &StructureStats {
        &self.stats
    }

    /// Number of structures in the arena.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Prototype handles of every structure, for root scanning.
    pub fn prototype_roots(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.structures.iter().filter_map(|s| s.proto_handle())
    }

    fn follow_or_intern<F>(&mut self, key: TransitionKey, build: F) -> StructureId
    where
        F: FnOnce(&Structure, StructureId) -> Structure,
    {
        if let Some(&existing) = self.transitions.get(&key) {
            self.stats.transition_hits += 1;
            return existing;
        }
        let id = self.next_id();
        let child = build(self.get(key.from), id);
        self.push(child);
        self.transitions.insert(key, id);
        self.stats.transitions_interned += 1;
        id
    }

    /// Transition for adding a property.
    ///
    /// On a shared structure this follows or interns an edge; past the chain
    /// cap it demotes to a dictionary instead. On a dictionary it mutates in
    /// place, preferring pooled freed offsets. The caller is responsible for
    /// the extensibility check and, on shared structures, for firing the
    /// source's transition watchpoint when an object adopts the result.
    pub fn add_property_transition(
        &mut self,
        from: StructureId,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> PropertyAdd {
        debug_assert!(!self.get(from).contains(key));

        if self.get(from).dictionary {
            let offset = self.dictionary_add(from, key, attrs);
            return PropertyAdd {
                structure: from,
                offset,
            };
        }

        if self.get(from).transition_count >= TRANSITION_CHAIN_CAP {
            let dict = self.to_dictionary(from);
            let offset = self.dictionary_add(dict, key, attrs);
            return PropertyAdd {
                structure: dict,
                offset,
            };
        }

        let edge = TransitionKey {
            from,
            kind: TransitionKind::Add { key, attrs },
        };
        if let Some(&existing) = self.transitions.get(&edge) {
            self.stats.transition_hits += 1;
            // An interned add edge always targets a structure carrying the key.
            let offset = match self.get(existing).get(key) {
                Some(entry) => entry.offset,
                None => {
                    debug_assert!(false, "add edge target lost its entry");
                    0
                }
            };
            return PropertyAdd {
                structure: existing,
                offset,
            };
        }

        let id = self.next_id();
        let mut child = Structure::child_of(self.get(from), id);
        let offset = child.next_offset;
        child.next_offset += 1;
        child.index.insert(key, child.entries.len());
        child.entries.push(PropertyEntry {
            key,
            offset,
            attributes: attrs,
        });
        self.push(child);
        self.transitions.insert(edge, id);
        self.stats.transitions_interned += 1;
        PropertyAdd {
            structure: id,
            offset,
        }
    }

    /// Transition for changing an existing property's attributes.
    ///
    /// The slot offset is preserved in both the shared and dictionary paths.
    pub fn reconfigure_transition(
        &mut self,
        from: StructureId,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> StructureId {
        debug_assert!(self.get(from).contains(key));

        if self.get(from).dictionary {
            let s = self.get_mut(from);
            if let Some(&pos) = s.index.get(&key) {
                s.entries[pos].attributes = attrs;
            }
            return from;
        }

        let edge = TransitionKey {
            from,
            kind: TransitionKind::Reconfigure { key, attrs },
        };
        self.follow_or_intern(edge, |parent, id| {
            let mut child = Structure::child_of(parent, id);
            if let Some(&pos) = child.index.get(&key) {
                child.entries[pos].attributes = attrs;
            }
            child
        })
    }

    /// Transition to a heavier indexing mode.
    pub fn indexing_transition(&mut self, from: StructureId, mode: IndexingMode) -> StructureId {
        debug_assert!(self.get(from).indexing_mode.can_transition_to(mode));

        if self.get(from).dictionary {
            self.get_mut(from).indexing_mode = mode;
            return from;
        }

        let edge = TransitionKey {
            from,
            kind: TransitionKind::Indexing(mode),
        };
        self.follow_or_intern(edge, |parent, id| {
            let mut child = Structure::child_of(parent, id);
            child.indexing_mode = mode;
            child
        })
    }

    /// Transition to a different prototype.
    pub fn prototype_transition(&mut self, from: StructureId, prototype: Value) -> StructureId {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));

        if self.get(from).dictionary {
            self.get_mut(from).prototype = prototype;
            return from;
        }

        let proto_handle = match prototype {
            Value::Object(obj) => Some(obj),
            _ => None,
        };
        let edge = TransitionKey {
            from,
            kind: TransitionKind::Prototype(proto_handle),
        };
        self.follow_or_intern(edge, |parent, id| {
            let mut child = Structure::child_of(parent, id);
            child.prototype = prototype.clone();
            child
        })
    }

    /// Transition to the non-extensible state.
    pub fn prevent_extensions_transition(&mut self, from: StructureId) -> StructureId {
        if self.get(from).dictionary {
            self.get_mut(from).extensible = false;
            return from;
        }

        let edge = TransitionKey {
            from,
            kind: TransitionKind::PreventExtensions,
        };
        self.follow_or_intern(edge, |parent, id| {
            let mut child = Structure::child_of(parent, id);
            child.extensible = false;
            child
        })
    }

    /// Demotes a shared structure to a fresh private dictionary.
    ///
    /// The dictionary copies the layout but is never interned and never the
    /// target of a transition edge. Calling this on a structure that is
    /// already a dictionary returns it unchanged.
    pub fn to_dictionary(&mut self, from: StructureId) -> StructureId {
        if self.get(from).dictionary {
            return from;
        }
        let id = self.next_id();
        let parent = self.get(from);
        let mut dict = Structure::child_of(parent, id);
        dict.dictionary = true;
        self.push(dict);
        self.stats.dictionary_conversions += 1;
        id
    }

    /// Adds a property to a dictionary in place, reusing a freed offset when
    /// one is pooled.
    pub fn dictionary_add(
        &mut self,
        id: StructureId,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> u32 {
        let s = self.get_mut(id);
        debug_assert!(s.dictionary);
        debug_assert!(!s.index.contains_key(&key));
        let offset = match s.freed_offsets.pop() {
            Some(freed) => freed,
            None => {
                let fresh = s.next_offset;
                s.next_offset += 1;
                fresh
            }
        };
        s.index.insert(key, s.entries.len());
        s.entries.push(PropertyEntry {
            key,
            offset,
            attributes: attrs,
        });
        offset
    }

    /// Removes a property from a dictionary in place.
    ///
    /// The freed offset goes to the pool; later entries keep their order so
    /// enumeration still reflects insertion order.
    pub fn dictionary_remove(
        &mut self,
        id: StructureId,
        key: PropertyKey,
    ) -> Option<(u32, PropertyAttributes)> {
        let s = self.get_mut(id);
        debug_assert!(s.dictionary);
        let pos = s.index.remove(&key)?;
        let entry = s.entries.remove(pos);
        for slot in s.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        s.freed_offsets.push(entry.offset);
        Some((entry.offset, entry.attributes))
    }

    /// Rebuilds a dictionary's offset table densely in entry order.
    ///
    /// Returns one `(old_offset, new_offset)` pair per entry so the caller
    /// can compact the butterfly to match. Clears the freed-offset pool.
    pub fn flatten(&mut self, id: StructureId) -> Vec<(u32, u32)> {
        let s = self.get_mut(id);
        debug_assert!(s.dictionary);
        let mut moves = Vec::with_capacity(s.entries.len());
        for (new_offset, entry) in s.entries.iter_mut().enumerate() {
            let new_offset = new_offset as u32;
            moves.push((entry.offset, new_offset));
            entry.offset = new_offset;
        }
        s.next_offset = s.entries.len() as u32;
        s.freed_offsets.clear();
        self.stats.flattens += 1;
        moves
    }
}
