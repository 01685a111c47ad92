//! Butterfly storage: out-of-line named slots plus indexed elements.
//!
//! The named side is a flat slot vector addressed by structure-assigned
//! offsets. The indexed side is an encoding ladder that only gets heavier:
//! `Undecided` until the first element fixes an encoding, then raw `Int32` or
//! `Double` vectors, then boxed `Contiguous`, then `ArrayStorage` which adds
//! a sparse map with per-index attributes. Element slots are `Option`-based
//! so a hole is distinguishable from a stored `undefined`.
//!
//! The butterfly knows nothing about structures: offset validity is the
//! caller's contract, enforced here with debug assertions only.

use crate::attributes::PropertyAttributes;
use crate::structure::IndexingMode;
use core_types::Value;
use rustc_hash::FxHashMap;

/// Indices at or above this go to named properties, never element storage.
///
/// Keeps a single huge index from forcing a giant dense allocation or a
/// permanently sparse element map.
pub const SPARSE_INDEX_THRESHOLD: u32 = 100_000;

/// Geometric growth: half again the current size, at least four slots, and
/// always enough for the request.
fn grown_capacity(current: usize, required: usize) -> usize {
    required.max(current + (current / 2).max(4))
}

/// A non-default-attribute element in [`ArrayStorage`]'s sparse map.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseEntry {
    /// The element value.
    pub value: Value,
    /// Per-index attribute bits.
    pub attributes: PropertyAttributes,
}

/// ArrayStorage payload: dense vector plus sparse entries.
///
/// Every present index lives in exactly one side. The vector holds
/// default-attribute elements; the sparse map holds elements whose
/// attributes were changed by `defineProperty`-style operations.
#[derive(Debug, Default)]
pub struct ArrayStorage {
    /// Dense elements with default attributes.
    pub vector: Vec<Option<Value>>,
    /// Non-default-attribute elements keyed by index.
    pub sparse: FxHashMap<u32, SparseEntry>,
}

/// Element storage in one of the ladder's encodings.
#[derive(Debug)]
pub enum IndexedStorage {
    /// No element has fixed an encoding yet. Remembers requested capacity.
    Undecided {
        /// Capacity to pre-reserve once an encoding is chosen.
        capacity: usize,
    },
    /// Unboxed 32-bit integers.
    Int32(Vec<Option<i32>>),
    /// Unboxed doubles.
    Double(Vec<Option<f64>>),
    /// Boxed values.
    Contiguous(Vec<Option<Value>>),
    /// Boxed values plus the sparse side table.
    ArrayStorage(ArrayStorage),
}

impl IndexedStorage {
    /// The ladder rung this storage implements.
    pub fn mode(&self) -> IndexingMode {
        match self {
            IndexedStorage::Undecided { .. } => IndexingMode::Undecided,
            IndexedStorage::Int32(_) => IndexingMode::Int32,
            IndexedStorage::Double(_) => IndexingMode::Double,
            IndexedStorage::Contiguous(_) => IndexingMode::Contiguous,
            IndexedStorage::ArrayStorage(_) => IndexingMode::ArrayStorage,
        }
    }

    fn vector_len(&self) -> usize {
        match self {
            IndexedStorage::Undecided { .. } => 0,
            IndexedStorage::Int32(v) => v.len(),
            IndexedStorage::Double(v) => v.len(),
            IndexedStorage::Contiguous(v) => v.len(),
            IndexedStorage::ArrayStorage(s) => s.vector.len(),
        }
    }
}

/// The storage block behind one object.
#[derive(Debug)]
pub struct Butterfly {
    named: Vec<Value>,
    indexed: IndexedStorage,
    public_length: u32,
}

impl Butterfly {
    /// Empty butterfly with no slots on either side.
    pub fn new() -> Butterfly {
        Butterfly::allocate(0, 0)
    }

    /// Butterfly with pre-reserved capacity on both sides.
    pub fn allocate(out_of_line_capacity: usize, indexed_capacity: usize) -> Butterfly {
        let mut named = Vec::new();
        named.resize(out_of_line_capacity, Value::Undefined);
        Butterfly {
            named,
            indexed: IndexedStorage::Undecided {
                capacity: indexed_capacity,
            },
            public_length: 0,
        }
    }

    // ---- named (out-of-line) side ----

    /// Slots currently backed on the named side.
    pub fn out_of_line_capacity(&self) -> u32 {
        self.named.len() as u32
    }

    /// Grows the named side to back at least `new_capacity` slots.
    ///
    /// New slots read as `undefined` until a structure assigns them.
    pub fn grow_out_of_line(&mut self, new_capacity: u32) {
        let required = new_capacity as usize;
        if required > self.named.len() {
            let target = grown_capacity(self.named.len(), required);
            self.named.resize(target, Value::Undefined);
        }
    }

    /// Reads the named slot at `offset`.
    pub fn read_offset(&self, offset: u32) -> &Value {
        debug_assert!((offset as usize) < self.named.len());
        &self.named[offset as usize]
    }

    /// Writes the named slot at `offset`.
    pub fn write_offset(&mut self, offset: u32, value: Value) {
        debug_assert!((offset as usize) < self.named.len());
        self.named[offset as usize] = value;
    }

    /// Rearranges named slots after a dictionary flatten.
    ///
    /// `moves` holds one `(old_offset, new_offset)` pair per live property;
    /// slots beyond the flattened size are dropped.
    pub fn compact_out_of_line(&mut self, moves: &[(u32, u32)], new_size: u32) {
        let mut compacted = Vec::new();
        compacted.resize(new_size as usize, Value::Undefined);
        for &(old, new) in moves {
            debug_assert!((old as usize) < self.named.len());
            debug_assert!((new as usize) < compacted.len());
            compacted[new as usize] = self.named[old as usize].clone();
        }
        self.named = compacted;
    }

    /// Named slot values, for tracing.
    pub fn named_slots(&self) -> &[Value] {
        &self.named
    }

    // ---- indexed side ----

    /// Borrows the element storage.
    pub fn indexed(&self) -> &IndexedStorage {
        &self.indexed
    }

    /// Vector length of the active encoding (sparse entries not counted).
    pub fn indexed_vector_length(&self) -> usize {
        self.indexed.vector_len()
    }

    /// Re-encodes element storage into a strictly heavier mode.
    ///
    /// Existing elements are converted eagerly; holes stay holes.
    pub fn promote_indexed(&mut self, target: IndexingMode) {
        debug_assert!(self.indexed.mode().can_transition_to(target));
        let old = std::mem::replace(&mut self.indexed, IndexedStorage::Undecided { capacity: 0 });
        self.indexed = match (old, target) {
            (IndexedStorage::Undecided { capacity }, IndexingMode::Int32) => {
                IndexedStorage::Int32(Vec::with_capacity(capacity))
            }
            (IndexedStorage::Undecided { capacity }, IndexingMode::Double) => {
                IndexedStorage::Double(Vec::with_capacity(capacity))
            }
            (IndexedStorage::Undecided { capacity }, IndexingMode::Contiguous) => {
                IndexedStorage::Contiguous(Vec::with_capacity(capacity))
            }
            (IndexedStorage::Undecided { capacity }, IndexingMode::ArrayStorage) => {
                IndexedStorage::ArrayStorage(ArrayStorage {
                    vector: Vec::with_capacity(capacity),
                    sparse: FxHashMap::default(),
                })
            }
            (IndexedStorage::Int32(v), IndexingMode::Double) => {
                IndexedStorage::Double(v.into_iter().map(|e| e.map(f64::from)).collect())
            }
            (IndexedStorage::Int32(v), IndexingMode::Contiguous) => {
                IndexedStorage::Contiguous(v.into_iter().map(|e| e.map(Value::Int32)).collect())
            }
            (IndexedStorage::Int32(v), IndexingMode::ArrayStorage) => {
                IndexedStorage::ArrayStorage(ArrayStorage {
                    vector: v.into_iter().map(|e| e.map(Value::Int32)).collect(),
                    sparse: FxHashMap::default(),
                })
            }
            (IndexedStorage::Double(v), IndexingMode::Contiguous) => {
                IndexedStorage::Contiguous(v.into_iter().map(|e| e.map(Value::number)).collect())
            }
            (IndexedStorage::Double(v), IndexingMode::ArrayStorage) => {
                IndexedStorage::ArrayStorage(ArrayStorage {
                    vector: v.into_iter().map(|e| e.map(Value::number)).collect(),
                    sparse: FxHashMap::default(),
                })
            }
            (IndexedStorage::Contiguous(v), IndexingMode::ArrayStorage) => {
                IndexedStorage::ArrayStorage(ArrayStorage {
                    vector: v,
                    sparse: FxHashMap::default(),
                })
            }
            (old, _) => {
                debug_assert!(false, "non-monotonic indexed promotion");
                old
            }
        };
    }

    /// Grows the active vector to hold at least `capacity` element slots,
    /// filling with holes.
    pub fn ensure_indexed_capacity(&mut self, capacity: usize) {
        match &mut self.indexed {
            IndexedStorage::Undecided { capacity: hint } => {
                *hint = (*hint).max(capacity);
            }
            IndexedStorage::Int32(v) => grow_vector(v, capacity),
            IndexedStorage::Double(v) => grow_vector(v, capacity),
            IndexedStorage::Contiguous(v) => grow_vector(v, capacity),
            IndexedStorage::ArrayStorage(s) => grow_vector(&mut s.vector, capacity),
        }
    }

    /// Reads the element at `index`, boxing unboxed encodings.
    ///
    /// Returns `None` for holes and out-of-bounds reads. Consults the sparse
    /// side table in `ArrayStorage` mode.
    pub fn get_index(&self, index: u32) -> Option<Value> {
        let i = index as usize;
        match &self.indexed {
            IndexedStorage::Undecided { .. } => None,
            IndexedStorage::Int32(v) => v.get(i).copied().flatten().map(Value::Int32),
            IndexedStorage::Double(v) => v.get(i).copied().flatten().map(Value::number),
            IndexedStorage::Contiguous(v) => v.get(i).cloned().flatten(),
            IndexedStorage::ArrayStorage(s) => {
                if let Some(entry) = s.sparse.get(&index) {
                    return Some(entry.value.clone());
                }
                s.vector.get(i).cloned().flatten()
            }
        }
    }

    /// Whether `index` holds an element (holes are absent).
    pub fn has_index(&self, index: u32) -> bool {
        let i = index as usize;
        match &self.indexed {
            IndexedStorage::Undecided { .. } => false,
            IndexedStorage::Int32(v) => matches!(v.get(i), Some(Some(_))),
            IndexedStorage::Double(v) => matches!(v.get(i), Some(Some(_))),
            IndexedStorage::Contiguous(v) => matches!(v.get(i), Some(Some(_))),
            IndexedStorage::ArrayStorage(s) => {
                s.sparse.contains_key(&index) || matches!(s.vector.get(i), Some(Some(_)))
            }
        }
    }

    /// Attribute bits of the element at `index`, if present.
    ///
    /// Dense elements always carry the default data attributes.
    pub fn index_attributes(&self, index: u32) -> Option<PropertyAttributes> {
        if let IndexedStorage::ArrayStorage(s) = &self.indexed {
            if let Some(entry) = s.sparse.get(&index) {
                return Some(entry.attributes);
            }
        }
        if self.has_index(index) {
            Some(PropertyAttributes::default())
        } else {
            None
        }
    }

    /// Writes a vector element in the active encoding.
    ///
    /// The value must fit the encoding; the caller promotes first. In
    /// `ArrayStorage` mode a sparse entry at the same index takes priority
    /// and is updated instead of the vector.
    pub fn set_index(&mut self, index: u32, value: Value) {
        debug_assert!(index < SPARSE_INDEX_THRESHOLD);
        let i = index as usize;
        match &mut self.indexed {
            IndexedStorage::Undecided { .. } => {
                debug_assert!(false, "write into undecided element storage");
            }
            IndexedStorage::Int32(v) => {
                let raw = match value {
                    Value::Int32(n) => n,
                    _ => {
                        debug_assert!(false, "non-int32 write into int32 storage");
                        return;
                    }
                };
                grow_vector(v, i + 1);
                v[i] = Some(raw);
            }
            IndexedStorage::Double(v) => {
                let raw = match value {
                    Value::Int32(n) => f64::from(n),
                    Value::Double(d) => d,
                    _ => {
                        debug_assert!(false, "non-numeric write into double storage");
                        return;
                    }
                };
                grow_vector(v, i + 1);
                v[i] = Some(raw);
            }
            IndexedStorage::Contiguous(v) => {
                grow_vector(v, i + 1);
                v[i] = Some(value);
            }
            IndexedStorage::ArrayStorage(s) => {
                if let Some(entry) = s.sparse.get_mut(&index) {
                    entry.value = value;
                    return;
                }
                grow_vector(&mut s.vector, i + 1);
                s.vector[i] = Some(value);
            }
        }
        if index >= self.public_length {
            self.public_length = index + 1;
        }
    }

    /// Removes the element at `index`, leaving a hole.
    ///
    /// Only meaningful in `ArrayStorage` mode; the caller transitions there
    /// before deleting. Returns whether an element was present.
    pub fn delete_index(&mut self, index: u32) -> bool {
        let i = index as usize;
        match &mut self.indexed {
            IndexedStorage::ArrayStorage(s) => {
                if s.sparse.remove(&index).is_some() {
                    return true;
                }
                match s.vector.get_mut(i) {
                    Some(slot @ Some(_)) => {
                        *slot = None;
                        true
                    }
                    _ => false,
                }
            }
            _ => {
                debug_assert!(false, "delete_index outside array storage");
                false
            }
        }
    }

    /// Installs a non-default-attribute element in the sparse side table,
    /// removing any dense slot at the same index.
    pub fn define_sparse(&mut self, index: u32, value: Value, attributes: PropertyAttributes) {
        debug_assert!(index < SPARSE_INDEX_THRESHOLD);
        if let IndexedStorage::ArrayStorage(s) = &mut self.indexed {
            if let Some(slot) = s.vector.get_mut(index as usize) {
                *slot = None;
            }
            s.sparse.insert(index, SparseEntry { value, attributes });
            if index >= self.public_length {
                self.public_length = index + 1;
            }
        } else {
            debug_assert!(false, "define_sparse outside array storage");
        }
    }

    /// Sparse side-table entry at `index`, if any.
    pub fn sparse_entry(&self, index: u32) -> Option<&SparseEntry> {
        match &self.indexed {
            IndexedStorage::ArrayStorage(s) => s.sparse.get(&index),
            _ => None,
        }
    }

    /// Present element indices in ascending order.
    pub fn present_indices(&self) -> Vec<u32> {
        let mut out: Vec<u32> = match &self.indexed {
            IndexedStorage::Undecided { .. } => Vec::new(),
            IndexedStorage::Int32(v) => collect_present(v),
            IndexedStorage::Double(v) => collect_present(v),
            IndexedStorage::Contiguous(v) => collect_present(v),
            IndexedStorage::ArrayStorage(s) => {
                let mut dense = collect_present(&s.vector);
                dense.extend(s.sparse.keys().copied());
                dense
            }
        };
        out.sort_unstable();
        out.dedup();
        out
    }

    // ---- array length ----

    /// The JS-visible array length.
    pub fn public_length(&self) -> u32 {
        self.public_length
    }

    /// Sets the JS-visible length without touching elements.
    ///
    /// Truncation of elements above the new length is the caller's job.
    pub fn set_public_length(&mut self, length: u32) {
        self.public_length = length;
    }

    /// Drops vector elements and sparse entries at or above `length`.
    ///
    /// Returns the length actually achieved. Equal to `length` when every
    /// element above could be removed; otherwise one past the highest
    /// non-configurable sparse entry, with everything below it kept, per the
    /// array `length`-truncation contract.
    pub fn truncate_elements(&mut self, length: u32) -> u32 {
        match &mut self.indexed {
            IndexedStorage::Undecided { .. } => length,
            IndexedStorage::Int32(v) => {
                v.truncate(length as usize);
                length
            }
            IndexedStorage::Double(v) => {
                v.truncate(length as usize);
                length
            }
            IndexedStorage::Contiguous(v) => {
                v.truncate(length as usize);
                length
            }
            IndexedStorage::ArrayStorage(s) => {
                let mut blocked: Option<u32> = None;
                for (&index, entry) in s.sparse.iter() {
                    if index >= length && !entry.attributes.is_configurable() {
                        blocked = Some(blocked.map_or(index, |b| b.max(index)));
                    }
                }
                let cut = match blocked {
                    Some(highest) => highest + 1,
                    None => length,
                };
                s.vector.truncate(cut as usize);
                s.sparse.retain(|&index, _| index < cut);
                cut
            }
        }
    }

    // ---- element search ----

    /// `indexOf`-style search: strict equality, holes skipped.
    ///
    /// Never finds `NaN`; finds `0` when asked for `-0`.
    pub fn index_of(&self, needle: &Value) -> Option<u32> {
        for index in 0..self.public_length {
            if let Some(value) = self.get_index(index) {
                if value.strict_equals(needle) {
                    return Some(index);
                }
            }
        }
        None
    }

    /// `includes`-style search: SameValueZero, holes read as `undefined`.
    pub fn includes(&self, needle: &Value) -> bool {
        for index in 0..self.public_length {
            let value = self.get_index(index).unwrap_or(Value::Undefined);
            if value.same_value_zero(needle) {
                return true;
            }
        }
        false
    }

    /// Values currently stored, for tracing.
    pub fn trace_values(&self, mut visit: impl FnMut(&Value)) {
        for value in &self.named {
            visit(value);
        }
        match &self.indexed {
            IndexedStorage::Undecided { .. }
            | IndexedStorage::Int32(_)
            | IndexedStorage::Double(_) => {}
            IndexedStorage::Contiguous(v) => {
                for value in v.iter().flatten() {
                    visit(value);
                }
            }
            IndexedStorage::ArrayStorage(s) => {
                for value in s.vector.iter().flatten() {
                    visit(value);
                }
                for entry in s.sparse.values() {
                    visit(&entry.value);
                }
            }
        }
    }
}

impl Default for Butterfly {
    fn default() -> Self {
        Butterfly::new()
    }
}

fn grow_vector<T: Clone>(v: &mut Vec<Option<T>>, required: usize) {
    if required > v.len() {
        let target = grown_capacity(v.len(), required);
        v.reserve(target - v.len());
        v.resize(required, None);
    }
}

fn collect_present<T>(v: &[Option<T>]) -> Vec<u32> {
    v.iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|_| i as u32))
        .collect()
}
