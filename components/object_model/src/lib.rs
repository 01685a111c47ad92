//! Object Model - Structures, butterflies and property operations
//!
//! This component implements the hidden-class object model:
//! - `Structure`: shared property layouts with interned transitions and
//!   dictionary fallback
//! - `Butterfly`: out-of-line named slots plus the indexed-storage ladder
//! - `Runtime`: the owning instance tying heap, structures and intern
//!   tables together
//! - Property operations with full descriptor, accessor, proxy and array
//!   semantics, plus the resolution contract the cache layer builds on
//! - Watchpoints and the shape epoch for cache invalidation
//! - `SharedArrayBuffer` and atomic typed views

pub mod atoms;
pub mod attributes;
pub mod butterfly;
pub mod object;
pub mod ops;
pub mod runtime;
pub mod shared_memory;
pub mod structure;
pub mod watchpoint;

// Re-export main types
pub use atoms::{AtomTable, SymbolRegistry};
pub use attributes::{PropertyAttributes, PropertyDescriptor};
pub use butterfly::{
    ArrayStorage, Butterfly, IndexedStorage, SparseEntry, SPARSE_INDEX_THRESHOLD,
};
pub use object::{
    AccessorPair, CustomAccessor, CustomAccessorTable, DefinePropertyTrap, DeletePropertyTrap,
    GetOwnPropertyDescriptorTrap, GetTrap, HasTrap, JsObject, NativeGetter, NativeSetter,
    ObjectKind, OwnKeysTrap, ProxyData, ProxyHandler, SetTrap,
};
pub use ops::{PropertySlot, SlotKind};
pub use runtime::{Runtime, RuntimeConfig, MEGAMORPHIC_CACHE_CAPACITY};
pub use shared_memory::{ElementKind, SharedArrayBuffer, SharedTypedView};
pub use structure::{
    IndexingMode, PropertyAdd, PropertyEntry, Structure, StructureId, StructureStats,
    StructureTable, TRANSITION_CHAIN_CAP,
};
pub use watchpoint::{WatchpointRef, WatchpointSet, WatchpointState};
