//! Handle types for runtime-owned resources.
//!
//! Objects, interned property names and symbols live in tables owned by the
//! runtime. Values and property keys refer to them through these small copy
//! handles instead of pointers, which keeps the value representation compact
//! and the garbage collector free to move bookkeeping around.

/// Handle to a heap-allocated object.
///
/// The handle is an index into the runtime's object heap. It stays valid as
/// long as the object is reachable; the collector recycles slots of
/// unreachable objects for later allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(pub u32);

impl ObjectRef {
    /// Returns the handle as a heap slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned property name.
///
/// Two atoms are equal exactly when their underlying strings are equal,
/// which makes name comparison in structures and caches a single integer
/// compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Atom(pub u32);

/// Identity of a JavaScript symbol.
///
/// Symbols are identified by id, never by description; every symbol
/// creation produces a fresh id even when descriptions collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SymbolId(pub u32);
