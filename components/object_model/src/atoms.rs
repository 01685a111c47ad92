//! Interned property names and symbols.
//!
//! Property names are interned once per runtime so that structures, caches
//! and transition tables can compare keys as `u32` handles instead of string
//! contents. Both tables live for the life of the runtime; identifiers are
//! never collected.

use core_types::{Atom, SymbolId};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Runtime-wide intern table mapping string names to [`Atom`] handles.
#[derive(Debug, Default)]
pub struct AtomTable {
    names: Vec<Rc<str>>,
    index: FxHashMap<Rc<str>, Atom>,
}

impl AtomTable {
    /// Creates an empty table.
    pub fn new() -> AtomTable {
        AtomTable::default()
    }

    /// Interns `name`, returning the existing handle if it was seen before.
    pub fn intern(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.index.get(name) {
            return atom;
        }
        let atom = Atom(self.names.len() as u32);
        let shared: Rc<str> = Rc::from(name);
        self.names.push(shared.clone());
        self.index.insert(shared, atom);
        atom
    }

    /// Returns the name behind an interned handle.
    pub fn get(&self, atom: Atom) -> &str {
        debug_assert!((atom.0 as usize) < self.names.len());
        &self.names[atom.0 as usize]
    }

    /// Looks up a name without interning it.
    pub fn lookup(&self, name: &str) -> Option<Atom> {
        self.index.get(name).copied()
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names have been interned yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Allocator for unique symbol identities.
///
/// Two symbols are equal only if they came from the same `create` call;
/// descriptions are for diagnostics and never affect identity.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    descriptions: Vec<Option<Rc<str>>>,
}

impl SymbolRegistry {
    /// Creates an empty registry.
    pub fn new() -> SymbolRegistry {
        SymbolRegistry::default()
    }

    /// Mints a fresh symbol.
    pub fn create(&mut self, description: Option<&str>) -> SymbolId {
        let id = SymbolId(self.descriptions.len() as u32);
        self.descriptions.push(description.map(Rc::from));
        id
    }

    /// Returns the description the symbol was created with, if any.
    pub fn description(&self, id: SymbolId) -> Option<&str> {
        self.descriptions
            .get(id.0 as usize)
            .and_then(|d| d.as_deref())
    }

    /// Number of symbols minted so far.
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Whether no symbols have been minted yet.
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}
