//! Heap objects: the cell type, its capability kinds, and host callables.
//!
//! Dispatch is by capability, not inheritance: `ObjectKind` tags each cell
//! as ordinary, array, proxy-like, host-custom, or an internal accessor-pair
//! cell, and the operations in [`crate::ops`] match on the tag. Getter,
//! setter and trap callables are host-native `Rc` closures; cloning the
//! `Rc` out of a cell before calling is what gives every in-flight call an
//! immutable snapshot of its handler.
//!
//! Native closures must not own un-rooted heap references. They receive the
//! runtime and can reach any object they need through rooted handles.

use crate::attributes::PropertyDescriptor;
use crate::butterfly::Butterfly;
use crate::runtime::Runtime;
use crate::structure::StructureId;
use core_types::{JsResult, PropertyKey, Value};
use memory_manager::{Trace, Visitor};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Host-native getter: `(runtime, receiver) -> value`.
pub type NativeGetter = Rc<dyn Fn(&mut Runtime, Value) -> JsResult<Value>>;

/// Host-native setter: `(runtime, receiver, value)`.
pub type NativeSetter = Rc<dyn Fn(&mut Runtime, Value, Value) -> JsResult<()>>;

/// A getter/setter pair stored in an accessor cell.
///
/// Either side may be absent: a get through a setter-only property yields
/// `undefined`, a put through a getter-only property fails.
#[derive(Clone, Default)]
pub struct AccessorPair {
    /// The getter, if any.
    pub getter: Option<NativeGetter>,
    /// The setter, if any.
    pub setter: Option<NativeSetter>,
}

impl AccessorPair {
    /// Pair with both sides.
    pub fn new(getter: Option<NativeGetter>, setter: Option<NativeSetter>) -> AccessorPair {
        AccessorPair { getter, setter }
    }
}

impl fmt::Debug for AccessorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorPair")
            .field("getter", &self.getter.as_ref().map(|_| "<native>"))
            .field("setter", &self.setter.as_ref().map(|_| "<native>"))
            .finish()
    }
}

/// get(target, key, receiver)
pub type GetTrap = Rc<dyn Fn(&mut Runtime, Value, PropertyKey, Value) -> JsResult<Value>>;
/// set(target, key, value, receiver)
pub type SetTrap = Rc<dyn Fn(&mut Runtime, Value, PropertyKey, Value, Value) -> JsResult<bool>>;
/// has(target, key)
pub type HasTrap = Rc<dyn Fn(&mut Runtime, Value, PropertyKey) -> JsResult<bool>>;
/// deleteProperty(target, key)
pub type DeletePropertyTrap = Rc<dyn Fn(&mut Runtime, Value, PropertyKey) -> JsResult<bool>>;
/// ownKeys(target)
pub type OwnKeysTrap = Rc<dyn Fn(&mut Runtime, Value) -> JsResult<Vec<PropertyKey>>>;
/// getOwnPropertyDescriptor(target, key)
pub type GetOwnPropertyDescriptorTrap =
    Rc<dyn Fn(&mut Runtime, Value, PropertyKey) -> JsResult<Option<PropertyDescriptor>>>;
/// defineProperty(target, key, descriptor)
pub type DefinePropertyTrap =
    Rc<dyn Fn(&mut Runtime, Value, PropertyKey, PropertyDescriptor) -> JsResult<bool>>;

/// The proxy capability set.
///
/// One optional trap per intercepted operation; an absent trap falls through
/// to the target. Every property operation on a proxy-kind object routes
/// through this set, so host interception sees the same contracts as
/// ordinary objects.
#[derive(Default)]
pub struct ProxyHandler {
    /// get(target, key, receiver)
    pub get: Option<GetTrap>,
    /// set(target, key, value, receiver)
    pub set: Option<SetTrap>,
    /// has(target, key)
    pub has: Option<HasTrap>,
    /// deleteProperty(target, key)
    pub delete_property: Option<DeletePropertyTrap>,
    /// ownKeys(target)
    pub own_keys: Option<OwnKeysTrap>,
    /// getOwnPropertyDescriptor(target, key)
    pub get_own_property_descriptor: Option<GetOwnPropertyDescriptorTrap>,
    /// defineProperty(target, key, descriptor)
    pub define_property: Option<DefinePropertyTrap>,
}

impl fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("has", &self.has.is_some())
            .field("delete_property", &self.delete_property.is_some())
            .field("own_keys", &self.own_keys.is_some())
            .field(
                "get_own_property_descriptor",
                &self.get_own_property_descriptor.is_some(),
            )
            .field("define_property", &self.define_property.is_some())
            .finish()
    }
}

/// Payload of a proxy-kind object.
#[derive(Debug, Clone)]
pub struct ProxyData {
    /// The wrapped object, `Value::Object`.
    pub target: Value,
    /// The trap set.
    pub handler: Rc<ProxyHandler>,
}

/// One host-provided native accessor in a custom table.
#[derive(Clone)]
pub struct CustomAccessor {
    /// The native getter, if any.
    pub getter: Option<NativeGetter>,
    /// The native setter, if any.
    pub setter: Option<NativeSetter>,
    /// Reported attribute bits; `CUSTOM` is always set.
    pub attributes: crate::attributes::PropertyAttributes,
}

impl fmt::Debug for CustomAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAccessor")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Host accessor table attached to a host-custom object.
///
/// The table is fixed at object construction and consulted before ordinary
/// slots; immutability is what makes custom entries safe to cache.
#[derive(Debug, Default)]
pub struct CustomAccessorTable {
    entries: FxHashMap<PropertyKey, CustomAccessor>,
    order: Vec<PropertyKey>,
}

impl CustomAccessorTable {
    /// Empty table.
    pub fn new() -> CustomAccessorTable {
        CustomAccessorTable::default()
    }

    /// Adds an accessor under `key`. Replaces any earlier entry.
    ///
    /// Entries are marked `CUSTOM` and never configurable: the table is
    /// fixed once the object is constructed, so a delete on one of its keys
    /// always reports `false`.
    pub fn insert(
        &mut self,
        key: PropertyKey,
        getter: Option<NativeGetter>,
        setter: Option<NativeSetter>,
        attributes: crate::attributes::PropertyAttributes,
    ) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        self.order.push(key);
        let mut attributes = attributes | crate::attributes::PropertyAttributes::CUSTOM;
        attributes.remove(crate::attributes::PropertyAttributes::CONFIGURABLE);
        self.entries.insert(
            key,
            CustomAccessor {
                getter,
                setter,
                attributes,
            },
        );
    }

    /// Looks up the accessor for `key`.
    pub fn get(&self, key: PropertyKey) -> Option<&CustomAccessor> {
        self.entries.get(&key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[PropertyKey] {
        &self.order
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Capability tag of a heap cell.
#[derive(Debug)]
pub enum ObjectKind {
    /// Plain object.
    Ordinary,
    /// Array: `length` is virtual over the butterfly's public length.
    Array {
        /// Cleared when `length` is made non-writable (freeze).
        length_writable: bool,
    },
    /// Host-intercepted object routing operations through a trap set.
    Proxy(ProxyData),
    /// Object with a host accessor table consulted before ordinary slots.
    HostCustom(Rc<CustomAccessorTable>),
    /// Internal accessor-pair cell referenced by accessor property slots.
    /// Never surfaced as a JS value by the operations.
    Accessor(AccessorPair),
}

/// A heap cell: structure id, storage, and capability tag.
#[derive(Debug)]
pub struct JsObject {
    pub(crate) structure: StructureId,
    pub(crate) butterfly: Butterfly,
    pub(crate) kind: ObjectKind,
}

impl JsObject {
    /// Plain object with empty storage.
    pub fn ordinary(structure: StructureId) -> JsObject {
        JsObject {
            structure,
            butterfly: Butterfly::new(),
            kind: ObjectKind::Ordinary,
        }
    }

    /// Array with writable length and empty storage.
    pub fn array(structure: StructureId) -> JsObject {
        JsObject {
            structure,
            butterfly: Butterfly::new(),
            kind: ObjectKind::Array {
                length_writable: true,
            },
        }
    }

    /// Proxy wrapping `data.target`.
    pub fn proxy(structure: StructureId, data: ProxyData) -> JsObject {
        JsObject {
            structure,
            butterfly: Butterfly::new(),
            kind: ObjectKind::Proxy(data),
        }
    }

    /// Host-custom object with an immutable accessor table.
    pub fn host_custom(structure: StructureId, table: Rc<CustomAccessorTable>) -> JsObject {
        JsObject {
            structure,
            butterfly: Butterfly::new(),
            kind: ObjectKind::HostCustom(table),
        }
    }

    /// Internal accessor cell.
    pub fn accessor_cell(structure: StructureId, pair: AccessorPair) -> JsObject {
        JsObject {
            structure,
            butterfly: Butterfly::new(),
            kind: ObjectKind::Accessor(pair),
        }
    }

    /// Current structure id.
    pub fn structure(&self) -> StructureId {
        self.structure
    }

    /// Capability tag.
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Storage block.
    pub fn butterfly(&self) -> &Butterfly {
        &self.butterfly
    }

    /// Whether this cell is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array { .. })
    }

    /// Whether this cell is a proxy.
    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, ObjectKind::Proxy(_))
    }
}

impl Trace for JsObject {
    fn trace(&self, visitor: &mut Visitor<'_>) {
        self.butterfly.trace_values(|value| visitor.visit_value(value));
        if let ObjectKind::Proxy(proxy) = &self.kind {
            visitor.visit_value(&proxy.target);
        }
    }
}
