//! Property operations: get, put, delete, define, enumeration, prototypes.
//!
//! All operations are methods on [`Runtime`] and dispatch on the receiver's
//! [`ObjectKind`]: proxy-kind objects route through their trap set before
//! anything else, host-custom objects consult their accessor table before
//! ordinary slots, and arrays add the virtual `length` property. Accessor
//! and trap callables always run against a snapshot cloned out of the cell
//! first, so a handler that deletes or redefines itself completes cleanly.
//!
//! Failure follows the strict/sloppy convention: operations take a `throw`
//! flag and report `Ok(false)` or a `TypeError` through the same path. A
//! thrown handler error propagates immediately; structures and butterflies
//! are never left half-mutated.

use crate::attributes::{PropertyAttributes, PropertyDescriptor};
use crate::object::{AccessorPair, NativeGetter, NativeSetter, ObjectKind};
use crate::runtime::Runtime;
use crate::structure::{IndexingMode, StructureId};
use core_types::{JsError, JsResult, ObjectRef, PropertyKey, Value};
use std::rc::Rc;

/// Where a property lookup landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Plain value in a named slot.
    Data {
        /// Out-of-line offset on the holder.
        offset: u32,
    },
    /// Accessor cell in a named slot.
    Accessor {
        /// Out-of-line offset on the holder.
        offset: u32,
    },
    /// Element in the holder's indexed storage.
    Element {
        /// Element index.
        index: u32,
    },
    /// Host-provided native accessor on the holder.
    Custom,
    /// The virtual array `length` property.
    ArrayLength,
    /// Resolution hit a proxy; the access must go through its traps.
    Proxy,
    /// Not found anywhere on the chain.
    Absent,
}

/// Outcome of resolving a key against an object and its prototype chain.
///
/// This is the contract shared with the cache layer: the consulted list
/// names every structure the resolution depended on, receiver first, so a
/// cache can guard each one. `cacheable` is false when a dictionary or
/// proxy was involved.
#[derive(Debug, Clone)]
pub struct PropertySlot {
    /// Object the property lives on; `None` for absent.
    pub holder: Option<ObjectRef>,
    /// What was found.
    pub kind: SlotKind,
    /// Attribute bits of the found property; empty for absent and proxy.
    pub attributes: PropertyAttributes,
    /// Structures consulted during resolution, receiver first.
    pub consulted: Vec<StructureId>,
    /// Whether a cache entry may be built from this resolution.
    pub cacheable: bool,
}

/// Own-property probe result, before any prototype walking.
enum OwnProperty {
    Data {
        offset: u32,
        attributes: PropertyAttributes,
    },
    Accessor {
        offset: u32,
        attributes: PropertyAttributes,
    },
    Element {
        index: u32,
        attributes: PropertyAttributes,
    },
    ElementAccessor {
        index: u32,
        attributes: PropertyAttributes,
    },
    Custom {
        getter: Option<NativeGetter>,
        setter: Option<NativeSetter>,
        attributes: PropertyAttributes,
    },
    ArrayLength {
        writable: bool,
    },
    None,
}

fn fail(throw: bool, message: &str) -> JsResult<bool> {
    if throw {
        Err(JsError::type_error(message))
    } else {
        Ok(false)
    }
}

fn length_value(length: u32) -> Value {
    Value::number(f64::from(length))
}

fn array_length_u32(value: &Value) -> JsResult<u32> {
    let n = match value {
        Value::Int32(i) => f64::from(*i),
        Value::Double(d) => *d,
        _ => return Err(JsError::range_error("invalid array length")),
    };
    if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
        return Err(JsError::range_error("invalid array length"));
    }
    Ok(n as u32)
}

fn required_element_mode(value: &Value) -> IndexingMode {
    match value {
        Value::Int32(_) => IndexingMode::Int32,
        Value::Double(_) => IndexingMode::Double,
        _ => IndexingMode::Contiguous,
    }
}

fn same_native<T: ?Sized>(current: &Option<Rc<T>>, incoming: &Rc<T>) -> bool {
    current
        .as_ref()
        .map_or(false, |held| Rc::ptr_eq(held, incoming))
}

/// Attribute bits after applying a descriptor to an existing property.
fn merged_attributes(current: PropertyAttributes, desc: &PropertyDescriptor) -> PropertyAttributes {
    let mut attrs = current;
    if let Some(enumerable) = desc.enumerable {
        attrs.set(PropertyAttributes::ENUMERABLE, enumerable);
    }
    if let Some(configurable) = desc.configurable {
        attrs.set(PropertyAttributes::CONFIGURABLE, configurable);
    }
    if desc.is_accessor_descriptor() {
        attrs.insert(PropertyAttributes::ACCESSOR);
        attrs.remove(PropertyAttributes::WRITABLE);
        attrs.remove(PropertyAttributes::CUSTOM);
    } else if desc.is_data_descriptor() {
        // Converting an accessor to data resets writability to false unless
        // the descriptor says otherwise.
        let converting = current.is_accessor();
        attrs.remove(PropertyAttributes::ACCESSOR);
        let writable = desc
            .writable
            .unwrap_or(!converting && current.is_writable());
        attrs.set(PropertyAttributes::WRITABLE, writable);
    }
    attrs
}

impl Runtime {
    // ---- resolution ----

    /// Probes the object's own properties, without prototype walking and
    /// without routing proxies.
    fn own_property(&self, obj: ObjectRef, key: PropertyKey) -> JsResult<OwnProperty> {
        let cell = self.object(obj)?;

        if let ObjectKind::HostCustom(table) = &cell.kind {
            if let Some(accessor) = table.get(key) {
                return Ok(OwnProperty::Custom {
                    getter: accessor.getter.clone(),
                    setter: accessor.setter.clone(),
                    attributes: accessor.attributes,
                });
            }
        }

        if key == PropertyKey::Name(self.length_atom) {
            if let ObjectKind::Array { length_writable } = cell.kind {
                return Ok(OwnProperty::ArrayLength {
                    writable: length_writable,
                });
            }
        }

        if let PropertyKey::Index(index) = key {
            if index < self.config().sparse_index_threshold {
                if let Some(attributes) = cell.butterfly.index_attributes(index) {
                    if attributes.is_accessor() {
                        return Ok(OwnProperty::ElementAccessor { index, attributes });
                    }
                    return Ok(OwnProperty::Element { index, attributes });
                }
                // Small indices never live in the named table.
                return Ok(OwnProperty::None);
            }
        }

        let structure = self.structures.get(cell.structure);
        if let Some(entry) = structure.get(key) {
            if entry.attributes.is_accessor() {
                return Ok(OwnProperty::Accessor {
                    offset: entry.offset,
                    attributes: entry.attributes,
                });
            }
            return Ok(OwnProperty::Data {
                offset: entry.offset,
                attributes: entry.attributes,
            });
        }
        Ok(OwnProperty::None)
    }

    /// Resolves `key` against `obj` and its prototype chain.
    ///
    /// This is the slow path the cache layer populates from.
    pub fn resolve_property(&self, obj: ObjectRef, key: PropertyKey) -> JsResult<PropertySlot> {
        let mut consulted = Vec::new();
        let mut cacheable = true;
        let mut current = obj;
        loop {
            let cell = self.object(current)?;
            consulted.push(cell.structure);
            let structure = self.structures.get(cell.structure);
            if structure.is_dictionary() {
                cacheable = false;
            }
            if cell.is_proxy() {
                return Ok(PropertySlot {
                    holder: Some(current),
                    kind: SlotKind::Proxy,
                    attributes: PropertyAttributes::empty(),
                    consulted,
                    cacheable: false,
                });
            }
            let found = match self.own_property(current, key)? {
                OwnProperty::Data { offset, attributes } => {
                    Some((SlotKind::Data { offset }, attributes))
                }
                OwnProperty::Accessor { offset, attributes } => {
                    Some((SlotKind::Accessor { offset }, attributes))
                }
                OwnProperty::Element { index, attributes }
                | OwnProperty::ElementAccessor { index, attributes } => {
                    Some((SlotKind::Element { index }, attributes))
                }
                OwnProperty::Custom { attributes, .. } => Some((SlotKind::Custom, attributes)),
                OwnProperty::ArrayLength { writable } => {
                    let mut attributes = PropertyAttributes::empty();
                    attributes.set(PropertyAttributes::WRITABLE, writable);
                    Some((SlotKind::ArrayLength, attributes))
                }
                OwnProperty::None => None,
            };
            if let Some((kind, attributes)) = found {
                return Ok(PropertySlot {
                    holder: Some(current),
                    kind,
                    attributes,
                    consulted,
                    cacheable,
                });
            }
            match structure.prototype() {
                Value::Object(proto) => current = *proto,
                _ => {
                    return Ok(PropertySlot {
                        holder: None,
                        kind: SlotKind::Absent,
                        attributes: PropertyAttributes::empty(),
                        consulted,
                        cacheable,
                    })
                }
            }
        }
    }

    // ---- get ----

    /// Reads `obj[key]`; absent properties yield `undefined`.
    pub fn get(&mut self, obj: ObjectRef, key: PropertyKey) -> JsResult<Value> {
        self.get_with_receiver(obj, key, Value::Object(obj))
    }

    /// Reads `obj[key]` with getters bound to `receiver`.
    ///
    /// The receiver stays the original start of the lookup while the walk
    /// moves up the chain, so a prototype getter sees the object the access
    /// was performed on.
    pub fn get_with_receiver(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        receiver: Value,
    ) -> JsResult<Value> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.get.clone() {
                return trap(self, data.target.clone(), key, receiver);
            }
            let target = self.expect_object(&data.target)?;
            return self.get_with_receiver(target, key, receiver);
        }
        match self.own_property(obj, key)? {
            OwnProperty::Data { offset, .. } => {
                Ok(self.object(obj)?.butterfly.read_offset(offset).clone())
            }
            OwnProperty::Accessor { offset, .. } => {
                let cell_value = self.object(obj)?.butterfly.read_offset(offset).clone();
                self.call_getter(&cell_value, receiver)
            }
            OwnProperty::Element { index, .. } => Ok(self
                .object(obj)?
                .butterfly
                .get_index(index)
                .unwrap_or(Value::Undefined)),
            OwnProperty::ElementAccessor { index, .. } => {
                let cell_value = self
                    .object(obj)?
                    .butterfly
                    .get_index(index)
                    .unwrap_or(Value::Undefined);
                self.call_getter(&cell_value, receiver)
            }
            OwnProperty::Custom { getter, .. } => match getter {
                Some(get) => get(self, receiver),
                None => Ok(Value::Undefined),
            },
            OwnProperty::ArrayLength { .. } => {
                Ok(length_value(self.object(obj)?.butterfly.public_length()))
            }
            OwnProperty::None => {
                let proto = self
                    .structures
                    .get(self.object(obj)?.structure)
                    .prototype()
                    .clone();
                match proto {
                    Value::Object(parent) => self.get_with_receiver(parent, key, receiver),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    // ---- put ----

    /// Writes `obj[key] = value`.
    ///
    /// Returns whether the write succeeded; with `throw` set, failures are
    /// `TypeError`s instead of `Ok(false)`.
    pub fn put(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        value: Value,
        throw: bool,
    ) -> JsResult<bool> {
        self.put_with_receiver(obj, key, value, Value::Object(obj), throw)
    }

    /// Writes `obj[key] = value` with setters bound to `receiver`.
    ///
    /// An ancestor's non-writable data property blocks shadowing; an
    /// ancestor's accessor is invoked rather than shadowed. New properties
    /// are created on the receiver.
    pub fn put_with_receiver(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        value: Value,
        receiver: Value,
        throw: bool,
    ) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.set.clone() {
                return trap(self, data.target.clone(), key, value, receiver);
            }
            let target = self.expect_object(&data.target)?;
            return self.put_with_receiver(target, key, value, receiver, throw);
        }
        match self.own_property(obj, key)? {
            OwnProperty::Data { offset, attributes } => {
                if !attributes.is_writable() {
                    return fail(throw, "cannot assign to read-only property");
                }
                if receiver == Value::Object(obj) {
                    self.write_named_slot(obj, key, offset, value)?;
                    Ok(true)
                } else {
                    self.put_on_receiver(receiver, key, value, throw)
                }
            }
            OwnProperty::Accessor { offset, .. } => {
                let cell_value = self.object(obj)?.butterfly.read_offset(offset).clone();
                self.call_setter(&cell_value, receiver, value, throw)
            }
            OwnProperty::Element { index, attributes } => {
                if !attributes.is_writable() {
                    return fail(throw, "cannot assign to read-only element");
                }
                if receiver == Value::Object(obj) {
                    self.write_element(obj, index, value)?;
                    Ok(true)
                } else {
                    self.put_on_receiver(receiver, key, value, throw)
                }
            }
            OwnProperty::ElementAccessor { index, .. } => {
                let cell_value = self
                    .object(obj)?
                    .butterfly
                    .get_index(index)
                    .unwrap_or(Value::Undefined);
                self.call_setter(&cell_value, receiver, value, throw)
            }
            OwnProperty::Custom { setter, .. } => match setter {
                Some(set) => {
                    set(self, receiver, value)?;
                    Ok(true)
                }
                None => fail(throw, "property has no native setter"),
            },
            OwnProperty::ArrayLength { writable } => {
                if !writable {
                    return fail(throw, "cannot assign to read-only array length");
                }
                if receiver == Value::Object(obj) {
                    self.set_array_length(obj, &value, throw)
                } else {
                    self.put_on_receiver(receiver, key, value, throw)
                }
            }
            OwnProperty::None => {
                let proto = self
                    .structures
                    .get(self.object(obj)?.structure)
                    .prototype()
                    .clone();
                match proto {
                    Value::Object(parent) => {
                        self.put_with_receiver(parent, key, value, receiver, throw)
                    }
                    _ => self.put_on_receiver(receiver, key, value, throw),
                }
            }
        }
    }

    /// Applies a put that fell through the chain to the receiver itself.
    fn put_on_receiver(
        &mut self,
        receiver: Value,
        key: PropertyKey,
        value: Value,
        throw: bool,
    ) -> JsResult<bool> {
        let robj = match receiver {
            Value::Object(robj) => robj,
            _ => return fail(throw, "cannot create property on a primitive"),
        };
        if self.object(robj)?.is_proxy() {
            // Creation on a proxy receiver goes through its define capability.
            let desc = PropertyDescriptor::data(value, PropertyAttributes::default());
            return self.define_own_property(robj, key, desc, throw);
        }
        match self.own_property(robj, key)? {
            OwnProperty::Data { offset, attributes } => {
                if !attributes.is_writable() {
                    return fail(throw, "cannot assign to read-only property");
                }
                self.write_named_slot(robj, key, offset, value)?;
                Ok(true)
            }
            OwnProperty::Element { index, attributes } => {
                if !attributes.is_writable() {
                    return fail(throw, "cannot assign to read-only element");
                }
                self.write_element(robj, index, value)?;
                Ok(true)
            }
            OwnProperty::Accessor { .. }
            | OwnProperty::ElementAccessor { .. }
            | OwnProperty::Custom { .. } => {
                fail(throw, "cannot overwrite accessor through the chain")
            }
            OwnProperty::ArrayLength { writable } => {
                if !writable {
                    return fail(throw, "cannot assign to read-only array length");
                }
                self.set_array_length(robj, &value, throw)
            }
            OwnProperty::None => {
                if let PropertyKey::Index(index) = key {
                    if index < self.config().sparse_index_threshold {
                        return self.append_element(robj, index, value, throw);
                    }
                }
                self.add_named_property(robj, key, PropertyAttributes::default(), value, throw)
            }
        }
    }

    // ---- delete ----

    /// Deletes `obj[key]`.
    ///
    /// Deleting an absent property succeeds; a non-configurable one reports
    /// `false`. Removing a named property demotes a shared structure to a
    /// private dictionary first, so siblings keep their layout.
    pub fn delete_property(&mut self, obj: ObjectRef, key: PropertyKey) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.delete_property.clone() {
                return trap(self, data.target.clone(), key);
            }
            let target = self.expect_object(&data.target)?;
            return self.delete_property(target, key);
        }
        match self.own_property(obj, key)? {
            OwnProperty::None => Ok(true),
            // The custom table is fixed at construction.
            OwnProperty::Custom { .. } => Ok(false),
            OwnProperty::ArrayLength { .. } => Ok(false),
            OwnProperty::Element { index, attributes }
            | OwnProperty::ElementAccessor { index, attributes } => {
                if !attributes.is_configurable() {
                    return Ok(false);
                }
                self.ensure_element_mode(obj, IndexingMode::ArrayStorage)?;
                Ok(self.object_mut(obj)?.butterfly.delete_index(index))
            }
            OwnProperty::Data { attributes, .. } | OwnProperty::Accessor { attributes, .. } => {
                if !attributes.is_configurable() {
                    return Ok(false);
                }
                self.remove_named_property(obj, key)?;
                Ok(true)
            }
        }
    }

    // ---- define ----

    /// `Object.defineProperty` semantics with compatibility validation.
    pub fn define_own_property(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
        throw: bool,
    ) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.define_property.clone() {
                return trap(self, data.target.clone(), key, desc);
            }
            let target = self.expect_object(&data.target)?;
            return self.define_own_property(target, key, desc, throw);
        }
        if key == PropertyKey::Name(self.length_atom) && self.object(obj)?.is_array() {
            return self.define_array_length(obj, desc, throw);
        }
        if let PropertyKey::Index(index) = key {
            if index < self.config().sparse_index_threshold {
                return self.define_element(obj, index, desc, throw);
            }
        }
        self.define_named(obj, key, desc, throw)
    }

    fn define_named(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
        throw: bool,
    ) -> JsResult<bool> {
        let structure_id = self.object(obj)?.structure;
        let current = self.structures.get(structure_id).get(key).copied();
        let entry = match current {
            None => {
                if let ObjectKind::HostCustom(table) = &self.object(obj)?.kind {
                    if table.get(key).is_some() {
                        return fail(throw, "cannot redefine native accessor");
                    }
                }
                if !self.structures.get(structure_id).is_extensible() {
                    return fail(throw, "cannot add property, object is not extensible");
                }
                let attrs = desc.attributes_for_new_property();
                let value = if desc.is_accessor_descriptor() {
                    let pair = AccessorPair::new(desc.get.clone(), desc.set.clone());
                    Value::Object(self.new_accessor_cell(pair)?)
                } else {
                    desc.value.clone().unwrap_or(Value::Undefined)
                };
                return self.add_named_property(obj, key, attrs, value, throw);
            }
            Some(entry) => entry,
        };

        let current_value = self.object(obj)?.butterfly.read_offset(entry.offset).clone();
        if let Some(message) = self.redefine_conflict(entry.attributes, &current_value, &desc)? {
            return fail(throw, message);
        }

        let new_attrs = merged_attributes(entry.attributes, &desc);
        let new_value = if desc.is_accessor_descriptor() {
            let current_pair = if entry.attributes.is_accessor() {
                self.accessor_pair(&current_value)?
            } else {
                AccessorPair::default()
            };
            let pair = AccessorPair::new(
                desc.get.clone().or(current_pair.getter),
                desc.set.clone().or(current_pair.setter),
            );
            Value::Object(self.new_accessor_cell(pair)?)
        } else if desc.is_data_descriptor() {
            let converting = entry.attributes.is_accessor();
            desc.value.clone().unwrap_or(if converting {
                Value::Undefined
            } else {
                current_value
            })
        } else {
            current_value
        };
        self.replace_named_slot(obj, key, entry.offset, new_attrs, new_value)?;
        Ok(true)
    }

    fn define_element(
        &mut self,
        obj: ObjectRef,
        index: u32,
        desc: PropertyDescriptor,
        throw: bool,
    ) -> JsResult<bool> {
        let current_attrs = self.object(obj)?.butterfly.index_attributes(index);
        let current_attrs = match current_attrs {
            None => {
                if !self.structures.get(self.object(obj)?.structure).is_extensible() {
                    return fail(throw, "cannot add property, object is not extensible");
                }
                let attrs = desc.attributes_for_new_property();
                let value = if desc.is_accessor_descriptor() {
                    let pair = AccessorPair::new(desc.get.clone(), desc.set.clone());
                    Value::Object(self.new_accessor_cell(pair)?)
                } else {
                    desc.value.clone().unwrap_or(Value::Undefined)
                };
                if attrs == PropertyAttributes::default() {
                    self.ensure_element_mode(obj, required_element_mode(&value))?;
                    self.object_mut(obj)?.butterfly.set_index(index, value.clone());
                } else {
                    self.ensure_element_mode(obj, IndexingMode::ArrayStorage)?;
                    self.object_mut(obj)?
                        .butterfly
                        .define_sparse(index, value.clone(), attrs);
                }
                if let Value::Object(child) = value {
                    self.heap.write_barrier(obj, child);
                }
                return Ok(true);
            }
            Some(attrs) => attrs,
        };

        let current_value = self
            .object(obj)?
            .butterfly
            .get_index(index)
            .unwrap_or(Value::Undefined);
        if let Some(message) = self.redefine_conflict(current_attrs, &current_value, &desc)? {
            return fail(throw, message);
        }

        let new_attrs = merged_attributes(current_attrs, &desc);
        let new_value = if desc.is_accessor_descriptor() {
            let current_pair = if current_attrs.is_accessor() {
                self.accessor_pair(&current_value)?
            } else {
                AccessorPair::default()
            };
            let pair = AccessorPair::new(
                desc.get.clone().or(current_pair.getter),
                desc.set.clone().or(current_pair.setter),
            );
            Value::Object(self.new_accessor_cell(pair)?)
        } else if desc.is_data_descriptor() {
            let converting = current_attrs.is_accessor();
            desc.value.clone().unwrap_or(if converting {
                Value::Undefined
            } else {
                current_value
            })
        } else {
            current_value
        };

        let was_sparse = self.object(obj)?.butterfly.sparse_entry(index).is_some();
        if !was_sparse && new_attrs == PropertyAttributes::default() {
            self.ensure_element_mode(obj, required_element_mode(&new_value))?;
            self.object_mut(obj)?
                .butterfly
                .set_index(index, new_value.clone());
        } else {
            self.ensure_element_mode(obj, IndexingMode::ArrayStorage)?;
            self.object_mut(obj)?
                .butterfly
                .define_sparse(index, new_value.clone(), new_attrs);
        }
        if let Value::Object(child) = new_value {
            self.heap.write_barrier(obj, child);
        }
        Ok(true)
    }

    fn define_array_length(
        &mut self,
        obj: ObjectRef,
        desc: PropertyDescriptor,
        throw: bool,
    ) -> JsResult<bool> {
        if desc.is_accessor_descriptor() {
            return fail(throw, "cannot redefine array length as an accessor");
        }
        if desc.enumerable == Some(true) || desc.configurable == Some(true) {
            return fail(throw, "cannot change array length attributes");
        }
        let writable_now = matches!(
            self.object(obj)?.kind,
            ObjectKind::Array {
                length_writable: true
            }
        );
        if desc.writable == Some(true) && !writable_now {
            return fail(throw, "cannot make array length writable again");
        }
        if let Some(value) = &desc.value {
            let new_len = array_length_u32(value)?;
            if !writable_now {
                if new_len != self.object(obj)?.butterfly.public_length() {
                    return fail(throw, "cannot assign to read-only array length");
                }
            } else if !self.set_array_length(obj, value, throw)? {
                return Ok(false);
            }
        }
        if desc.writable == Some(false) {
            if let ObjectKind::Array { length_writable } = &mut self.object_mut(obj)?.kind {
                *length_writable = false;
            }
        }
        Ok(true)
    }

    /// Checks a redefinition against a non-configurable current property.
    ///
    /// Returns the rejection message, or `None` when the change is allowed.
    fn redefine_conflict(
        &self,
        current_attrs: PropertyAttributes,
        current_value: &Value,
        desc: &PropertyDescriptor,
    ) -> JsResult<Option<&'static str>> {
        if current_attrs.is_configurable() {
            return Ok(None);
        }
        if desc.configurable == Some(true) {
            return Ok(Some("cannot redefine non-configurable property"));
        }
        if let Some(enumerable) = desc.enumerable {
            if enumerable != current_attrs.is_enumerable() {
                return Ok(Some(
                    "cannot change enumerability of non-configurable property",
                ));
            }
        }
        if desc.is_generic_descriptor() {
            return Ok(None);
        }
        if desc.is_accessor_descriptor() != current_attrs.is_accessor() {
            return Ok(Some("cannot change kind of non-configurable property"));
        }
        if current_attrs.is_accessor() {
            let pair = self.accessor_pair(current_value)?;
            if let Some(get) = &desc.get {
                if !same_native(&pair.getter, get) {
                    return Ok(Some("cannot replace getter of non-configurable property"));
                }
            }
            if let Some(set) = &desc.set {
                if !same_native(&pair.setter, set) {
                    return Ok(Some("cannot replace setter of non-configurable property"));
                }
            }
            return Ok(None);
        }
        if !current_attrs.is_writable() {
            if desc.writable == Some(true) {
                return Ok(Some("cannot make read-only property writable"));
            }
            if let Some(value) = &desc.value {
                if !value.same_value(current_value) {
                    return Ok(Some("cannot change value of read-only property"));
                }
            }
        }
        Ok(None)
    }

    // ---- extensibility ----

    /// Forbids adding properties to the object.
    pub fn prevent_extensions(&mut self, obj: ObjectRef) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            let target = self.expect_object(&data.target)?;
            return self.prevent_extensions(target);
        }
        let structure_id = self.object(obj)?.structure;
        if !self.structures.get(structure_id).is_extensible() {
            return Ok(true);
        }
        if self.structures.get(structure_id).is_dictionary() {
            self.note_dictionary_mutation(structure_id);
            self.structures.prevent_extensions_transition(structure_id);
        } else {
            let next = self.structures.prevent_extensions_transition(structure_id);
            self.transition_object(obj, next);
        }
        Ok(true)
    }

    /// Whether new properties may be added.
    pub fn is_extensible(&self, obj: ObjectRef) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let target = self.expect_object(&data.target.clone())?;
            return self.is_extensible(target);
        }
        Ok(self
            .structures
            .get(self.object(obj)?.structure)
            .is_extensible())
    }

    /// `Object.seal`: non-extensible plus every property non-configurable.
    pub fn seal(&mut self, obj: ObjectRef) -> JsResult<bool> {
        self.lock_object(obj, false)
    }

    /// `Object.freeze`: seal plus every data property non-writable.
    pub fn freeze(&mut self, obj: ObjectRef) -> JsResult<bool> {
        self.lock_object(obj, true)
    }

    fn lock_object(&mut self, obj: ObjectRef, freeze: bool) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            let target = self.expect_object(&data.target)?;
            return self.lock_object(target, freeze);
        }
        self.prevent_extensions(obj)?;

        let entries = self
            .structures
            .get(self.object(obj)?.structure)
            .entries()
            .to_vec();
        for entry in entries {
            let mut attrs = entry.attributes;
            attrs.remove(PropertyAttributes::CONFIGURABLE);
            if freeze && !attrs.is_accessor() {
                attrs.remove(PropertyAttributes::WRITABLE);
            }
            if attrs != entry.attributes {
                self.reconfigure_named(obj, entry.key, attrs)?;
            }
        }

        let indices = self.object(obj)?.butterfly.present_indices();
        if !indices.is_empty() {
            self.ensure_element_mode(obj, IndexingMode::ArrayStorage)?;
            for index in indices {
                let current = self
                    .object(obj)?
                    .butterfly
                    .index_attributes(index)
                    .unwrap_or_default();
                let mut attrs = current;
                attrs.remove(PropertyAttributes::CONFIGURABLE);
                if freeze && !attrs.is_accessor() {
                    attrs.remove(PropertyAttributes::WRITABLE);
                }
                if attrs != current {
                    let value = self
                        .object(obj)?
                        .butterfly
                        .get_index(index)
                        .unwrap_or(Value::Undefined);
                    self.object_mut(obj)?.butterfly.define_sparse(index, value, attrs);
                }
            }
        }

        if freeze {
            if let ObjectKind::Array { length_writable } = &mut self.object_mut(obj)?.kind {
                *length_writable = false;
            }
        }
        Ok(true)
    }

    /// Whether the object is sealed.
    pub fn is_sealed(&self, obj: ObjectRef) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let target = self.expect_object(&data.target.clone())?;
            return self.is_sealed(target);
        }
        if self.is_extensible(obj)? {
            return Ok(false);
        }
        let cell = self.object(obj)?;
        let structure = self.structures.get(cell.structure);
        let named_locked = structure
            .entries()
            .iter()
            .all(|entry| !entry.attributes.is_configurable());
        let elements_locked = cell.butterfly.present_indices().iter().all(|&index| {
            cell.butterfly
                .index_attributes(index)
                .map_or(true, |attrs| !attrs.is_configurable())
        });
        Ok(named_locked && elements_locked)
    }

    /// Whether the object is frozen.
    pub fn is_frozen(&self, obj: ObjectRef) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let target = self.expect_object(&data.target.clone())?;
            return self.is_frozen(target);
        }
        if !self.is_sealed(obj)? {
            return Ok(false);
        }
        let cell = self.object(obj)?;
        let structure = self.structures.get(cell.structure);
        let named_frozen = structure
            .entries()
            .iter()
            .all(|entry| entry.attributes.is_accessor() || !entry.attributes.is_writable());
        let elements_frozen = cell.butterfly.present_indices().iter().all(|&index| {
            cell.butterfly
                .index_attributes(index)
                .map_or(true, |attrs| attrs.is_accessor() || !attrs.is_writable())
        });
        let length_frozen = match cell.kind {
            ObjectKind::Array { length_writable } => !length_writable,
            _ => true,
        };
        Ok(named_frozen && elements_frozen && length_frozen)
    }

    // ---- queries ----

    /// Whether `key` exists on the object or its prototype chain.
    pub fn has_property(&mut self, obj: ObjectRef, key: PropertyKey) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.has.clone() {
                return trap(self, data.target.clone(), key);
            }
            let target = self.expect_object(&data.target)?;
            return self.has_property(target, key);
        }
        if !matches!(self.own_property(obj, key)?, OwnProperty::None) {
            return Ok(true);
        }
        let proto = self
            .structures
            .get(self.object(obj)?.structure)
            .prototype()
            .clone();
        match proto {
            Value::Object(parent) => self.has_property(parent, key),
            _ => Ok(false),
        }
    }

    /// Whether `key` is an own property of the object.
    pub fn has_own_property(&mut self, obj: ObjectRef, key: PropertyKey) -> JsResult<bool> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.get_own_property_descriptor.clone() {
                return Ok(trap(self, data.target.clone(), key)?.is_some());
            }
            let target = self.expect_object(&data.target)?;
            return self.has_own_property(target, key);
        }
        Ok(!matches!(self.own_property(obj, key)?, OwnProperty::None))
    }

    /// Reflects an own property as a descriptor.
    pub fn get_own_property_descriptor(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
    ) -> JsResult<Option<PropertyDescriptor>> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.get_own_property_descriptor.clone() {
                return trap(self, data.target.clone(), key);
            }
            let target = self.expect_object(&data.target)?;
            return self.get_own_property_descriptor(target, key);
        }
        match self.own_property(obj, key)? {
            OwnProperty::None => Ok(None),
            OwnProperty::Data { offset, attributes } => {
                let value = self.object(obj)?.butterfly.read_offset(offset).clone();
                Ok(Some(PropertyDescriptor::data(value, attributes)))
            }
            OwnProperty::Accessor { offset, attributes } => {
                let cell_value = self.object(obj)?.butterfly.read_offset(offset).clone();
                let pair = self.accessor_pair(&cell_value)?;
                Ok(Some(PropertyDescriptor::accessor(
                    pair.getter,
                    pair.setter,
                    attributes,
                )))
            }
            OwnProperty::Element { index, attributes } => {
                let value = self
                    .object(obj)?
                    .butterfly
                    .get_index(index)
                    .unwrap_or(Value::Undefined);
                Ok(Some(PropertyDescriptor::data(value, attributes)))
            }
            OwnProperty::ElementAccessor { index, attributes } => {
                let cell_value = self
                    .object(obj)?
                    .butterfly
                    .get_index(index)
                    .unwrap_or(Value::Undefined);
                let pair = self.accessor_pair(&cell_value)?;
                Ok(Some(PropertyDescriptor::accessor(
                    pair.getter,
                    pair.setter,
                    attributes,
                )))
            }
            OwnProperty::Custom {
                getter,
                setter,
                attributes,
            } => Ok(Some(PropertyDescriptor::accessor(getter, setter, attributes))),
            OwnProperty::ArrayLength { writable } => Ok(Some(PropertyDescriptor {
                value: Some(length_value(self.object(obj)?.butterfly.public_length())),
                get: None,
                set: None,
                writable: Some(writable),
                enumerable: Some(false),
                configurable: Some(false),
            })),
        }
    }

    /// Own keys in `OrdinaryOwnPropertyKeys` order: ascending indices, then
    /// strings in insertion order, then symbols in insertion order. Arrays
    /// surface `length` first among the strings.
    pub fn own_keys(&mut self, obj: ObjectRef) -> JsResult<Vec<PropertyKey>> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            if let Some(trap) = data.handler.own_keys.clone() {
                return trap(self, data.target.clone());
            }
            let target = self.expect_object(&data.target)?;
            return self.own_keys(target);
        }
        let length_key = PropertyKey::Name(self.length_atom);
        let cell = self.object(obj)?;
        let structure = self.structures.get(cell.structure);

        let mut indices = cell.butterfly.present_indices();
        for entry in structure.entries() {
            if let PropertyKey::Index(index) = entry.key {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        if cell.is_array() {
            keys.push(length_key);
        }
        for entry in structure.entries() {
            if matches!(entry.key, PropertyKey::Name(_)) {
                keys.push(entry.key);
            }
        }
        if let ObjectKind::HostCustom(table) = &cell.kind {
            for key in table.keys() {
                if matches!(key, PropertyKey::Name(_)) {
                    keys.push(*key);
                }
            }
        }
        for entry in structure.entries() {
            if matches!(entry.key, PropertyKey::Symbol(_)) {
                keys.push(entry.key);
            }
        }
        if let ObjectKind::HostCustom(table) = &cell.kind {
            for key in table.keys() {
                if matches!(key, PropertyKey::Symbol(_)) {
                    keys.push(*key);
                }
            }
        }
        Ok(keys)
    }

    // ---- prototypes ----

    /// The object's prototype value.
    pub fn get_prototype(&self, obj: ObjectRef) -> JsResult<Value> {
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let target = self.expect_object(&data.target.clone())?;
            return self.get_prototype(target);
        }
        Ok(self
            .structures
            .get(self.object(obj)?.structure)
            .prototype()
            .clone())
    }

    /// Replaces the object's prototype.
    ///
    /// Rejects cycles and changes on non-extensible objects.
    pub fn set_prototype(
        &mut self,
        obj: ObjectRef,
        prototype: Value,
        throw: bool,
    ) -> JsResult<bool> {
        debug_assert!(matches!(prototype, Value::Object(_) | Value::Null));
        if let ObjectKind::Proxy(data) = &self.object(obj)?.kind {
            let data = data.clone();
            let target = self.expect_object(&data.target)?;
            return self.set_prototype(target, prototype, throw);
        }
        if self.get_prototype(obj)? == prototype {
            return Ok(true);
        }
        let mut walk = prototype.clone();
        while let Value::Object(ancestor) = walk {
            if ancestor == obj {
                return fail(throw, "cyclic prototype chain");
            }
            if self.object(ancestor)?.is_proxy() {
                break;
            }
            walk = self
                .structures
                .get(self.object(ancestor)?.structure)
                .prototype()
                .clone();
        }
        let structure_id = self.object(obj)?.structure;
        if !self.structures.get(structure_id).is_extensible() {
            return fail(throw, "cannot change prototype of non-extensible object");
        }
        if let Value::Object(proto) = prototype {
            // The structure-table edge must stay live mid-cycle.
            self.heap.shade(proto);
        }
        if self.structures.get(structure_id).is_dictionary() {
            self.note_dictionary_mutation(structure_id);
            self.structures.prototype_transition(structure_id, prototype);
        } else {
            let next = self.structures.prototype_transition(structure_id, prototype);
            self.transition_object(obj, next);
        }
        Ok(true)
    }

    // ---- arrays ----

    /// The array's JS-visible length.
    pub fn array_length(&self, obj: ObjectRef) -> JsResult<u32> {
        Ok(self.object(obj)?.butterfly.public_length())
    }

    /// `Array.prototype.indexOf` semantics: strict equality, holes skipped.
    ///
    /// Finds `0` when asked for `-0`; never finds `NaN`. Accessor elements
    /// are read through their getters.
    pub fn array_index_of(&mut self, obj: ObjectRef, needle: &Value) -> JsResult<Option<u32>> {
        let length = self.object(obj)?.butterfly.public_length();
        for index in 0..length {
            if !self.object(obj)?.butterfly.has_index(index) {
                continue;
            }
            let value = self.get(obj, PropertyKey::Index(index))?;
            if value.strict_equals(needle) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// `Array.prototype.includes` semantics: SameValueZero, holes read as
    /// `undefined`, so `NaN` is found.
    pub fn array_includes(&mut self, obj: ObjectRef, needle: &Value) -> JsResult<bool> {
        let length = self.object(obj)?.butterfly.public_length();
        for index in 0..length {
            let value = if self.object(obj)?.butterfly.has_index(index) {
                self.get(obj, PropertyKey::Index(index))?
            } else {
                Value::Undefined
            };
            if value.same_value_zero(needle) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rebuilds a dictionary object's layout densely.
    ///
    /// No-op for objects on shared structures.
    pub fn flatten_properties(&mut self, obj: ObjectRef) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        if self.structures.get(structure_id).is_dictionary() {
            self.flatten_object(obj, structure_id)?;
        }
        Ok(())
    }

    // ---- cache support ----
    //
    // Fast paths for the inline-cache layer. Offsets and structure ids come
    // from an earlier resolution; callers revalidate the receiver's structure
    // before using them.

    /// Reads the named slot at `offset` on `holder`.
    pub fn read_slot(&self, holder: ObjectRef, offset: u32) -> JsResult<Value> {
        Ok(self.object(holder)?.butterfly.read_offset(offset).clone())
    }

    /// Snapshot of the accessor pair stored in the named slot at `offset`.
    ///
    /// The snapshot stays callable even if the slot is deleted or replaced
    /// while a call through it is running.
    pub fn slot_accessor(&self, holder: ObjectRef, offset: u32) -> JsResult<AccessorPair> {
        let cell_value = self.object(holder)?.butterfly.read_offset(offset).clone();
        self.accessor_pair(&cell_value)
    }

    /// Overwrites an existing own data slot.
    ///
    /// Fires any replacement watchpoint for `(structure, key)` before the
    /// write, the same ordering the uncached put path uses.
    pub fn write_slot(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        offset: u32,
        value: Value,
    ) -> JsResult<()> {
        self.write_named_slot(obj, key, offset, value)
    }

    /// Replays a previously-resolved add transition.
    ///
    /// The value lands in the butterfly before the new structure is
    /// published, so no observer sees the new shape with an unwritten slot.
    pub fn apply_transition(
        &mut self,
        obj: ObjectRef,
        new_structure: StructureId,
        offset: u32,
        value: Value,
    ) -> JsResult<()> {
        let new_size = self.structures.get(new_structure).out_of_line_size();
        {
            let cell = self.object_mut(obj)?;
            cell.butterfly.grow_out_of_line(new_size);
            cell.butterfly.write_offset(offset, value.clone());
        }
        if let Value::Object(child) = value {
            self.heap.write_barrier(obj, child);
        }
        self.transition_object(obj, new_structure);
        Ok(())
    }

    // ---- internals ----

    fn expect_object(&self, value: &Value) -> JsResult<ObjectRef> {
        match value {
            Value::Object(obj) => Ok(*obj),
            _ => Err(JsError::internal_error("expected an object value")),
        }
    }

    fn accessor_pair(&self, cell_value: &Value) -> JsResult<AccessorPair> {
        let cell = self.expect_object(cell_value)?;
        match &self.object(cell)?.kind {
            ObjectKind::Accessor(pair) => Ok(pair.clone()),
            _ => Err(JsError::internal_error(
                "accessor slot does not hold an accessor cell",
            )),
        }
    }

    fn call_getter(&mut self, cell_value: &Value, receiver: Value) -> JsResult<Value> {
        // Snapshot before the call; the getter may mutate the slot.
        let pair = self.accessor_pair(cell_value)?;
        match pair.getter {
            Some(getter) => getter(self, receiver),
            None => Ok(Value::Undefined),
        }
    }

    fn call_setter(
        &mut self,
        cell_value: &Value,
        receiver: Value,
        value: Value,
        throw: bool,
    ) -> JsResult<bool> {
        let pair = self.accessor_pair(cell_value)?;
        match pair.setter {
            Some(setter) => {
                setter(self, receiver, value)?;
                Ok(true)
            }
            None => fail(throw, "property has only a getter"),
        }
    }

    fn write_named_slot(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        offset: u32,
        value: Value,
    ) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        // Replacement fires before the new value is observable.
        self.fire_replacement_watchpoint(structure_id, key);
        self.object_mut(obj)?.butterfly.write_offset(offset, value.clone());
        if let Value::Object(child) = value {
            self.heap.write_barrier(obj, child);
        }
        Ok(())
    }

    fn write_element(&mut self, obj: ObjectRef, index: u32, value: Value) -> JsResult<()> {
        let has_sparse = self.object(obj)?.butterfly.sparse_entry(index).is_some();
        if !has_sparse {
            self.ensure_element_mode(obj, required_element_mode(&value))?;
        }
        self.object_mut(obj)?.butterfly.set_index(index, value.clone());
        if let Value::Object(child) = value {
            self.heap.write_barrier(obj, child);
        }
        Ok(())
    }

    fn append_element(
        &mut self,
        obj: ObjectRef,
        index: u32,
        value: Value,
        throw: bool,
    ) -> JsResult<bool> {
        if !self.structures.get(self.object(obj)?.structure).is_extensible() {
            return fail(throw, "cannot add property, object is not extensible");
        }
        self.write_element(obj, index, value)?;
        Ok(true)
    }

    fn add_named_property(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        attrs: PropertyAttributes,
        value: Value,
        throw: bool,
    ) -> JsResult<bool> {
        let structure_id = self.object(obj)?.structure;
        if !self.structures.get(structure_id).is_extensible() {
            return fail(throw, "cannot add property, object is not extensible");
        }
        if self.structures.get(structure_id).is_dictionary() {
            // Fire before the in-place layout change is observable.
            self.note_dictionary_mutation(structure_id);
        }
        let add = self.structures.add_property_transition(structure_id, key, attrs);
        let new_size = self.structures.get(add.structure).out_of_line_size();
        {
            let cell = self.object_mut(obj)?;
            cell.butterfly.grow_out_of_line(new_size);
            cell.butterfly.write_offset(add.offset, value.clone());
        }
        if let Value::Object(child) = value {
            self.heap.write_barrier(obj, child);
        }
        if add.structure != structure_id {
            self.transition_object(obj, add.structure);
        }
        Ok(true)
    }

    fn reconfigure_named(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        if self.structures.get(structure_id).is_dictionary() {
            self.note_dictionary_mutation(structure_id);
            self.structures.reconfigure_transition(structure_id, key, attrs);
        } else {
            let next = self.structures.reconfigure_transition(structure_id, key, attrs);
            self.transition_object(obj, next);
        }
        Ok(())
    }

    fn replace_named_slot(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        offset: u32,
        new_attrs: PropertyAttributes,
        value: Value,
    ) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        let current_attrs = self
            .structures
            .get(structure_id)
            .get(key)
            .map(|entry| entry.attributes)
            .ok_or_else(|| JsError::internal_error("redefined property lost its entry"))?;
        if new_attrs != current_attrs {
            self.reconfigure_named(obj, key, new_attrs)?;
        }
        self.fire_replacement_watchpoint(structure_id, key);
        self.object_mut(obj)?.butterfly.write_offset(offset, value.clone());
        if let Value::Object(child) = value {
            self.heap.write_barrier(obj, child);
        }
        Ok(())
    }

    fn remove_named_property(&mut self, obj: ObjectRef, key: PropertyKey) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        let dict = if self.structures.get(structure_id).is_dictionary() {
            structure_id
        } else {
            let dict = self.structures.to_dictionary(structure_id);
            self.transition_object(obj, dict);
            dict
        };
        self.note_dictionary_mutation(dict);
        if let Some((offset, _)) = self.structures.dictionary_remove(dict, key) {
            // Clear the slot so the collector drops the value.
            self.object_mut(obj)?.butterfly.write_offset(offset, Value::Undefined);
        }
        if self.structures.get(dict).should_flatten() {
            self.flatten_object(obj, dict)?;
        }
        Ok(())
    }

    fn flatten_object(&mut self, obj: ObjectRef, dict: StructureId) -> JsResult<()> {
        self.note_dictionary_mutation(dict);
        let moves = self.structures.flatten(dict);
        let new_size = self.structures.get(dict).out_of_line_size();
        self.object_mut(obj)?
            .butterfly
            .compact_out_of_line(&moves, new_size);
        Ok(())
    }

    fn ensure_element_mode(&mut self, obj: ObjectRef, required: IndexingMode) -> JsResult<()> {
        let structure_id = self.object(obj)?.structure;
        let current = self.structures.get(structure_id).indexing_mode();
        if !current.can_transition_to(required) {
            return Ok(());
        }
        if self.structures.get(structure_id).is_dictionary() {
            self.note_dictionary_mutation(structure_id);
            self.object_mut(obj)?.butterfly.promote_indexed(required);
            self.structures.indexing_transition(structure_id, required);
        } else {
            let next = self.structures.indexing_transition(structure_id, required);
            self.object_mut(obj)?.butterfly.promote_indexed(required);
            self.transition_object(obj, next);
        }
        Ok(())
    }

    fn set_array_length(&mut self, obj: ObjectRef, value: &Value, throw: bool) -> JsResult<bool> {
        let new_len = array_length_u32(value)?;
        let current = self.object(obj)?.butterfly.public_length();
        if new_len >= current {
            self.object_mut(obj)?.butterfly.set_public_length(new_len);
            return Ok(true);
        }
        let achieved = self.object_mut(obj)?.butterfly.truncate_elements(new_len);
        self.object_mut(obj)?.butterfly.set_public_length(achieved);
        if achieved != new_len {
            return fail(throw, "cannot delete non-configurable element while truncating");
        }
        Ok(true)
    }
}
