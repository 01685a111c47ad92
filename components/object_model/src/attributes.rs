//! Property attributes and property descriptors.
//!
//! Attributes are a compact bitset carried per property entry in a
//! [`Structure`](crate::structure::Structure); descriptors are the richer,
//! partially-specified form `define_own_property` consumes. A descriptor with
//! no fields set is "generic" and only adjusts attributes on an existing
//! property.

use crate::object::{NativeGetter, NativeSetter};
use core_types::Value;
use std::fmt;

bitflags::bitflags! {
    /// Attribute bits carried by every property entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyAttributes: u8 {
        /// Property value can be changed with a plain put.
        const WRITABLE = 1 << 0;
        /// Property appears during key enumeration.
        const ENUMERABLE = 1 << 1;
        /// Property can be deleted or have its attributes changed.
        const CONFIGURABLE = 1 << 2;
        /// Slot holds an accessor-pair cell instead of a plain value.
        const ACCESSOR = 1 << 3;
        /// Slot is backed by a host-provided native accessor.
        const CUSTOM = 1 << 4;
    }
}

impl Default for PropertyAttributes {
    /// Attributes of an ordinary assignment: writable, enumerable,
    /// configurable data property.
    #[inline]
    fn default() -> Self {
        Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE
    }
}

impl PropertyAttributes {
    /// Attributes of a non-writable, non-configurable data property.
    #[inline]
    pub const fn read_only() -> Self {
        Self::ENUMERABLE
    }

    /// Attributes of a non-enumerable engine-internal property.
    #[inline]
    pub const fn hidden() -> Self {
        Self::WRITABLE.union(Self::CONFIGURABLE)
    }

    /// Whether puts may replace the value.
    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(Self::WRITABLE)
    }

    /// Whether enumeration surfaces the key.
    #[inline]
    pub fn is_enumerable(self) -> bool {
        self.contains(Self::ENUMERABLE)
    }

    /// Whether the property may be deleted or reconfigured.
    #[inline]
    pub fn is_configurable(self) -> bool {
        self.contains(Self::CONFIGURABLE)
    }

    /// Whether the slot holds an accessor-pair cell.
    #[inline]
    pub fn is_accessor(self) -> bool {
        self.contains(Self::ACCESSOR)
    }

    /// Whether the slot is a host-provided native accessor.
    #[inline]
    pub fn is_custom(self) -> bool {
        self.contains(Self::CUSTOM)
    }
}

/// A partially-specified property descriptor.
///
/// Absent fields mean "leave unchanged" when applied to an existing property
/// and "use the default" when creating a new one, matching the JavaScript
/// `Object.defineProperty` contract. Getter and setter are host-native
/// callables; see [`crate::object::AccessorPair`].
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    /// `[[Value]]` for data properties.
    pub value: Option<Value>,
    /// `[[Get]]` for accessor properties.
    pub get: Option<NativeGetter>,
    /// `[[Set]]` for accessor properties.
    pub set: Option<NativeSetter>,
    /// `[[Writable]]`.
    pub writable: Option<bool>,
    /// `[[Enumerable]]`.
    pub enumerable: Option<bool>,
    /// `[[Configurable]]`.
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Fully-specified data descriptor with the given attributes.
    pub fn data(value: Value, attrs: PropertyAttributes) -> Self {
        PropertyDescriptor {
            value: Some(value),
            get: None,
            set: None,
            writable: Some(attrs.is_writable()),
            enumerable: Some(attrs.is_enumerable()),
            configurable: Some(attrs.is_configurable()),
        }
    }

    /// Fully-specified accessor descriptor with the given attributes.
    ///
    /// The writable bit has no meaning for accessors and is ignored.
    pub fn accessor(
        get: Option<NativeGetter>,
        set: Option<NativeSetter>,
        attrs: PropertyAttributes,
    ) -> Self {
        PropertyDescriptor {
            value: None,
            get,
            set,
            writable: None,
            enumerable: Some(attrs.is_enumerable()),
            configurable: Some(attrs.is_configurable()),
        }
    }

    /// Descriptor that only adjusts attribute bits.
    pub fn generic(enumerable: Option<bool>, configurable: Option<bool>) -> Self {
        PropertyDescriptor {
            value: None,
            get: None,
            set: None,
            writable: None,
            enumerable,
            configurable,
        }
    }

    /// True when a `value` or `writable` field is present.
    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// True when a `get` or `set` field is present.
    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// True when neither data nor accessor fields are present.
    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_data_descriptor() && !self.is_accessor_descriptor()
    }

    /// Attribute bits this descriptor produces when creating a new property.
    ///
    /// Absent boolean fields default to `false` per `defineProperty`; the
    /// `ACCESSOR` bit follows the descriptor kind.
    pub fn attributes_for_new_property(&self) -> PropertyAttributes {
        let mut attrs = PropertyAttributes::empty();
        if self.writable.unwrap_or(false) {
            attrs |= PropertyAttributes::WRITABLE;
        }
        if self.enumerable.unwrap_or(false) {
            attrs |= PropertyAttributes::ENUMERABLE;
        }
        if self.configurable.unwrap_or(false) {
            attrs |= PropertyAttributes::CONFIGURABLE;
        }
        if self.is_accessor_descriptor() {
            attrs |= PropertyAttributes::ACCESSOR;
            attrs.remove(PropertyAttributes::WRITABLE);
        }
        attrs
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("value", &self.value)
            .field("get", &self.get.as_ref().map(|_| "<native getter>"))
            .field("set", &self.set.as_ref().map(|_| "<native setter>"))
            .field("writable", &self.writable)
            .field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}
