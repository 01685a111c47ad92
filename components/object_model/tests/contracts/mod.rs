//! Contract compliance tests for object_model
//!
//! These tests verify the public API surface other components rely on:
//! property resolution for inline caches, watchpoint guards, the epoch
//! discipline of the megamorphic table, and the shared-memory types.

use object_model::{
    CustomAccessorTable, ElementKind, NativeGetter, PropertyAttributes, PropertyDescriptor,
    ProxyHandler, Runtime, RuntimeConfig, SharedArrayBuffer, SharedTypedView, SlotKind,
    WatchpointSet, WatchpointState, MEGAMORPHIC_CACHE_CAPACITY, SPARSE_INDEX_THRESHOLD,
    TRANSITION_CHAIN_CAP,
};

use core_types::{ErrorKind, PropertyKey, Value};
use std::rc::Rc;

// ============================================================================
// Runtime construction and configuration
// ============================================================================

#[test]
fn test_runtime_constructors() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    assert!(rt.object(obj).is_ok());

    let mut rt = Runtime::default();
    assert!(rt.new_array(Value::Null).is_ok());
}

#[test]
fn test_config_threshold_is_clamped() {
    let mut config = RuntimeConfig::default();
    config.sparse_index_threshold = 0;
    let rt = Runtime::with_config(config);
    assert_eq!(rt.config().sparse_index_threshold, SPARSE_INDEX_THRESHOLD);

    let mut config = RuntimeConfig::default();
    config.sparse_index_threshold = SPARSE_INDEX_THRESHOLD + 1;
    let rt = Runtime::with_config(config);
    assert_eq!(rt.config().sparse_index_threshold, SPARSE_INDEX_THRESHOLD);
}

#[test]
fn test_lowered_threshold_routes_indices_to_named_storage() {
    let mut config = RuntimeConfig::default();
    config.sparse_index_threshold = 16;
    let mut rt = Runtime::with_config(config);
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);

    rt.put(obj, PropertyKey::Index(15), Value::Int32(1), false)
        .unwrap();
    rt.put(obj, PropertyKey::Index(16), Value::Int32(2), false)
        .unwrap();

    let structure = rt.structures().get(rt.structure_of(obj).unwrap());
    assert!(!structure.contains(PropertyKey::Index(15)));
    assert!(structure.contains(PropertyKey::Index(16)));
    assert_eq!(rt.get(obj, PropertyKey::Index(16)).unwrap(), Value::Int32(2));
}

#[test]
fn test_exported_constants() {
    assert_eq!(SPARSE_INDEX_THRESHOLD, 100_000);
    assert_eq!(TRANSITION_CHAIN_CAP, 64);
    assert_eq!(MEGAMORPHIC_CACHE_CAPACITY, 1024);
}

// ============================================================================
// Structure identity
// ============================================================================

#[test]
fn test_structure_ids_survive_later_transitions() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let x = rt.key_from_str("x");
    let y = rt.key_from_str("y");

    rt.put(obj, x, Value::Int32(1), false).unwrap();
    let with_x = rt.structure_of(obj).unwrap();
    rt.put(obj, y, Value::Int32(2), false).unwrap();
    let with_xy = rt.structure_of(obj).unwrap();
    assert_ne!(with_x, with_xy);

    // The superseded id still resolves; a cache can keep comparing against it.
    let old = rt.structures().get(with_x);
    assert_eq!(old.property_count(), 1);
    assert!(old.contains(x));
    assert!(!old.contains(y));
}

#[test]
fn test_transition_replay_is_a_hit() {
    let mut rt = Runtime::new();
    let key_names = ["x", "y"];
    for _ in 0..2 {
        let obj = rt.new_object(Value::Null).unwrap();
        rt.add_root(obj);
        for name in key_names {
            let key = rt.key_from_str(name);
            rt.put(obj, key, Value::Int32(0), false).unwrap();
        }
    }
    let stats = rt.structure_stats();
    assert_eq!(stats.transitions_interned, 2);
    assert_eq!(stats.transition_hits, 2);
}

// ============================================================================
// Property resolution for caches
// ============================================================================

#[test]
fn test_resolution_classifies_slot_kinds() {
    let mut rt = Runtime::new();
    let proto = rt.new_object(Value::Null).unwrap();
    rt.add_root(proto);
    let obj = rt.new_object(Value::Object(proto)).unwrap();
    rt.add_root(obj);
    let own = rt.key_from_str("own");
    let inherited = rt.key_from_str("inherited");
    let missing = rt.key_from_str("missing");

    rt.put(obj, own, Value::Int32(1), false).unwrap();
    rt.put(proto, inherited, Value::Int32(2), false).unwrap();

    let slot = rt.resolve_property(obj, own).unwrap();
    assert_eq!(slot.holder, Some(obj));
    assert!(matches!(slot.kind, SlotKind::Data { offset: 0 }));
    assert!(slot.cacheable);
    assert_eq!(slot.consulted, vec![rt.structure_of(obj).unwrap()]);

    let slot = rt.resolve_property(obj, inherited).unwrap();
    assert_eq!(slot.holder, Some(proto));
    assert!(matches!(slot.kind, SlotKind::Data { .. }));
    assert_eq!(slot.consulted.len(), 2);
    assert_eq!(slot.consulted[0], rt.structure_of(obj).unwrap());

    // Absent resolutions still report the whole chain they walked, so a
    // negative cache knows every structure it must guard on.
    let slot = rt.resolve_property(obj, missing).unwrap();
    assert_eq!(slot.holder, None);
    assert_eq!(slot.kind, SlotKind::Absent);
    assert_eq!(slot.consulted.len(), 2);
    assert!(slot.cacheable);
}

#[test]
fn test_resolution_covers_every_storage_family() {
    let mut rt = Runtime::new();
    let arr = rt.new_array(Value::Null).unwrap();
    rt.add_root(arr);
    rt.put(arr, PropertyKey::Index(0), Value::Int32(1), false)
        .unwrap();

    let slot = rt.resolve_property(arr, PropertyKey::Index(0)).unwrap();
    assert!(matches!(slot.kind, SlotKind::Element { index: 0 }));

    let slot = rt.resolve_property(arr, rt.length_key()).unwrap();
    assert_eq!(slot.kind, SlotKind::ArrayLength);
    assert_eq!(slot.holder, Some(arr));

    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let key = rt.key_from_str("computed");
    let getter: NativeGetter = Rc::new(|_, _| Ok(Value::Int32(3)));
    let desc = PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::default());
    rt.define_own_property(obj, key, desc, true).unwrap();
    let slot = rt.resolve_property(obj, key).unwrap();
    assert!(matches!(slot.kind, SlotKind::Accessor { .. }));
    assert!(slot.attributes.is_accessor());

    let mut table = CustomAccessorTable::new();
    let native = rt.key_from_str("native");
    let getter: NativeGetter = Rc::new(|_, _| Ok(Value::Int32(4)));
    table.insert(native, Some(getter), None, PropertyAttributes::default());
    let host = rt.new_host_custom(Rc::new(table), Value::Null).unwrap();
    rt.add_root(host);
    let slot = rt.resolve_property(host, native).unwrap();
    assert_eq!(slot.kind, SlotKind::Custom);
    assert!(slot.attributes.is_custom());
}

#[test]
fn test_dictionaries_and_proxies_refuse_caching() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let a = rt.key_from_str("a");
    let b = rt.key_from_str("b");
    rt.put(obj, a, Value::Int32(1), false).unwrap();
    rt.put(obj, b, Value::Int32(2), false).unwrap();
    rt.delete_property(obj, a).unwrap();
    assert!(rt.structures().get(rt.structure_of(obj).unwrap()).is_dictionary());

    let slot = rt.resolve_property(obj, b).unwrap();
    assert!(!slot.cacheable);

    let target = rt.new_object(Value::Null).unwrap();
    rt.add_root(target);
    let proxy = rt
        .new_proxy(Value::Object(target), Rc::new(ProxyHandler::default()))
        .unwrap();
    rt.add_root(proxy);
    let slot = rt.resolve_property(proxy, b).unwrap();
    assert_eq!(slot.kind, SlotKind::Proxy);
    assert!(!slot.cacheable);

    // A proxy in the middle of a chain poisons resolutions through it.
    let child = rt.new_object(Value::Object(proxy)).unwrap();
    rt.add_root(child);
    let slot = rt.resolve_property(child, b).unwrap();
    assert_eq!(slot.kind, SlotKind::Proxy);
    assert!(!slot.cacheable);
}

// ============================================================================
// Watchpoints and the shape epoch
// ============================================================================

#[test]
fn test_watchpoint_state_machine() {
    let set = WatchpointSet::new();
    assert_eq!(set.state(), WatchpointState::Clear);
    assert!(set.is_still_valid());

    assert!(set.start_watching());
    assert_eq!(set.state(), WatchpointState::Watched);

    // Firing with watchers reports that fact and counts once.
    assert!(set.fire());
    assert_eq!(set.state(), WatchpointState::Invalidated);
    assert!(set.has_been_invalidated());
    assert_eq!(set.fire_count(), 1);

    // Invalidation is sticky.
    assert!(!set.start_watching());
    assert!(!set.fire());
    assert_eq!(set.fire_count(), 1);

    // Firing a clear set invalidates without claiming watchers.
    let unwatched = WatchpointSet::new();
    assert!(!unwatched.fire());
    assert!(unwatched.has_been_invalidated());

    assert_eq!(WatchpointSet::new_watched().state(), WatchpointState::Watched);
}

#[test]
fn test_transition_watchpoint_fires_before_the_shape_moves() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let x = rt.key_from_str("x");
    let y = rt.key_from_str("y");
    rt.put(obj, x, Value::Int32(1), false).unwrap();

    let watched_id = rt.structure_of(obj).unwrap();
    let wp = rt.transition_watchpoint(watched_id);
    assert!(wp.start_watching());

    rt.put(obj, y, Value::Int32(2), false).unwrap();
    assert!(wp.has_been_invalidated());
    assert_ne!(rt.structure_of(obj).unwrap(), watched_id);
}

#[test]
fn test_replacement_watchpoint_guards_slot_values() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let key = rt.key_from_str("k");
    rt.put(obj, key, Value::Int32(1), false).unwrap();
    let id = rt.structure_of(obj).unwrap();

    assert!(!rt.slot_is_watched(id, key));
    let wp = rt.replacement_watchpoint(id, key);
    assert!(rt.slot_is_watched(id, key));

    // Overwriting the slot fires the guard before the new value lands.
    rt.put(obj, key, Value::Int32(2), false).unwrap();
    assert!(wp.has_been_invalidated());
    assert!(!rt.slot_is_watched(id, key));
    assert_eq!(rt.get(obj, key).unwrap(), Value::Int32(2));
}

#[test]
fn test_epoch_counts_every_shape_event() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let key = rt.key_from_str("k");

    let before = rt.shape_epoch();
    rt.put(obj, key, Value::Int32(1), false).unwrap();
    let after_add = rt.shape_epoch();
    assert!(after_add > before);

    let id = rt.structure_of(obj).unwrap();
    rt.replacement_watchpoint(id, key);
    rt.put(obj, key, Value::Int32(2), false).unwrap();
    let after_fire = rt.shape_epoch();
    assert!(after_fire > after_add);

    rt.delete_property(obj, key).unwrap();
    assert!(rt.shape_epoch() > after_fire);
}

// ============================================================================
// Megamorphic cache
// ============================================================================

#[test]
fn test_megamorphic_entries_expire_with_the_epoch() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let key = rt.key_from_str("k");
    rt.put(obj, key, Value::Int32(1), false).unwrap();
    let id = rt.structure_of(obj).unwrap();

    let slot = rt.resolve_property(obj, key).unwrap();
    rt.megamorphic_insert(id, key, slot);
    assert!(rt.megamorphic_lookup(id, key).is_some());

    // Any shape event anywhere invalidates the whole table.
    let other = rt.new_object(Value::Null).unwrap();
    rt.add_root(other);
    let unrelated = rt.key_from_str("unrelated");
    rt.put(other, unrelated, Value::Int32(9), false).unwrap();
    assert!(rt.megamorphic_lookup(id, key).is_none());
}

#[test]
fn test_megamorphic_rejects_dictionary_structures() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    rt.add_root(obj);
    let a = rt.key_from_str("a");
    let b = rt.key_from_str("b");
    rt.put(obj, a, Value::Int32(1), false).unwrap();
    rt.put(obj, b, Value::Int32(2), false).unwrap();
    rt.delete_property(obj, a).unwrap();

    let id = rt.structure_of(obj).unwrap();
    let slot = rt.resolve_property(obj, b).unwrap();
    rt.megamorphic_insert(id, b, slot);
    assert!(rt.megamorphic_lookup(id, b).is_none());
}

// ============================================================================
// Attributes and descriptors
// ============================================================================

#[test]
fn test_attribute_presets() {
    let default = PropertyAttributes::default();
    assert!(default.is_writable());
    assert!(default.is_enumerable());
    assert!(default.is_configurable());
    assert!(!default.is_accessor());
    assert!(!default.is_custom());

    let read_only = PropertyAttributes::read_only();
    assert!(!read_only.is_writable());
    assert!(read_only.is_enumerable());
    assert!(!read_only.is_configurable());

    let hidden = PropertyAttributes::hidden();
    assert!(hidden.is_writable());
    assert!(!hidden.is_enumerable());
    assert!(hidden.is_configurable());
}

#[test]
fn test_descriptor_classification() {
    let data = PropertyDescriptor::data(Value::Int32(1), PropertyAttributes::default());
    assert!(data.is_data_descriptor());
    assert!(!data.is_accessor_descriptor());

    let getter: NativeGetter = Rc::new(|_, _| Ok(Value::Undefined));
    let accessor = PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::default());
    assert!(accessor.is_accessor_descriptor());
    assert!(!accessor.is_data_descriptor());

    let generic = PropertyDescriptor {
        enumerable: Some(false),
        ..Default::default()
    };
    assert!(generic.is_generic_descriptor());

    // Absent fields default to false when a new property is created.
    let bare = PropertyDescriptor {
        value: Some(Value::Int32(1)),
        ..Default::default()
    };
    let attrs = bare.attributes_for_new_property();
    assert!(!attrs.is_writable());
    assert!(!attrs.is_enumerable());
    assert!(!attrs.is_configurable());
}

#[test]
fn test_length_key_is_the_interned_name() {
    let mut rt = Runtime::new();
    assert_eq!(rt.length_key(), rt.key_from_str("length"));
    assert!(matches!(rt.key_from_str("0"), PropertyKey::Index(0)));
    // Non-canonical numeric strings stay names.
    assert!(matches!(rt.key_from_str("00"), PropertyKey::Name(_)));
    assert!(matches!(rt.key_from_str("4294967295"), PropertyKey::Name(_)));
}

// ============================================================================
// Shared memory
// ============================================================================

#[test]
fn test_shared_types_cross_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SharedArrayBuffer>();
    assert_send_sync::<SharedTypedView>();
}

#[test]
fn test_view_construction_is_validated() {
    let buffer = SharedArrayBuffer::new(16);

    let err = SharedTypedView::new(buffer.clone(), ElementKind::Uint32, 2, 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RangeError);

    let err = SharedTypedView::new(buffer.clone(), ElementKind::Uint32, 0, 5).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RangeError);

    let view = SharedTypedView::new(buffer.clone(), ElementKind::Uint16, 8, 4).unwrap();
    assert_eq!(view.length(), 4);
    assert_eq!(view.byte_offset(), 8);
    assert_eq!(view.kind(), ElementKind::Uint16);
    assert!(view.buffer().same_buffer(&buffer));

    let err = view.load(4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RangeError);
}

#[test]
fn test_atomics_round_trip_contract() {
    let buffer = SharedArrayBuffer::new(8);
    let view = SharedTypedView::for_buffer(buffer, ElementKind::Uint32).unwrap();

    view.store(0, u32::MAX as i64).unwrap();
    assert_eq!(view.load(0).unwrap(), u32::MAX as i64);
    assert_eq!(view.add(0, 1).unwrap(), u32::MAX as i64);
    assert_eq!(view.load(0).unwrap(), 0);

    assert_eq!(view.exchange(1, 7).unwrap(), 0);
    assert_eq!(view.compare_exchange(1, 7, 9).unwrap(), 7);
    assert_eq!(view.compare_exchange(1, 7, 11).unwrap(), 9);
    assert_eq!(view.load(1).unwrap(), 9);
}
