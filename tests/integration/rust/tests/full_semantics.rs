//! Observable JavaScript semantics end to end
//!
//! Behavior-level checks spanning several components at once: numeric edge
//! values through array search, enumeration order across deletes,
//! extensibility and integrity levels, holes versus stored undefined,
//! receiver binding during accessor dispatch and full proxy interception.

use core_types::{ErrorKind, PropertyKey, Value};
use object_model::{
    NativeGetter, PropertyAttributes, PropertyDescriptor, ProxyHandler, Runtime,
};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_minus_zero_and_nan_in_array_search() {
    let mut rt = Runtime::new();
    let arr = rt.new_array(Value::Null).unwrap();
    rt.put(arr, PropertyKey::Index(0), Value::number(-0.0), false).unwrap();
    rt.put(arr, PropertyKey::Index(1), Value::number(f64::NAN), false).unwrap();

    // indexOf uses strict equality: 0 matches -0, NaN matches nothing.
    assert_eq!(rt.array_index_of(arr, &Value::Int32(0)).unwrap(), Some(0));
    assert_eq!(rt.array_index_of(arr, &Value::number(f64::NAN)).unwrap(), None);

    // includes uses SameValueZero, so NaN is found.
    assert!(rt.array_includes(arr, &Value::number(f64::NAN)).unwrap());
    assert!(rt.array_includes(arr, &Value::Int32(0)).unwrap());

    // The stored -0 keeps its sign bit.
    match rt.get(arr, PropertyKey::Index(0)).unwrap() {
        Value::Double(stored) => assert!(stored == 0.0 && stored.is_sign_negative()),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn test_delete_then_reinsert_moves_the_key_last() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let a = rt.key_from_str("a");
    let b = rt.key_from_str("b");
    let c = rt.key_from_str("c");
    for (key, value) in [(a, 1), (b, 2), (c, 3)] {
        rt.put(obj, key, Value::Int32(value), false).unwrap();
    }
    assert_eq!(rt.own_keys(obj).unwrap(), vec![a, b, c]);

    assert!(rt.delete_property(obj, b).unwrap());
    assert_eq!(rt.own_keys(obj).unwrap(), vec![a, c]);

    rt.put(obj, b, Value::Int32(4), false).unwrap();
    assert_eq!(rt.own_keys(obj).unwrap(), vec![a, c, b]);
    assert_eq!(rt.get(obj, b).unwrap(), Value::Int32(4));
}

#[test]
fn test_prevent_extensions_blocks_growth_not_writes() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let x = rt.key_from_str("x");
    let y = rt.key_from_str("y");
    rt.put(obj, x, Value::Int32(1), false).unwrap();

    assert!(rt.prevent_extensions(obj).unwrap());
    assert!(!rt.is_extensible(obj).unwrap());
    assert!(!rt.put(obj, y, Value::Int32(2), false).unwrap());
    let err = rt.put(obj, y, Value::Int32(2), true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    // Existing properties stay writable.
    assert!(rt.put(obj, x, Value::Int32(9), false).unwrap());
    assert_eq!(rt.get(obj, x).unwrap(), Value::Int32(9));

    let arr = rt.new_array(Value::Null).unwrap();
    rt.put(arr, PropertyKey::Index(0), Value::Int32(10), false).unwrap();
    assert!(rt.prevent_extensions(arr).unwrap());
    assert!(!rt.put(arr, PropertyKey::Index(1), Value::Int32(11), false).unwrap());
    assert_eq!(rt.array_length(arr).unwrap(), 1);
    assert!(rt.put(arr, PropertyKey::Index(0), Value::Int32(12), false).unwrap());
    assert_eq!(rt.get(arr, PropertyKey::Index(0)).unwrap(), Value::Int32(12));
}

#[test]
fn test_holes_are_not_stored_undefined() {
    let mut rt = Runtime::new();
    let arr = rt.new_array(Value::Null).unwrap();
    rt.put(arr, PropertyKey::Index(0), Value::Int32(1), false).unwrap();
    rt.put(arr, PropertyKey::Index(2), Value::Int32(3), false).unwrap();
    assert_eq!(rt.array_length(arr).unwrap(), 3);

    // The hole reads as undefined but is not an own property.
    assert!(!rt.has_own_property(arr, PropertyKey::Index(1)).unwrap());
    assert_eq!(rt.get(arr, PropertyKey::Index(1)).unwrap(), Value::Undefined);
    assert!(rt.array_includes(arr, &Value::Undefined).unwrap());
    assert_eq!(rt.array_index_of(arr, &Value::Undefined).unwrap(), None);

    // Storing undefined explicitly fills the hole.
    rt.put(arr, PropertyKey::Index(1), Value::Undefined, false).unwrap();
    assert!(rt.has_own_property(arr, PropertyKey::Index(1)).unwrap());
    assert_eq!(rt.array_index_of(arr, &Value::Undefined).unwrap(), Some(1));
}

#[test]
fn test_prototype_getter_sees_the_real_receiver() {
    let mut rt = Runtime::new();
    let proto = rt.new_object(Value::Null).unwrap();
    let me = rt.key_from_str("me");
    let getter: NativeGetter = Rc::new(|_, receiver| Ok(receiver));
    let desc = PropertyDescriptor::accessor(Some(getter), None, PropertyAttributes::default());
    assert!(rt.define_own_property(proto, me, desc, true).unwrap());

    let child = rt.new_object(Value::Object(proto)).unwrap();
    assert_eq!(rt.get(child, me).unwrap(), Value::Object(child));
    assert_eq!(rt.get(proto, me).unwrap(), Value::Object(proto));
}

#[test]
fn test_proxy_routes_every_capability() {
    let mut rt = Runtime::new();
    let tagged = rt.key_from_str("tagged");
    let extra = rt.key_from_str("extra");
    let target = rt.new_object(Value::Null).unwrap();
    rt.put(target, tagged, Value::Int32(1), false).unwrap();

    let counters: Vec<Rc<Cell<u32>>> = (0..7).map(|_| Rc::new(Cell::new(0))).collect();
    let tick = |n: usize| {
        let counter = counters[n].clone();
        move || counter.set(counter.get() + 1)
    };
    let unwrap_target = |target: &Value| match target {
        Value::Object(obj) => *obj,
        _ => unreachable!("proxy target is always an object here"),
    };

    let handler = ProxyHandler {
        get: Some(Rc::new({
            let tick = tick(0);
            move |rt, target, key, _receiver| {
                tick();
                rt.get(unwrap_target(&target), key)
            }
        })),
        set: Some(Rc::new({
            let tick = tick(1);
            move |rt, target, key, value, _receiver| {
                tick();
                rt.put(unwrap_target(&target), key, value, false)
            }
        })),
        has: Some(Rc::new({
            let tick = tick(2);
            move |rt, target, key| {
                tick();
                rt.has_property(unwrap_target(&target), key)
            }
        })),
        delete_property: Some(Rc::new({
            let tick = tick(3);
            move |rt, target, key| {
                tick();
                rt.delete_property(unwrap_target(&target), key)
            }
        })),
        own_keys: Some(Rc::new({
            let tick = tick(4);
            move |rt, target| {
                tick();
                rt.own_keys(unwrap_target(&target))
            }
        })),
        get_own_property_descriptor: Some(Rc::new({
            let tick = tick(5);
            move |rt, target, key| {
                tick();
                rt.get_own_property_descriptor(unwrap_target(&target), key)
            }
        })),
        define_property: Some(Rc::new({
            let tick = tick(6);
            move |rt, target, key, desc| {
                tick();
                rt.define_own_property(unwrap_target(&target), key, desc, false)
            }
        })),
    };
    let proxy = rt.new_proxy(Value::Object(target), Rc::new(handler)).unwrap();

    assert_eq!(rt.get(proxy, tagged).unwrap(), Value::Int32(1));
    assert!(rt.put(proxy, tagged, Value::Int32(2), false).unwrap());
    assert!(rt.has_property(proxy, tagged).unwrap());
    assert!(rt.delete_property(proxy, extra).unwrap());
    assert_eq!(rt.own_keys(proxy).unwrap(), vec![tagged]);
    let desc = rt.get_own_property_descriptor(proxy, tagged).unwrap().unwrap();
    assert_eq!(desc.value, Some(Value::Int32(2)));
    let define = PropertyDescriptor::data(Value::Int32(3), PropertyAttributes::default());
    assert!(rt.define_own_property(proxy, extra, define, true).unwrap());

    // Every trap fired exactly once and mutations landed on the target.
    for (n, counter) in counters.iter().enumerate() {
        assert_eq!(counter.get(), 1, "trap {n}");
    }
    assert_eq!(rt.get(target, tagged).unwrap(), Value::Int32(2));
    assert_eq!(rt.get(target, extra).unwrap(), Value::Int32(3));
}

#[test]
fn test_seal_and_freeze_lock_progressively() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let k = rt.key_from_str("k");
    rt.put(obj, k, Value::Int32(1), false).unwrap();

    assert!(rt.seal(obj).unwrap());
    assert!(rt.is_sealed(obj).unwrap());
    assert!(!rt.is_frozen(obj).unwrap());
    assert!(!rt.is_extensible(obj).unwrap());

    // Sealing pins the key set but leaves values writable.
    assert!(!rt.delete_property(obj, k).unwrap());
    assert!(rt.put(obj, k, Value::Int32(2), false).unwrap());
    assert_eq!(rt.get(obj, k).unwrap(), Value::Int32(2));

    assert!(rt.freeze(obj).unwrap());
    assert!(rt.is_frozen(obj).unwrap());
    assert!(!rt.put(obj, k, Value::Int32(3), false).unwrap());
    let err = rt.put(obj, k, Value::Int32(3), true).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(rt.get(obj, k).unwrap(), Value::Int32(2));

    // An empty non-extensible object is vacuously sealed and frozen.
    let empty = rt.new_object(Value::Null).unwrap();
    rt.prevent_extensions(empty).unwrap();
    assert!(rt.is_sealed(empty).unwrap());
    assert!(rt.is_frozen(empty).unwrap());
}
