//! Structure table and runtime integration
//!
//! Verifies that the structure arena, transition interning and butterfly
//! storage compose correctly when driven through the runtime operations:
//! deterministic layouts, the one-way indexing ladder, dictionary demotion
//! and sparse-index placement.

use core_types::{PropertyKey, Value};
use object_model::{IndexingMode, Runtime, StructureId, TRANSITION_CHAIN_CAP};

fn build_with_names(names: &[&str]) -> (Runtime, StructureId) {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    for (i, name) in names.iter().enumerate() {
        let key = rt.key_from_str(name);
        rt.put(obj, key, Value::Int32(i as i32), false).unwrap();
    }
    let id = rt.structure_of(obj).unwrap();
    (rt, id)
}

#[test]
fn test_identical_programs_share_layouts_across_runtimes() {
    let (mut rt_a, id_a) = build_with_names(&["kind", "flags", "payload"]);
    let (mut rt_b, id_b) = build_with_names(&["kind", "flags", "payload"]);
    assert_eq!(id_a, id_b);

    // Same id means same offsets, so a cache entry minted against one
    // runtime's history describes the other's layout too.
    for (rt, id) in [(&mut rt_a, id_a), (&mut rt_b, id_b)] {
        for (i, name) in ["kind", "flags", "payload"].iter().enumerate() {
            let key = rt.key_from_str(name);
            assert_eq!(rt.structures().get(id).get(key).unwrap().offset, i as u32);
        }
    }

    // Reordering the inserts walks different edges to a different shape.
    let reordered = rt_a.new_object(Value::Null).unwrap();
    for name in ["flags", "kind", "payload"] {
        let key = rt_a.key_from_str(name);
        rt_a.put(reordered, key, Value::Int32(0), false).unwrap();
    }
    assert_ne!(rt_a.structure_of(reordered).unwrap(), id_a);
}

#[test]
fn test_transition_replay_hits_the_intern_table() {
    let mut rt = Runtime::new();
    let a = rt.new_object(Value::Null).unwrap();
    let b = rt.new_object(Value::Null).unwrap();
    let x = rt.key_from_str("x");
    let y = rt.key_from_str("y");

    rt.put(a, x, Value::Int32(1), false).unwrap();
    rt.put(a, y, Value::Int32(2), false).unwrap();
    let interned = rt.structure_stats().transitions_interned;
    let hits = rt.structure_stats().transition_hits;

    // The second object walks the same two edges without interning.
    rt.put(b, x, Value::Int32(3), false).unwrap();
    rt.put(b, y, Value::Int32(4), false).unwrap();
    assert_eq!(rt.structure_stats().transitions_interned, interned);
    assert_eq!(rt.structure_stats().transition_hits, hits + 2);
    assert_eq!(rt.structure_of(a).unwrap(), rt.structure_of(b).unwrap());
}

#[test]
fn test_shared_prefix_offsets_survive_divergence() {
    let mut rt = Runtime::new();
    let a = rt.new_object(Value::Null).unwrap();
    let b = rt.new_object(Value::Null).unwrap();
    let x = rt.key_from_str("x");
    let y = rt.key_from_str("y");
    let z = rt.key_from_str("z");

    rt.put(a, x, Value::Int32(1), false).unwrap();
    rt.put(b, x, Value::Int32(2), false).unwrap();
    rt.put(a, y, Value::Int32(3), false).unwrap();
    rt.put(b, z, Value::Int32(4), false).unwrap();

    let sa = rt.structures().get(rt.structure_of(a).unwrap());
    let sb = rt.structures().get(rt.structure_of(b).unwrap());
    assert_eq!(sa.get(x).unwrap().offset, sb.get(x).unwrap().offset);
    assert_eq!(sa.get(y).unwrap().offset, sb.get(z).unwrap().offset);
    assert_eq!(rt.get(a, x).unwrap(), Value::Int32(1));
    assert_eq!(rt.get(b, x).unwrap(), Value::Int32(2));
}

#[test]
fn test_indexing_mode_climbs_and_never_returns() {
    let mut rt = Runtime::new();
    let arr = rt.new_array(Value::Null).unwrap();
    let mode = |rt: &Runtime, arr| {
        rt.structures()
            .get(rt.structure_of(arr).unwrap())
            .indexing_mode()
    };
    assert_eq!(mode(&rt, arr), IndexingMode::Undecided);

    rt.put(arr, PropertyKey::Index(0), Value::Int32(1), false).unwrap();
    assert_eq!(mode(&rt, arr), IndexingMode::Int32);

    rt.put(arr, PropertyKey::Index(1), Value::Double(1.5), false).unwrap();
    assert_eq!(mode(&rt, arr), IndexingMode::Double);

    rt.put(arr, PropertyKey::Index(2), Value::string("s"), false).unwrap();
    assert_eq!(mode(&rt, arr), IndexingMode::Contiguous);

    // Writing an integer again keeps the widest encoding reached.
    rt.put(arr, PropertyKey::Index(3), Value::Int32(4), false).unwrap();
    assert_eq!(mode(&rt, arr), IndexingMode::Contiguous);

    // Earlier values read back unchanged through every promotion.
    assert_eq!(rt.get(arr, PropertyKey::Index(0)).unwrap(), Value::Int32(1));
    assert_eq!(rt.get(arr, PropertyKey::Index(1)).unwrap(), Value::Double(1.5));
    assert_eq!(rt.get(arr, PropertyKey::Index(2)).unwrap(), Value::string("s"));
}

#[test]
fn test_long_histories_demote_and_flatten_compacts() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let total = TRANSITION_CHAIN_CAP + 1;
    for i in 0..total {
        let key = rt.key_from_str(&format!("p{i}"));
        rt.put(obj, key, Value::Int32(i as i32), false).unwrap();
    }
    let dict_id = rt.structure_of(obj).unwrap();
    assert!(rt.structures().get(dict_id).is_dictionary());

    for i in 0..10 {
        let key = rt.key_from_str(&format!("p{i}"));
        assert!(rt.delete_property(obj, key).unwrap());
    }
    let sparse_size = rt
        .structures()
        .get(rt.structure_of(obj).unwrap())
        .out_of_line_size();

    let flattens = rt.structure_stats().flattens;
    rt.flatten_properties(obj).unwrap();
    assert_eq!(rt.structure_stats().flattens, flattens + 1);

    let flat = rt.structures().get(rt.structure_of(obj).unwrap());
    assert_eq!(flat.out_of_line_size() as usize, (total - 10) as usize);
    assert!(flat.out_of_line_size() <= sparse_size);

    // Every surviving property still reads its value after compaction.
    for i in 10..total {
        let key = rt.key_from_str(&format!("p{i}"));
        assert_eq!(rt.get(obj, key).unwrap(), Value::Int32(i as i32));
    }
}

#[test]
fn test_huge_indices_are_named_entries() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let huge = PropertyKey::Index(100_000);

    rt.put(obj, PropertyKey::Index(1), Value::Int32(1), false).unwrap();
    rt.put(obj, huge, Value::Int32(2), false).unwrap();
    let tag = rt.key_from_str("tag");
    rt.put(obj, tag, Value::Int32(3), false).unwrap();

    // The huge index keeps its numeric identity while living in the named
    // table, and enumeration still orders it among the indices.
    assert!(rt.has_own_property(obj, huge).unwrap());
    assert_eq!(rt.get(obj, huge).unwrap(), Value::Int32(2));
    let structure = rt.structures().get(rt.structure_of(obj).unwrap());
    assert!(structure.get(huge).is_some());
    assert_eq!(
        rt.own_keys(obj).unwrap(),
        vec![PropertyKey::Index(1), huge, tag]
    );
}

#[test]
fn test_structure_ids_are_stable_handles() {
    let mut rt = Runtime::new();
    let obj = rt.new_object(Value::Null).unwrap();
    let x = rt.key_from_str("x");
    rt.put(obj, x, Value::Int32(1), false).unwrap();
    let id = rt.structure_of(obj).unwrap();

    // Later growth elsewhere never perturbs an already-issued id.
    for i in 0..32 {
        let other = rt.new_object(Value::Null).unwrap();
        let key = rt.key_from_str(&format!("q{i}"));
        rt.put(other, key, Value::Int32(i), false).unwrap();
    }
    assert_eq!(rt.structure_of(obj).unwrap(), id);
    assert_eq!(rt.structures().get(id).get(x).unwrap().offset, 0);
}
