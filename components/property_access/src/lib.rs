//! Inline caches for property access
//!
//! This crate layers per-call-site caches over the object model:
//! - `AccessSite`: one cache per operation in an instruction stream
//! - Mono/poly/megamorphic state progression with watchpoint guards
//! - Cached handlers for data slots, transitions, accessors and negative
//!   lookups
//!
//! # Example
//!
//! ```
//! use property_access::{get_by_id, AccessSite};
//! use object_model::Runtime;
//! use core_types::Value;
//!
//! let mut rt = Runtime::new();
//! let obj = rt.new_object(Value::Null).unwrap();
//! rt.add_root(obj);
//! let name = rt.key_from_str("name");
//! rt.put(obj, name, Value::Int32(7), false).unwrap();
//!
//! let mut site = AccessSite::new(name);
//! let receiver = Value::Object(obj);
//! assert_eq!(get_by_id(&mut rt, &mut site, &receiver).unwrap(), Value::Int32(7));
//! // The second read is served by the cache.
//! assert_eq!(get_by_id(&mut rt, &mut site, &receiver).unwrap(), Value::Int32(7));
//! assert_eq!(site.stats().hits, 1);
//! ```

pub mod inline_cache;

// Re-export main types
pub use inline_cache::{
    delete_by_id, get_by_id, put_by_id, AccessSite, AccessStats, CacheEntry, CachedHandler,
    InlineCache, POLYMORPHIC_CAP,
};
