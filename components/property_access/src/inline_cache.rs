//! Inline caching for property access
//!
//! Each access site in an instruction stream owns an [`AccessSite`]. The
//! site observes the structure ids flowing through it and caches a handler
//! per structure, so repeat accesses skip the chain walk in the object
//! model. Entries carry watchpoint guards for every structure their
//! resolution consulted beyond the receiver; a fired guard turns the entry
//! into a miss and evicts it.

use arrayvec::ArrayVec;
use std::fmt;

use core_types::{JsError, JsResult, ObjectRef, PropertyKey, Value};
use object_model::{
    NativeGetter, ObjectKind, PropertySlot, Runtime, SlotKind, StructureId, WatchpointRef,
};

/// Distinct structures a site tolerates before going megamorphic.
pub const POLYMORPHIC_CAP: usize = 8;

/// What to do when the receiver's structure matches a cached entry.
///
/// Get handlers: [`OwnData`](CachedHandler::OwnData),
/// [`PrototypeData`](CachedHandler::PrototypeData),
/// [`Accessor`](CachedHandler::Accessor) (also dispatches puts through the
/// setter), [`Custom`](CachedHandler::Custom) and the negative
/// [`Absent`](CachedHandler::Absent). Put handlers:
/// [`Transition`](CachedHandler::Transition) and
/// [`Replace`](CachedHandler::Replace). Delete handlers:
/// [`AbsentDelete`](CachedHandler::AbsentDelete) and
/// [`NonConfigurable`](CachedHandler::NonConfigurable).
#[derive(Clone)]
pub enum CachedHandler {
    /// Data slot on the receiver itself.
    OwnData {
        /// Out-of-line slot offset.
        offset: u32,
    },
    /// Data slot found on a prototype.
    PrototypeData {
        /// The prototype holding the slot.
        holder: ObjectRef,
        /// Out-of-line slot offset on the holder.
        offset: u32,
    },
    /// Accessor cell, own or inherited. The pair is snapshotted from the
    /// slot at dispatch time, never stored in the cache.
    Accessor {
        /// The prototype holding the accessor slot, or `None` when the slot
        /// lives on the receiver. Every object of a structure keeps its own
        /// accessor slot at the shared offset, so the receiver's cell has to
        /// be the one consulted.
        holder: Option<ObjectRef>,
        /// Out-of-line slot offset on the holder.
        offset: u32,
    },
    /// Host-native getter. Custom tables are immutable once an object is
    /// built, so the snapshot can never go stale.
    Custom {
        /// The native getter to invoke.
        getter: NativeGetter,
    },
    /// The whole chain proved the key absent.
    Absent,
    /// Put that adds the key and moves the receiver to a known structure.
    Transition {
        /// Structure the receiver adopts after the add.
        new_structure: StructureId,
        /// Slot offset assigned by the new structure.
        offset: u32,
    },
    /// Put that overwrites an existing own data slot.
    Replace {
        /// Out-of-line slot offset.
        offset: u32,
    },
    /// Delete of a key the receiver does not own.
    AbsentDelete,
    /// Delete refused by a non-configurable own property.
    NonConfigurable,
}

impl fmt::Debug for CachedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachedHandler::OwnData { offset } => {
                f.debug_struct("OwnData").field("offset", offset).finish()
            }
            CachedHandler::PrototypeData { holder, offset } => f
                .debug_struct("PrototypeData")
                .field("holder", holder)
                .field("offset", offset)
                .finish(),
            CachedHandler::Accessor { holder, offset } => f
                .debug_struct("Accessor")
                .field("holder", holder)
                .field("offset", offset)
                .finish(),
            CachedHandler::Custom { .. } => f.write_str("Custom"),
            CachedHandler::Absent => f.write_str("Absent"),
            CachedHandler::Transition {
                new_structure,
                offset,
            } => f
                .debug_struct("Transition")
                .field("new_structure", new_structure)
                .field("offset", offset)
                .finish(),
            CachedHandler::Replace { offset } => {
                f.debug_struct("Replace").field("offset", offset).finish()
            }
            CachedHandler::AbsentDelete => f.write_str("AbsentDelete"),
            CachedHandler::NonConfigurable => f.write_str("NonConfigurable"),
        }
    }
}

/// One cached resolution and the guards that keep it honest.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    structure: StructureId,
    handler: CachedHandler,
    guards: Vec<WatchpointRef>,
}

impl CacheEntry {
    /// The receiver structure this entry applies to.
    pub fn structure(&self) -> StructureId {
        self.structure
    }

    /// The cached handler.
    pub fn handler(&self) -> &CachedHandler {
        &self.handler
    }

    fn is_valid(&self) -> bool {
        self.guards.iter().all(|guard| guard.is_still_valid())
    }
}

/// Per-site cache over receiver structure ids.
///
/// States only ever move forward: a site that has seen two structures never
/// reports itself monomorphic again, and megamorphic is terminal. Guard
/// fires evict entries without moving the state backwards (a polymorphic
/// site with every entry evicted stays polymorphic).
#[derive(Debug, Clone, Default)]
pub enum InlineCache {
    /// Nothing observed yet.
    #[default]
    Uninitialized,
    /// Single structure cached (the common case).
    Monomorphic(CacheEntry),
    /// Up to [`POLYMORPHIC_CAP`] structures cached.
    Polymorphic(ArrayVec<CacheEntry, POLYMORPHIC_CAP>),
    /// Too many structures; the site leans on the runtime-wide table.
    Megamorphic,
}

impl InlineCache {
    /// Fresh, empty cache.
    pub fn new() -> InlineCache {
        InlineCache::Uninitialized
    }

    /// Finds the handler cached for `structure`, evicting any entry whose
    /// guard has fired along the way.
    pub fn lookup_or_miss(&mut self, structure: StructureId) -> Option<CachedHandler> {
        match self {
            InlineCache::Uninitialized | InlineCache::Megamorphic => None,
            InlineCache::Monomorphic(entry) => {
                if !entry.is_valid() {
                    *self = InlineCache::Uninitialized;
                    return None;
                }
                if entry.structure == structure {
                    Some(entry.handler.clone())
                } else {
                    None
                }
            }
            InlineCache::Polymorphic(entries) => {
                entries.retain(|entry| entry.is_valid());
                entries
                    .iter()
                    .find(|entry| entry.structure == structure)
                    .map(|entry| entry.handler.clone())
            }
        }
    }

    /// Records a resolution, walking the state ladder as needed:
    /// uninitialized to monomorphic, monomorphic to polymorphic on a second
    /// structure, polymorphic to megamorphic past the capacity. A structure
    /// already present has its entry replaced in place.
    pub fn populate(
        &mut self,
        structure: StructureId,
        handler: CachedHandler,
        guards: Vec<WatchpointRef>,
    ) {
        let entry = CacheEntry {
            structure,
            handler,
            guards,
        };
        *self = match std::mem::replace(self, InlineCache::Uninitialized) {
            InlineCache::Uninitialized => InlineCache::Monomorphic(entry),
            InlineCache::Monomorphic(existing) => {
                if existing.structure == entry.structure {
                    InlineCache::Monomorphic(entry)
                } else {
                    let mut entries = ArrayVec::new();
                    entries.push(existing);
                    entries.push(entry);
                    InlineCache::Polymorphic(entries)
                }
            }
            InlineCache::Polymorphic(mut entries) => {
                if let Some(existing) = entries
                    .iter_mut()
                    .find(|existing| existing.structure == entry.structure)
                {
                    *existing = entry;
                    InlineCache::Polymorphic(entries)
                } else if entries.len() < POLYMORPHIC_CAP {
                    entries.push(entry);
                    InlineCache::Polymorphic(entries)
                } else {
                    InlineCache::Megamorphic
                }
            }
            InlineCache::Megamorphic => InlineCache::Megamorphic,
        };
    }

    /// Drops the entry for `structure`, if cached.
    pub fn evict(&mut self, structure: StructureId) {
        match self {
            InlineCache::Monomorphic(entry) if entry.structure == structure => {
                *self = InlineCache::Uninitialized;
            }
            InlineCache::Polymorphic(entries) => {
                entries.retain(|entry| entry.structure != structure);
            }
            _ => {}
        }
    }

    /// Whether the site has given up on per-structure entries.
    pub fn is_megamorphic(&self) -> bool {
        matches!(self, InlineCache::Megamorphic)
    }

    /// Entries currently held.
    pub fn live_entries(&self) -> usize {
        match self {
            InlineCache::Uninitialized | InlineCache::Megamorphic => 0,
            InlineCache::Monomorphic(_) => 1,
            InlineCache::Polymorphic(entries) => entries.len(),
        }
    }
}

/// Counters for one access site.
#[derive(Debug, Default, Clone)]
pub struct AccessStats {
    /// Cached handler executed.
    pub hits: u64,
    /// Cache consulted but the slow path ran.
    pub misses: u64,
    /// Entries dropped because a guard fired or a holder died.
    pub evictions: u64,
    /// Hits served from the runtime-wide megamorphic table.
    pub megamorphic_hits: u64,
    /// Operations that bypass caching entirely (element keys, megamorphic
    /// puts and deletes).
    pub uncached: u64,
}

/// One property-access site: a key, its cache and its counters.
///
/// A site belongs to exactly one operation in the instruction stream, so a
/// given instance only ever sees gets, only puts, or only deletes.
#[derive(Debug, Clone)]
pub struct AccessSite {
    key: PropertyKey,
    cache: InlineCache,
    stats: AccessStats,
}

impl AccessSite {
    /// Site for accesses under `key`.
    pub fn new(key: PropertyKey) -> AccessSite {
        AccessSite {
            key,
            cache: InlineCache::new(),
            stats: AccessStats::default(),
        }
    }

    /// The key this site accesses.
    pub fn key(&self) -> PropertyKey {
        self.key
    }

    /// The cache state, for inspection.
    pub fn cache(&self) -> &InlineCache {
        &self.cache
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &AccessStats {
        &self.stats
    }
}

fn fail(throw: bool, message: &str) -> JsResult<bool> {
    if throw {
        Err(JsError::type_error(message))
    } else {
        Ok(false)
    }
}

fn expect_receiver(value: &Value, what: &str) -> JsResult<ObjectRef> {
    match value {
        Value::Object(obj) => Ok(*obj),
        _ => Err(JsError::type_error(what)),
    }
}

/// Transition watchpoints for every structure consulted beyond the
/// receiver, armed so any shape change along the chain invalidates the
/// entry. The receiver itself is guarded by structure-id equality.
fn chain_guards(rt: &Runtime, consulted: &[StructureId]) -> Vec<WatchpointRef> {
    consulted[1..]
        .iter()
        .map(|&id| {
            let guard = rt.transition_watchpoint(id);
            guard.start_watching();
            guard
        })
        .collect()
}

fn guards_valid(guards: &[WatchpointRef]) -> bool {
    guards.iter().all(|guard| guard.is_still_valid())
}

/// Cached property read.
///
/// On a miss the site resolves through the object model, performs the read
/// uncached, and only then populates the cache; a getter that mutates the
/// chain during the call fires the would-be guards and the stale resolution
/// is discarded instead of cached.
pub fn get_by_id(rt: &mut Runtime, site: &mut AccessSite, value: &Value) -> JsResult<Value> {
    let obj = expect_receiver(value, "cannot read property of a non-object value")?;
    let key = site.key;
    if matches!(key, PropertyKey::Index(_)) {
        site.stats.uncached += 1;
        return rt.get(obj, key);
    }
    let structure = rt.structure_of(obj)?;

    if site.cache.is_megamorphic() {
        let cached = rt
            .megamorphic_lookup(structure, key)
            .map(|slot| (slot.holder, slot.kind, slot.consulted.len()));
        if let Some((holder, kind, depth)) = cached {
            match kind {
                SlotKind::Data { offset } => {
                    // Depth one means the slot is on the receiver; the
                    // recorded holder is whichever object seeded the entry,
                    // so the read must go through the receiver instead.
                    let source = if depth == 1 { Some(obj) } else { holder };
                    if let Some(source) = source {
                        if let Ok(found) = rt.read_slot(source, offset) {
                            site.stats.megamorphic_hits += 1;
                            return Ok(found);
                        }
                    }
                }
                SlotKind::Absent => {
                    site.stats.megamorphic_hits += 1;
                    return Ok(Value::Undefined);
                }
                _ => {}
            }
        }
        site.stats.misses += 1;
        let slot = rt.resolve_property(obj, key)?;
        if slot.cacheable && matches!(slot.kind, SlotKind::Data { .. } | SlotKind::Absent) {
            rt.megamorphic_insert(structure, key, slot);
        }
        return rt.get(obj, key);
    }

    let before = site.cache.live_entries();
    let handler = site.cache.lookup_or_miss(structure);
    site.stats.evictions += (before - site.cache.live_entries()) as u64;
    if let Some(handler) = handler {
        match handler {
            CachedHandler::OwnData { offset } => {
                site.stats.hits += 1;
                return rt.read_slot(obj, offset);
            }
            CachedHandler::PrototypeData { holder, offset } => match rt.read_slot(holder, offset) {
                Ok(found) => {
                    site.stats.hits += 1;
                    return Ok(found);
                }
                Err(_) => {
                    site.cache.evict(structure);
                    site.stats.evictions += 1;
                }
            },
            CachedHandler::Accessor { holder, offset } => {
                match rt.slot_accessor(holder.unwrap_or(obj), offset) {
                    Ok(pair) => {
                        site.stats.hits += 1;
                        return match pair.getter {
                            Some(getter) => getter(rt, value.clone()),
                            None => Ok(Value::Undefined),
                        };
                    }
                    Err(_) => {
                        site.cache.evict(structure);
                        site.stats.evictions += 1;
                    }
                }
            }
            CachedHandler::Custom { getter } => {
                site.stats.hits += 1;
                return getter(rt, value.clone());
            }
            CachedHandler::Absent => {
                site.stats.hits += 1;
                return Ok(Value::Undefined);
            }
            _ => {}
        }
    }

    site.stats.misses += 1;
    let slot = rt.resolve_property(obj, key)?;
    let result = rt.get(obj, key)?;
    populate_get(rt, site, obj, structure, &slot);
    Ok(result)
}

fn populate_get(
    rt: &Runtime,
    site: &mut AccessSite,
    obj: ObjectRef,
    structure: StructureId,
    slot: &PropertySlot,
) {
    if !slot.cacheable {
        return;
    }
    let handler = match slot.kind {
        SlotKind::Data { offset } => match slot.holder {
            Some(holder) if holder == obj => CachedHandler::OwnData { offset },
            Some(holder) => CachedHandler::PrototypeData { holder, offset },
            None => return,
        },
        SlotKind::Accessor { offset } => match slot.holder {
            Some(holder) if holder == obj => CachedHandler::Accessor {
                holder: None,
                offset,
            },
            Some(holder) => CachedHandler::Accessor {
                holder: Some(holder),
                offset,
            },
            None => return,
        },
        SlotKind::Custom => {
            let getter = slot.holder.and_then(|holder| custom_getter(rt, holder, site.key));
            match getter {
                Some(getter) => CachedHandler::Custom { getter },
                None => return,
            }
        }
        SlotKind::Absent => CachedHandler::Absent,
        // Element, array-length and proxy resolutions stay uncached.
        _ => return,
    };
    let guards = chain_guards(rt, &slot.consulted);
    if guards_valid(&guards) {
        site.cache.populate(structure, handler, guards);
    }
}

fn custom_getter(rt: &Runtime, holder: ObjectRef, key: PropertyKey) -> Option<NativeGetter> {
    match rt.object(holder).ok()?.kind() {
        ObjectKind::HostCustom(table) => table.get(key)?.getter.clone(),
        _ => None,
    }
}

/// Cached property write.
///
/// Caches overwrites of own writable data slots, adds that replay an
/// interned transition, and setter dispatch. Everything else (array
/// lengths, custom setters, proxies, dictionary receivers) takes the slow
/// path every time.
pub fn put_by_id(
    rt: &mut Runtime,
    site: &mut AccessSite,
    value: &Value,
    new_value: Value,
    throw: bool,
) -> JsResult<bool> {
    let obj = expect_receiver(value, "cannot set property of a non-object value")?;
    let key = site.key;
    if matches!(key, PropertyKey::Index(_)) {
        site.stats.uncached += 1;
        return rt.put(obj, key, new_value, throw);
    }
    let structure = rt.structure_of(obj)?;
    if site.cache.is_megamorphic() {
        site.stats.uncached += 1;
        return rt.put(obj, key, new_value, throw);
    }

    let before = site.cache.live_entries();
    let handler = site.cache.lookup_or_miss(structure);
    site.stats.evictions += (before - site.cache.live_entries()) as u64;
    if let Some(handler) = handler {
        match handler {
            CachedHandler::Replace { offset } => {
                // A watchpoint materialized after this entry was cached
                // still gets its fire: fall back to the full put.
                if !rt.slot_is_watched(structure, key) {
                    site.stats.hits += 1;
                    rt.write_slot(obj, key, offset, new_value)?;
                    return Ok(true);
                }
            }
            CachedHandler::Transition {
                new_structure,
                offset,
            } => {
                site.stats.hits += 1;
                rt.apply_transition(obj, new_structure, offset, new_value)?;
                return Ok(true);
            }
            CachedHandler::Accessor { holder, offset } => {
                match rt.slot_accessor(holder.unwrap_or(obj), offset) {
                    Ok(pair) => {
                        site.stats.hits += 1;
                        return match pair.setter {
                            Some(setter) => {
                                setter(rt, value.clone(), new_value)?;
                                Ok(true)
                            }
                            None => fail(throw, "property has only a getter"),
                        };
                    }
                    Err(_) => {
                        site.cache.evict(structure);
                        site.stats.evictions += 1;
                    }
                }
            }
            _ => {}
        }
    }

    site.stats.misses += 1;
    let slot = rt.resolve_property(obj, key)?;
    let result = rt.put(obj, key, new_value, throw)?;
    if result {
        populate_put(rt, site, obj, structure, &slot)?;
    }
    Ok(result)
}

fn populate_put(
    rt: &Runtime,
    site: &mut AccessSite,
    obj: ObjectRef,
    old_structure: StructureId,
    slot: &PropertySlot,
) -> JsResult<()> {
    if !slot.cacheable {
        return Ok(());
    }
    let new_structure = rt.structure_of(obj)?;
    if rt.structures().get(new_structure).is_dictionary() {
        return Ok(());
    }
    match slot.kind {
        SlotKind::Data { offset } if slot.holder == Some(obj) => {
            let watched = rt.slot_is_watched(old_structure, site.key);
            if new_structure == old_structure && slot.attributes.is_writable() && !watched {
                site.cache
                    .populate(old_structure, CachedHandler::Replace { offset }, Vec::new());
            }
        }
        SlotKind::Absent => {
            // The put added the key; replay the interned edge next time.
            if new_structure != old_structure {
                if let Some(entry) = rt.structures().get(new_structure).get(site.key) {
                    if !entry.attributes.is_accessor() {
                        let guards = chain_guards(rt, &slot.consulted);
                        if guards_valid(&guards) {
                            site.cache.populate(
                                old_structure,
                                CachedHandler::Transition {
                                    new_structure,
                                    offset: entry.offset,
                                },
                                guards,
                            );
                        }
                    }
                }
            }
        }
        SlotKind::Accessor { offset } => {
            if let Some(holder) = slot.holder {
                // The setter already ran; only cache if it left the chain
                // alone.
                let guards = chain_guards(rt, &slot.consulted);
                if guards_valid(&guards) {
                    let holder = (holder != obj).then_some(holder);
                    site.cache.populate(
                        old_structure,
                        CachedHandler::Accessor { holder, offset },
                        guards,
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Cached property delete.
///
/// Only the two structure-stable outcomes are cacheable: deletes of keys
/// the receiver does not own (always true) and deletes refused by a
/// non-configurable own property (always false). A successful own delete
/// changes the structure, so it can never repeat against the same id.
pub fn delete_by_id(rt: &mut Runtime, site: &mut AccessSite, value: &Value) -> JsResult<bool> {
    let obj = expect_receiver(value, "cannot delete property of a non-object value")?;
    let key = site.key;
    if matches!(key, PropertyKey::Index(_)) {
        site.stats.uncached += 1;
        return rt.delete_property(obj, key);
    }
    let structure = rt.structure_of(obj)?;
    if site.cache.is_megamorphic() {
        site.stats.uncached += 1;
        return rt.delete_property(obj, key);
    }

    let before = site.cache.live_entries();
    let handler = site.cache.lookup_or_miss(structure);
    site.stats.evictions += (before - site.cache.live_entries()) as u64;
    match handler {
        Some(CachedHandler::AbsentDelete) => {
            site.stats.hits += 1;
            return Ok(true);
        }
        Some(CachedHandler::NonConfigurable) => {
            site.stats.hits += 1;
            return Ok(false);
        }
        _ => {}
    }

    site.stats.misses += 1;
    let slot = rt.resolve_property(obj, key)?;
    let result = rt.delete_property(obj, key)?;
    if slot.cacheable {
        if slot.holder != Some(obj) {
            if result {
                site.cache
                    .populate(structure, CachedHandler::AbsentDelete, Vec::new());
            }
        } else if !result && !slot.attributes.is_configurable() {
            site.cache
                .populate(structure, CachedHandler::NonConfigurable, Vec::new());
        }
    }
    Ok(result)
}
