//! Per-environment active-context maps and the global overlay.
//!
//! Each environment maps attribute ids to a current value: a node
//! reference, or an inline 64-bit scalar for store-as-value attributes.
//! A process-wide overlay holds the values of global attributes; an
//! env-local entry shadows the overlay entry for the same attribute.
//!
//! Maps are ordered by attribute id, so a snapshot of a given merged
//! context is always emitted in the same order and snapshots of equal
//! contexts are bitwise equal.
//!
//! The whole store sits behind one signal-safe RW lock: `set`/`unset`/
//! `clone_environment` take the write side, while `get`, `context_size`,
//! and `get_context` only take the read side and allocate nothing, so
//! they may run inside asynchronous signal handlers.

use std::collections::BTreeMap;

use vernier_error::{Error, Result};
use vernier_types::{AttrId, ContextEntry, ENTRY_WORDS, EntryValue, EnvId};

use crate::lock::SigsafeRwLock;
use crate::metrics;

struct ContextData {
    envs: Vec<BTreeMap<u64, EntryValue>>,
    global: BTreeMap<u64, EntryValue>,
}

pub struct ContextStore {
    state: SigsafeRwLock<ContextData>,
}

impl ContextStore {
    /// Create the store with environment 0 present and empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SigsafeRwLock::new(ContextData {
                envs: vec![BTreeMap::new()],
                global: BTreeMap::new(),
            }),
        }
    }

    /// Allocate a fresh environment as a deep copy of `source`'s entries.
    pub fn clone_environment(&self, source: EnvId) -> Result<EnvId> {
        let mut state = self.state.write();
        let copy = state
            .envs
            .get(source.raw() as usize)
            .ok_or(Error::NoSuchEnvironment { env: source })?
            .clone();

        let id = EnvId::new(state.envs.len() as u64);
        if !id.is_valid() {
            return Err(Error::IdSpaceExhausted { what: "environment" });
        }
        state.envs.push(copy);

        tracing::debug!(target: "vernier.context", source = %source, clone = %id, "environment cloned");
        Ok(id)
    }

    /// Current value for (env, attr): the env-local entry if present,
    /// otherwise the global overlay entry.
    #[must_use]
    pub fn get(&self, env: EnvId, attr: AttrId) -> Option<EntryValue> {
        let state = self.state.read();
        let local = state.envs.get(env.raw() as usize)?;
        local
            .get(&attr.raw())
            .or_else(|| state.global.get(&attr.raw()))
            .copied()
    }

    /// Write a value. `is_global` targets the process-wide overlay;
    /// otherwise the env-local map. Last write wins.
    pub fn set(&self, env: EnvId, attr: AttrId, value: EntryValue, is_global: bool) -> Result<()> {
        let mut state = self.state.write();
        if (env.raw() as usize) >= state.envs.len() {
            return Err(Error::NoSuchEnvironment { env });
        }
        if is_global {
            state.global.insert(attr.raw(), value);
        } else {
            state.envs[env.raw() as usize].insert(attr.raw(), value);
        }
        Ok(())
    }

    /// Remove the env-local entry for `attr`. Returns whether an entry was
    /// removed. Global-overlay entries are untouched.
    pub fn unset(&self, env: EnvId, attr: AttrId) -> Result<bool> {
        let mut state = self.state.write();
        let local = state
            .envs
            .get_mut(env.raw() as usize)
            .ok_or(Error::NoSuchEnvironment { env })?;
        Ok(local.remove(&attr.raw()).is_some())
    }

    /// Number of live entries in the merged (env-local ∪ global) view.
    /// An env-local entry shadows the overlay entry for the same
    /// attribute, so each attribute counts once. Unknown environments
    /// have an empty context.
    #[must_use]
    pub fn context_size(&self, env: EnvId) -> usize {
        let state = self.state.read();
        let Some(local) = state.envs.get(env.raw() as usize) else {
            return 0;
        };
        local.len()
            + state
                .global
                .keys()
                .filter(|key| !local.contains_key(key))
                .count()
    }

    /// Write the packed snapshot of the merged view into `buf`, in
    /// ascending attribute-id order, and return the number of words
    /// written. Stops at an entry boundary when the buffer is short.
    ///
    /// Signal-safe: read lock only, no allocation. Unknown environments
    /// (and buffers shorter than one entry) yield zero words.
    pub fn get_context(&self, env: EnvId, buf: &mut [u64]) -> usize {
        let state = self.state.read();
        let Some(local) = state.envs.get(env.raw() as usize) else {
            return 0;
        };

        let mut written = 0usize;
        let mut local_iter = local.iter().peekable();
        let mut global_iter = state.global.iter().peekable();

        loop {
            if written + ENTRY_WORDS > buf.len() {
                break;
            }
            // Ordered merge; on a shared key the env-local entry shadows
            // the overlay entry.
            let (key, value) = match (local_iter.peek(), global_iter.peek()) {
                (Some(&(lk, lv)), Some(&(gk, _))) if lk <= gk => {
                    if *gk == *lk {
                        global_iter.next();
                    }
                    local_iter.next();
                    (*lk, *lv)
                }
                (_, Some(&(gk, gv))) => {
                    global_iter.next();
                    (*gk, *gv)
                }
                (Some(&(lk, lv)), None) => {
                    local_iter.next();
                    (*lk, *lv)
                }
                (None, None) => break,
            };

            let words = ContextEntry {
                attr: AttrId::new(key),
                value,
            }
            .pack();
            buf[written..written + ENTRY_WORDS].copy_from_slice(&words);
            written += ENTRY_WORDS;
        }

        metrics::record_snapshot();
        written
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ContextStore;
    use vernier_types::{AttrId, ENTRY_WORDS, EntryValue, EnvId, NodeId, entries};

    const ENV0: EnvId = EnvId::new(0);

    fn snapshot(store: &ContextStore, env: EnvId) -> Vec<u64> {
        let mut buf = [0u64; 64];
        let words = store.get_context(env, &mut buf);
        buf[..words].to_vec()
    }

    #[test]
    fn environment_zero_exists_and_is_empty() {
        let store = ContextStore::new();
        assert_eq!(store.context_size(ENV0), 0);
        assert!(store.get(ENV0, AttrId::new(0)).is_none());
    }

    #[test]
    fn set_get_unset_round_trip() {
        let store = ContextStore::new();
        let attr = AttrId::new(2);
        store
            .set(ENV0, attr, EntryValue::Reference(NodeId::new(5)), false)
            .unwrap();
        assert_eq!(
            store.get(ENV0, attr),
            Some(EntryValue::Reference(NodeId::new(5)))
        );
        assert_eq!(store.context_size(ENV0), 1);
        assert!(store.unset(ENV0, attr).unwrap());
        assert!(!store.unset(ENV0, attr).unwrap());
        assert_eq!(store.context_size(ENV0), 0);
    }

    #[test]
    fn last_write_wins() {
        let store = ContextStore::new();
        let attr = AttrId::new(0);
        store.set(ENV0, attr, EntryValue::Inline(1), false).unwrap();
        store.set(ENV0, attr, EntryValue::Inline(2), false).unwrap();
        assert_eq!(store.get(ENV0, attr), Some(EntryValue::Inline(2)));
        assert_eq!(store.context_size(ENV0), 1);
    }

    #[test]
    fn global_overlay_is_visible_from_every_environment() {
        let store = ContextStore::new();
        let host = AttrId::new(1);
        store.set(ENV0, host, EntryValue::Inline(77), true).unwrap();
        let env2 = store.clone_environment(ENV0).unwrap();
        assert_eq!(store.get(env2, host), Some(EntryValue::Inline(77)));
        assert_eq!(store.context_size(env2), 1);
    }

    #[test]
    fn env_local_entry_shadows_the_overlay() {
        let store = ContextStore::new();
        let attr = AttrId::new(3);
        store.set(ENV0, attr, EntryValue::Inline(1), true).unwrap();
        store.set(ENV0, attr, EntryValue::Inline(2), false).unwrap();
        assert_eq!(store.get(ENV0, attr), Some(EntryValue::Inline(2)));
        // Shadowed attribute counts once.
        assert_eq!(store.context_size(ENV0), 1);
        let decoded: Vec<_> = entries(&snapshot(&store, ENV0)).collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value, EntryValue::Inline(2));
        // Unsetting the local entry reveals the overlay again.
        assert!(store.unset(ENV0, attr).unwrap());
        assert_eq!(store.get(ENV0, attr), Some(EntryValue::Inline(1)));
    }

    #[test]
    fn cloned_environment_starts_as_a_copy() {
        let store = ContextStore::new();
        let a = AttrId::new(0);
        let b = AttrId::new(1);
        store.set(ENV0, a, EntryValue::Inline(10), false).unwrap();
        store.set(ENV0, b, EntryValue::Reference(NodeId::new(3)), false).unwrap();

        let clone = store.clone_environment(ENV0).unwrap();
        assert_eq!(clone.raw(), 1);
        assert_eq!(snapshot(&store, clone), snapshot(&store, ENV0));

        // The copy is deep: mutating the clone leaves the source alone.
        store.set(clone, a, EntryValue::Inline(99), false).unwrap();
        assert_eq!(store.get(ENV0, a), Some(EntryValue::Inline(10)));
    }

    #[test]
    fn clone_of_unknown_environment_fails() {
        let store = ContextStore::new();
        assert!(store.clone_environment(EnvId::new(9)).is_err());
    }

    #[test]
    fn snapshot_is_ordered_by_attribute_id() {
        let store = ContextStore::new();
        for raw in [5u64, 1, 3] {
            store
                .set(ENV0, AttrId::new(raw), EntryValue::Inline(raw * 10), false)
                .unwrap();
        }
        store.set(ENV0, AttrId::new(2), EntryValue::Inline(20), true).unwrap();
        let decoded: Vec<_> = entries(&snapshot(&store, ENV0)).collect();
        let keys: Vec<u64> = decoded.iter().map(|e| e.attr.raw()).collect();
        assert_eq!(keys, vec![1, 2, 3, 5]);
    }

    #[test]
    fn truncation_stops_at_an_entry_boundary() {
        let store = ContextStore::new();
        for raw in 0..4u64 {
            store
                .set(ENV0, AttrId::new(raw), EntryValue::Inline(raw), false)
                .unwrap();
        }
        // Room for one and a half entries: only one is written.
        let mut buf = [0u64; ENTRY_WORDS + 1];
        let words = store.get_context(ENV0, &mut buf);
        assert_eq!(words, ENTRY_WORDS);
        let decoded: Vec<_> = entries(&buf[..words]).collect();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].attr.raw(), 0);
    }

    #[test]
    fn unknown_environment_snapshots_are_empty() {
        let store = ContextStore::new();
        let mut buf = [0u64; 8];
        assert_eq!(store.get_context(EnvId::new(7), &mut buf), 0);
        assert_eq!(store.context_size(EnvId::new(7)), 0);
        assert_eq!(store.get_context(EnvId::INVALID, &mut buf), 0);
    }
}
