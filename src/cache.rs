//! Compilation cache and recursion guard.
//!
//! Each key moves through `empty -> in progress -> resolved`. The thread that
//! inserts the slot compiles it; anyone who asks for the key before the slot
//! resolves (including the compiling thread itself, via a recursive schema)
//! receives a trampoline that waits for the slot on first call. Compilation
//! never blocks on another key, so cycles that span threads cannot deadlock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::conversion::{Conversion, Transform};
use crate::error::TransformError;
use crate::types::SchemaId;

/// Cache key: the schema node and whether the value is required there.
pub type CacheKey = (SchemaId, bool);

type Slot<C> = Arc<OnceCell<Transform<C>>>;

/// Append-only map from [`CacheKey`] to compiled transforms.
pub struct CompilationCache<C: Conversion> {
    slots: DashMap<CacheKey, Slot<C>>,
    compilations: AtomicUsize,
}

impl<C: Conversion> CompilationCache<C> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            compilations: AtomicUsize::new(0),
        }
    }

    /// Number of times a transform was actually compiled.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Number of keys seen, resolved or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when `key` has a finished transform.
    pub fn is_resolved(&self, key: CacheKey) -> bool {
        self.slots
            .get(&key)
            .map(|slot| slot.value().get().is_some())
            .unwrap_or(false)
    }

    /// Return the transform for `key`, running `compile` only if no one has
    /// started compiling it yet.
    pub(crate) fn get_or_compile<F>(&self, key: CacheKey, compile: F) -> Transform<C>
    where
        F: FnOnce() -> Transform<C>,
    {
        if let Some(compiled) = self.slots.get(&key).and_then(|slot| slot.value().get().cloned()) {
            return compiled;
        }

        let slot = match self.slots.entry(key) {
            Entry::Occupied(entry) => {
                let slot = Arc::clone(entry.get());
                drop(entry);
                return match slot.get() {
                    Some(compiled) => Arc::clone(compiled),
                    None => {
                        tracing::trace!(
                            direction = C::NAME,
                            schema = %key.0,
                            required = key.1,
                            "compilation in progress, returning trampoline"
                        );
                        trampoline::<C>(key, &slot)
                    }
                };
            }
            Entry::Vacant(entry) => {
                let slot: Slot<C> = Arc::new(OnceCell::new());
                entry.insert(Arc::clone(&slot));
                slot
            }
        };

        // The shard lock is released: recursive lookups from `compile` can
        // reach this cache again.
        self.compilations.fetch_add(1, Ordering::Relaxed);
        let compiled = compile();
        if slot.set(Arc::clone(&compiled)).is_err() {
            // Only the inserting caller sets a slot.
            tracing::warn!(schema = %key.0, "compiled slot was already resolved");
        }
        compiled
    }
}

impl<C: Conversion> Default for CompilationCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Defer to `slot`, waiting for it to resolve on first call.
///
/// Only the cache owns slots strongly; a recursive transform reaches itself
/// through the weak handle, so dropping the cache frees the whole graph.
fn trampoline<C: Conversion>(key: CacheKey, slot: &Slot<C>) -> Transform<C> {
    let slot = Arc::downgrade(slot);
    Arc::new(move |value: &C::Input| {
        let slot = Weak::upgrade(&slot).ok_or_else(|| TransformError::Detached {
            schema: key.0.to_string(),
        })?;
        let resolved = slot.wait();
        resolved(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::Unmarshal;
    use crate::value::Native;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;

    fn constant(n: i64) -> Transform<Unmarshal> {
        Arc::new(move |_: &Value| Ok(Native::Number(n.into())))
    }

    #[test]
    fn compiles_once_per_key() {
        let cache = CompilationCache::<Unmarshal>::new();
        let key = (SchemaId(0), true);

        let first = cache.get_or_compile(key, || constant(1));
        let second = cache.get_or_compile(key, || constant(2));

        assert_eq!(cache.compilations(), 1);
        assert!(cache.is_resolved(key));
        assert_eq!(first(&json!(null)), second(&json!(null)));
    }

    #[test]
    fn required_flag_is_part_of_key() {
        let cache = CompilationCache::<Unmarshal>::new();
        cache.get_or_compile((SchemaId(3), true), || constant(1));
        cache.get_or_compile((SchemaId(3), false), || constant(2));
        assert_eq!(cache.compilations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reentrant_request_gets_trampoline() {
        let cache = CompilationCache::<Unmarshal>::new();
        let key = (SchemaId(7), true);
        let reentered = AtomicBool::new(false);

        let outer = cache.get_or_compile(key, || {
            // Same key while in progress: must not recurse into compile.
            let inner = cache.get_or_compile(key, || unreachable!("recompiled in-progress key"));
            reentered.store(true, Ordering::SeqCst);
            Arc::new(move |value: &Value| match value {
                Value::Array(items) if !items.is_empty() => inner(&Value::Array(items[1..].to_vec())),
                _ => Ok(Native::Null),
            })
        });

        assert!(reentered.load(Ordering::SeqCst));
        assert_eq!(cache.compilations(), 1);
        assert_eq!(outer(&json!([1, 2, 3])).unwrap(), Native::Null);
    }

    fn countdown(cache: &CompilationCache<Unmarshal>, key: CacheKey) -> Transform<Unmarshal> {
        cache.get_or_compile(key, || {
            let inner = cache.get_or_compile(key, || unreachable!("recompiled in-progress key"));
            Arc::new(move |value: &Value| match value {
                Value::Array(items) if !items.is_empty() => inner(&Value::Array(items[1..].to_vec())),
                _ => Ok(Native::Null),
            })
        })
    }

    #[test]
    fn dropping_cache_frees_recursive_transforms() {
        let cache = CompilationCache::<Unmarshal>::new();
        let transform = countdown(&cache, (SchemaId(4), false));
        let weak = Arc::downgrade(&transform);

        drop(transform);
        assert!(weak.upgrade().is_some());
        drop(cache);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn recursion_after_cache_drop_is_detached() {
        let cache = CompilationCache::<Unmarshal>::new();
        let transform = countdown(&cache, (SchemaId(4), false));
        drop(cache);

        assert_eq!(transform(&json!(null)).unwrap(), Native::Null);
        assert!(matches!(
            transform(&json!([1])),
            Err(TransformError::Detached { .. })
        ));
    }

    #[test]
    fn concurrent_first_use_compiles_once() {
        let cache = Arc::new(CompilationCache::<Unmarshal>::new());
        let key = (SchemaId(1), true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let f = cache.get_or_compile(key, || {
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        constant(42)
                    });
                    f(&json!(null)).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Native::Number(42.into()));
        }
        assert_eq!(cache.compilations(), 1);
    }
}
