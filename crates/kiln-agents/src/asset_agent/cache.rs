// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The cache of load results, keyed by [`AssetKey`].
//!
//! Every entry starts out `Pending`, holding the shared in-flight load, and
//! moves exactly once to `Resolved` or `Failed`. Check-then-insert happens
//! under a single lock, so two first-time requests for the same key can never
//! both start a chain.

use super::config::FailurePolicy;
use ahash::AHashMap;
use futures::future::{BoxFuture, Shared};
use kiln_core::{AssetKey, AssetValue, LoadError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The outcome of a load.
pub type LoadResult = Result<AssetValue, LoadError>;

/// A load in progress, awaitable by any number of callers.
///
/// All clones complete with the same value or the same failure.
pub type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// The observable state of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// A chain is running for the key.
    Pending,
    /// The chain succeeded.
    Resolved,
    /// The chain failed and the failure is cached.
    Failed,
}

enum CacheEntry {
    Pending { generation: u64, load: SharedLoad },
    Resolved(AssetValue),
    Failed(LoadError),
}

/// What [`AssetCache::get_or_start`] found.
pub(crate) enum Lookup {
    Resolved(AssetValue),
    Failed(LoadError),
    /// Joined a load someone else started.
    Pending(SharedLoad),
    /// No entry existed; the load was started by this call.
    Started(SharedLoad),
}

#[derive(Default)]
struct CacheState {
    entries: AHashMap<AssetKey, CacheEntry>,
    next_generation: u64,
}

#[derive(Default)]
pub(crate) struct AssetCache {
    state: Mutex<CacheState>,
}

impl AssetCache {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry for `key`, or calls `start` and records its load as
    /// pending, all under one lock.
    ///
    /// `start` receives the generation the entry is tagged with and must not
    /// block.
    pub(crate) fn get_or_start(
        &self,
        key: &AssetKey,
        start: impl FnOnce(u64) -> SharedLoad,
    ) -> Lookup {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get(key) {
            return match entry {
                CacheEntry::Pending { load, .. } => Lookup::Pending(load.clone()),
                CacheEntry::Resolved(value) => Lookup::Resolved(value.clone()),
                CacheEntry::Failed(error) => Lookup::Failed(error.clone()),
            };
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let load = start(generation);
        state.entries.insert(
            key.clone(),
            CacheEntry::Pending {
                generation,
                load: load.clone(),
            },
        );
        Lookup::Started(load)
    }

    /// Publishes the result of the chain started for `generation`.
    ///
    /// Ignored if the entry was invalidated (or replaced) in the meantime.
    /// Returns whether the entry was updated.
    pub(crate) fn settle(
        &self,
        key: &AssetKey,
        generation: u64,
        result: &LoadResult,
        policy: FailurePolicy,
    ) -> bool {
        let mut state = self.lock();
        match state.entries.get(key) {
            Some(CacheEntry::Pending { generation: current, .. }) if *current == generation => {}
            _ => return false,
        }
        match (result, policy) {
            (Ok(value), _) => {
                state
                    .entries
                    .insert(key.clone(), CacheEntry::Resolved(value.clone()));
            }
            (Err(error), FailurePolicy::Sticky) => {
                state
                    .entries
                    .insert(key.clone(), CacheEntry::Failed(error.clone()));
            }
            (Err(_), FailurePolicy::Evict) => {
                state.entries.remove(key);
            }
        }
        true
    }

    /// The settled result for `key`, if any.
    pub(crate) fn settled(&self, key: &AssetKey) -> Option<LoadResult> {
        match self.lock().entries.get(key)? {
            CacheEntry::Resolved(value) => Some(Ok(value.clone())),
            CacheEntry::Failed(error) => Some(Err(error.clone())),
            CacheEntry::Pending { .. } => None,
        }
    }

    pub(crate) fn state_of(&self, key: &AssetKey) -> Option<EntryState> {
        self.lock().entries.get(key).map(|entry| match entry {
            CacheEntry::Pending { .. } => EntryState::Pending,
            CacheEntry::Resolved(_) => EntryState::Resolved,
            CacheEntry::Failed(_) => EntryState::Failed,
        })
    }

    /// Forgets `key` whatever its state. An in-flight chain keeps running but
    /// its result is no longer published.
    pub(crate) fn remove(&self, key: &AssetKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drops every cached failure.
    pub(crate) fn remove_failed(&self) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !matches!(entry, CacheEntry::Failed(_)));
        before - state.entries.len()
    }

    /// Drops every settled entry, leaving in-flight loads alone.
    pub(crate) fn remove_settled(&self) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| matches!(entry, CacheEntry::Pending { .. }));
        before - state.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use kiln_core::Locator;

    fn key(path: &str) -> AssetKey {
        AssetKey::new(Locator::parse(path).unwrap(), "Widget")
    }

    fn pending() -> SharedLoad {
        futures::future::pending().boxed().shared()
    }

    #[test]
    fn test_second_lookup_joins_the_pending_load() {
        let cache = AssetCache::default();
        let mut starts = 0;
        let first = cache.get_or_start(&key("/a.foo"), |_| {
            starts += 1;
            pending()
        });
        let second = cache.get_or_start(&key("a.foo"), |_| {
            starts += 1;
            pending()
        });
        assert!(matches!(first, Lookup::Started(_)));
        assert!(matches!(second, Lookup::Pending(_)));
        assert_eq!(starts, 1);
        assert_eq!(cache.state_of(&key("/a.foo")), Some(EntryState::Pending));
    }

    #[test]
    fn test_settle_transitions_once() {
        let cache = AssetCache::default();
        let mut generation = 0;
        cache.get_or_start(&key("/a.foo"), |g| {
            generation = g;
            pending()
        });

        let ok: LoadResult = Ok(AssetValue::new(1u8));
        assert!(cache.settle(&key("/a.foo"), generation, &ok, FailurePolicy::Sticky));
        assert_eq!(cache.state_of(&key("/a.foo")), Some(EntryState::Resolved));

        let err: LoadResult = Err(LoadError::NotFound {
            locator: Locator::parse("/a.foo").unwrap(),
        });
        assert!(!cache.settle(&key("/a.foo"), generation, &err, FailurePolicy::Sticky));
        assert!(cache.settled(&key("/a.foo")).unwrap().is_ok());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let cache = AssetCache::default();
        let mut old = 0;
        cache.get_or_start(&key("/a.foo"), |g| {
            old = g;
            pending()
        });
        assert!(cache.remove(&key("/a.foo")));
        cache.get_or_start(&key("/a.foo"), |_| pending());

        let ok: LoadResult = Ok(AssetValue::new(1u8));
        assert!(!cache.settle(&key("/a.foo"), old, &ok, FailurePolicy::Sticky));
        assert_eq!(cache.state_of(&key("/a.foo")), Some(EntryState::Pending));
    }

    #[test]
    fn test_failure_policies() {
        let err: LoadResult = Err(LoadError::NotFound {
            locator: Locator::parse("/a.foo").unwrap(),
        });

        let sticky = AssetCache::default();
        let mut generation = 0;
        sticky.get_or_start(&key("/a.foo"), |g| {
            generation = g;
            pending()
        });
        sticky.settle(&key("/a.foo"), generation, &err, FailurePolicy::Sticky);
        assert_eq!(sticky.state_of(&key("/a.foo")), Some(EntryState::Failed));
        assert_eq!(sticky.remove_failed(), 1);
        assert_eq!(sticky.len(), 0);

        let evict = AssetCache::default();
        evict.get_or_start(&key("/a.foo"), |g| {
            generation = g;
            pending()
        });
        evict.settle(&key("/a.foo"), generation, &err, FailurePolicy::Evict);
        assert_eq!(evict.state_of(&key("/a.foo")), None);
    }

    #[test]
    fn test_remove_settled_keeps_pending() {
        let cache = AssetCache::default();
        let mut generation = 0;
        cache.get_or_start(&key("/done.foo"), |g| {
            generation = g;
            pending()
        });
        cache.settle(
            &key("/done.foo"),
            generation,
            &Ok(AssetValue::new(())),
            FailurePolicy::Sticky,
        );
        cache.get_or_start(&key("/running.foo"), |_| pending());

        assert_eq!(cache.remove_settled(), 1);
        assert_eq!(cache.state_of(&key("/running.foo")), Some(EntryState::Pending));
        assert_eq!(cache.state_of(&key("/done.foo")), None);
    }
}
