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

use ahash::AHashMap;
use async_trait::async_trait;
use kiln_core::{ContentSource, Locator, LocatorError, RawAsset, SourceError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    PoisonError, RwLock,
};

/// An in-memory source keyed by normalized locator.
///
/// Every successful fetch is counted, which lets tests observe how often the
/// pipeline actually went to the source.
#[derive(Default)]
pub struct MemorySource {
    entries: RwLock<AHashMap<Locator, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under `locator`, replacing any previous content.
    ///
    /// # Errors
    /// Returns a [`LocatorError`] if `locator` cannot be parsed.
    pub fn insert(&self, locator: &str, bytes: impl Into<Vec<u8>>) -> Result<(), LocatorError> {
        let locator = Locator::parse(locator)?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator, bytes.into());
        Ok(())
    }

    /// Removes the content stored under `locator`.
    pub fn remove(&self, locator: &str) -> bool {
        let Ok(locator) = Locator::parse(locator) else {
            return false;
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&locator)
            .is_some()
    }

    /// Number of successful fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, locator: &Locator) -> Result<Option<RawAsset>, SourceError> {
        let bytes = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned();
        Ok(bytes.map(|bytes| {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            RawAsset::new(locator.clone(), bytes)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_uses_normalized_locator() {
        let source = MemorySource::new();
        source.insert("textures/../a.txt", "hello").unwrap();

        let raw = source
            .fetch(&Locator::parse("/a.txt").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.text().unwrap(), "hello");
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_entries_are_not_counted() {
        let source = MemorySource::new();
        let result = source
            .fetch(&Locator::parse("/missing.bin").unwrap())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_remove() {
        let source = MemorySource::new();
        source.insert("/a.bin", vec![1, 2, 3]).unwrap();
        assert_eq!(source.len(), 1);
        assert!(source.remove("a.bin"));
        assert!(source.is_empty());
        assert!(!source.remove("a.bin"));
    }
}
