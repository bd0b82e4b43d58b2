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

use async_trait::async_trait;
use kiln_core::{ContentSource, Locator, RawAsset, SourceError};
use std::sync::Arc;

/// An ordered list of sources. The first one that recognizes a locator wins.
#[derive(Default, Clone)]
pub struct SourceChain {
    sources: Vec<Arc<dyn ContentSource>>,
}

impl SourceChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source at the lowest priority.
    pub fn push(&mut self, source: Arc<dyn ContentSource>) {
        self.sources.push(source);
    }

    /// Builder form of [`SourceChain::push`].
    #[must_use]
    pub fn with(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.push(source);
        self
    }

    /// Number of sources in the chain.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if the chain has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl ContentSource for SourceChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn fetch(&self, locator: &Locator) -> Result<Option<RawAsset>, SourceError> {
        for source in &self.sources {
            if let Some(raw) = source.fetch(locator).await? {
                log::trace!("'{}' served by {} source", locator, source.name());
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataUriSource, MemorySource};

    struct Failing;

    #[async_trait]
    impl ContentSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _locator: &Locator) -> Result<Option<RawAsset>, SourceError> {
            Err(SourceError::Other("device offline".into()))
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let first = Arc::new(MemorySource::new());
        let second = Arc::new(MemorySource::new());
        first.insert("/a.txt", "first").unwrap();
        second.insert("/a.txt", "second").unwrap();
        second.insert("/b.txt", "only second").unwrap();

        let chain = SourceChain::new().with(first.clone()).with(second.clone());

        let a = chain.fetch(&Locator::parse("/a.txt").unwrap()).await.unwrap();
        assert_eq!(a.unwrap().text().unwrap(), "first");
        let b = chain.fetch(&Locator::parse("/b.txt").unwrap()).await.unwrap();
        assert_eq!(b.unwrap().text().unwrap(), "only second");
        assert_eq!(first.fetch_count(), 1);
        assert_eq!(second.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_errors_stop_the_search() {
        let memory = Arc::new(MemorySource::new());
        memory.insert("/a.txt", "unreachable").unwrap();
        let chain = SourceChain::new().with(Arc::new(Failing)).with(memory);

        let result = chain.fetch(&Locator::parse("/a.txt").unwrap()).await;
        assert!(matches!(result, Err(SourceError::Other(_))));
    }

    #[tokio::test]
    async fn test_unclaimed_locator() {
        let chain = SourceChain::new().with(Arc::new(DataUriSource::new()));
        let result = chain.fetch(&Locator::parse("/a.txt").unwrap()).await.unwrap();
        assert!(result.is_none());
    }
}
