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

//! The asset manager: the public entry point of the content pipeline.

use super::{
    cache::{AssetCache, EntryState, LoadResult, Lookup, SharedLoad},
    config::{AssetManagerConfig, FailurePolicy, RewriteRule},
    stats::{LoadStats, StatsCounters},
};
use async_trait::async_trait;
use futures::future::{self, try_join_all, FutureExt};
use kiln_core::{
    Asset, AssetHandle, AssetKey, AssetLoader, AssetValue, ContentSource, LoadError, LoadRequest,
    Locator, RawAsset, SourceKind, TypeTag, TypedInput,
};
use kiln_io::{DataUriSource, DirectorySource, SourceChain};
use kiln_lanes::{
    find_chain, ChainObserver, ExecutionContext, RegistryError, SharedRegistry, StageDescriptor,
    TransformRegistry,
};
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

/// A programmatic locator redirect, applied after the configured rules.
pub type RewriteHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

struct Inner {
    registry: SharedRegistry,
    sources: SourceChain,
    cache: AssetCache,
    config: AssetManagerConfig,
    rewrite: Option<RewriteHook>,
    stats: StatsCounters,
}

impl ChainObserver for Inner {
    fn stage_finished(&self, _stage: &StageDescriptor, _locator: &Locator, _succeeded: bool) {
        StatsCounters::bump(&self.stats.stages_executed);
    }
}

/// Resolves "load this locator as this type" requests into values.
///
/// Requests are coalesced per (locator, type): however many callers ask for
/// the same key, one chain runs and every caller receives its result. Results
/// and failures stay cached (see [`FailurePolicy`]).
///
/// Cloning is cheap; clones share the cache and the registry. Loading
/// requires a Tokio runtime.
#[derive(Clone)]
pub struct AssetManager {
    inner: Arc<Inner>,
}

impl AssetManager {
    /// Starts configuring a manager.
    pub fn builder() -> AssetManagerBuilder {
        AssetManagerBuilder::default()
    }

    /// Registers a stage.
    ///
    /// Stages should be registered before the first load; chains already
    /// running keep the path they resolved.
    pub fn register(
        &self,
        descriptor: StageDescriptor,
    ) -> Result<Arc<StageDescriptor>, RegistryError> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(descriptor)
    }

    /// The registry shared with running chains.
    pub fn registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &AssetManagerConfig {
        &self.inner.config
    }

    /// Loads `locator` as `target`.
    ///
    /// The load starts immediately; the returned future only observes it.
    /// Dropping the future does not stop the chain.
    pub fn load(&self, locator: &str, target: impl Into<TypeTag>) -> SharedLoad {
        self.load_request(LoadRequest::new(locator, target))
    }

    /// Loads `locator` as the asset type `A`.
    pub async fn load_as<A: Asset>(&self, locator: &str) -> Result<AssetHandle<A>, LoadError> {
        let value = self.load(locator, TypeTag::of::<A>()).await?;
        AssetHandle::from_value(&value)
    }

    /// Loads `locator` as `target`, starting the chain from a value the
    /// caller already has instead of fetching.
    ///
    /// The result is cached under (`locator`, `target`) like any other load.
    pub fn load_with_input(
        &self,
        locator: &str,
        input_tag: impl Into<TypeTag>,
        input: AssetValue,
        target: impl Into<TypeTag>,
    ) -> SharedLoad {
        self.load_request(LoadRequest::new(locator, target).with_input(input_tag, input))
    }

    /// Loads several assets concurrently. The first failure fails the batch.
    pub async fn load_all<I, S, T>(&self, requests: I) -> Result<Vec<AssetValue>, LoadError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<TypeTag>,
    {
        let loads: Vec<SharedLoad> = requests
            .into_iter()
            .map(|(locator, target)| self.load(locator.as_ref(), target))
            .collect();
        try_join_all(loads).await
    }

    /// Serves a full request.
    pub fn load_request(&self, request: LoadRequest) -> SharedLoad {
        StatsCounters::bump(&self.inner.stats.requests);

        let (origin, effective) = match self.locate(&request.locator) {
            Ok(located) => located,
            Err(err) => return settled(Err(err)),
        };
        let key = AssetKey::new(effective, request.target.clone());
        if request.ancestry.contains(&key) {
            log::warn!("Circular dependency on {key}");
            return settled(Err(LoadError::CircularDependency { key }));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return settled(Err(LoadError::Aborted {
                locator: key.locator,
                target: key.target,
                reason: "no Tokio runtime to run the chain on".to_string(),
            }));
        }

        let lookup = self.inner.cache.get_or_start(&key, |generation| {
            self.start_chain(key.clone(), generation, origin, request)
        });
        match lookup {
            Lookup::Resolved(value) => {
                StatsCounters::bump(&self.inner.stats.cache_hits);
                log::debug!("Cache hit for {key}");
                settled(Ok(value))
            }
            Lookup::Failed(error) => {
                StatsCounters::bump(&self.inner.stats.cache_hits);
                log::debug!("Cached failure for {key}");
                settled(Err(error))
            }
            Lookup::Pending(load) => {
                StatsCounters::bump(&self.inner.stats.coalesced);
                log::debug!("Joined in-flight load of {key}");
                load
            }
            Lookup::Started(load) => load,
        }
    }

    /// Returns `true` if some chain turns `input` into `target`.
    pub fn can_load(&self, input: &SourceKind, target: impl Into<TypeTag>) -> bool {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        find_chain(&registry, input, &target.into()).is_ok()
    }

    /// The settled result for a key, without starting a load.
    pub fn lookup(&self, locator: &str, target: impl Into<TypeTag>) -> Option<LoadResult> {
        let key = self.key_for(locator, target.into()).ok()?;
        self.inner.cache.settled(&key)
    }

    /// The state of the cache slot for a key, if there is one.
    pub fn entry_state(&self, locator: &str, target: impl Into<TypeTag>) -> Option<EntryState> {
        let key = self.key_for(locator, target.into()).ok()?;
        self.inner.cache.state_of(&key)
    }

    /// Forgets the cache slot for a key so the next request starts over.
    ///
    /// A chain still running for the key completes, but its result is not
    /// published.
    pub fn invalidate(&self, locator: &str, target: impl Into<TypeTag>) -> bool {
        let Ok(key) = self.key_for(locator, target.into()) else {
            return false;
        };
        let removed = self.inner.cache.remove(&key);
        if removed {
            log::debug!("Invalidated {key}");
        }
        removed
    }

    /// Drops every cached failure. Returns how many were dropped.
    pub fn evict_failed(&self) -> usize {
        let evicted = self.inner.cache.remove_failed();
        if evicted > 0 {
            log::debug!("Evicted {evicted} failed entries");
        }
        evicted
    }

    /// Drops every settled entry. Loads in flight are left alone.
    pub fn clear(&self) -> usize {
        let cleared = self.inner.cache.remove_settled();
        log::debug!("Cleared {cleared} cache entries");
        cleared
    }

    /// Number of cache slots, pending ones included.
    pub fn cached(&self) -> usize {
        self.inner.cache.len()
    }

    /// A snapshot of the counters.
    pub fn stats(&self) -> LoadStats {
        self.inner.stats.snapshot()
    }

    /// Reads raw bytes through the configured sources, bypassing the cache.
    pub async fn fetch_raw(&self, locator: &str) -> Result<RawAsset, LoadError> {
        let locator = self.parse(locator)?;
        self.fetch_locator(&locator).await
    }

    fn rewrite(&self, locator: &str) -> String {
        let rewritten = self.inner.config.rewrite(locator);
        match &self.inner.rewrite {
            Some(hook) => hook(&rewritten),
            None => rewritten,
        }
    }

    /// Normalizes `locator`, then applies the rewrites to the normalized
    /// form. Returns both the logical and the effective locator.
    fn locate(&self, locator: &str) -> Result<(Locator, Locator), LoadError> {
        let invalid = |reason| LoadError::InvalidLocator {
            locator: locator.to_string(),
            reason,
        };
        let logical = Locator::parse(locator).map_err(invalid)?;
        let rewritten = self.rewrite(logical.as_str());
        if rewritten == logical.as_str() {
            return Ok((logical.clone(), logical));
        }
        let effective = Locator::parse(rewritten).map_err(invalid)?;
        Ok((logical, effective))
    }

    fn parse(&self, locator: &str) -> Result<Locator, LoadError> {
        self.locate(locator).map(|(_, effective)| effective)
    }

    fn key_for(&self, locator: &str, target: TypeTag) -> Result<AssetKey, LoadError> {
        Ok(AssetKey::new(self.parse(locator)?, target))
    }

    async fn fetch_locator(&self, locator: &Locator) -> Result<RawAsset, LoadError> {
        match self.inner.sources.fetch(locator).await {
            Ok(Some(raw)) => Ok(raw),
            Ok(None) => Err(LoadError::NotFound {
                locator: locator.clone(),
            }),
            Err(err) => Err(LoadError::Fetch {
                locator: locator.clone(),
                cause: Arc::new(err),
            }),
        }
    }

    /// Spawns the chain for `key` and returns the shared handle to it.
    ///
    /// The chain runs on its own task so it completes even if every caller
    /// stops waiting.
    fn start_chain(
        &self,
        key: AssetKey,
        generation: u64,
        origin: Locator,
        request: LoadRequest,
    ) -> SharedLoad {
        StatsCounters::bump(&self.inner.stats.chains_started);
        let manager = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(manager.execute(&task_key, origin, request))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(LoadError::Aborted {
                        locator: task_key.locator.clone(),
                        target: task_key.target.clone(),
                        reason: panic_message(panic.as_ref()),
                    })
                });
            manager.finish(&task_key, generation, &result);
            result
        });

        async move {
            task.await.unwrap_or_else(|err| {
                Err(LoadError::Aborted {
                    locator: key.locator,
                    target: key.target,
                    reason: err.to_string(),
                })
            })
        }
        .boxed()
        .shared()
    }

    async fn execute(&self, key: &AssetKey, origin: Locator, request: LoadRequest) -> LoadResult {
        let (input, value) = match request.input {
            Some(TypedInput { tag, value }) => (SourceKind::Typed(tag), Some(value)),
            None => (
                SourceKind::Extension(key.locator.extension().to_string()),
                None,
            ),
        };

        let chain = {
            let registry = self
                .inner
                .registry
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            find_chain(&registry, &input, &key.target)
        };
        let chain = chain.map_err(|_| LoadError::NoPipeline {
            locator: key.locator.clone(),
            input,
            target: key.target.clone(),
        })?;
        log::debug!("Loading {key} via [{chain}]");

        let value = match value {
            Some(value) => value,
            None => AssetValue::new(self.fetch_locator(&key.locator).await?),
        };

        let loader: Arc<dyn AssetLoader> = Arc::new(self.clone());
        ExecutionContext::new(loader, self.inner.registry.clone(), key.clone(), value)
            .with_origin(origin)
            .with_options(request.options)
            .with_ancestry(request.ancestry)
            .with_observer(self.inner.clone())
            .run(chain)
            .await
    }

    fn finish(&self, key: &AssetKey, generation: u64, result: &LoadResult) {
        match result {
            Ok(_) => log::debug!("Loaded {key}"),
            Err(err) => {
                StatsCounters::bump(&self.inner.stats.chains_failed);
                log::warn!("Failed to load {key}: {err}");
            }
        }
        let policy = self.inner.config.failure_policy;
        let published = self.inner.cache.settle(key, generation, result, policy);
        if !published {
            log::debug!("Discarded result for invalidated entry {key}");
        } else if result.is_err() && policy == FailurePolicy::Evict {
            log::debug!("Evicted failed entry {key}");
        }
    }
}

#[async_trait]
impl AssetLoader for AssetManager {
    async fn load(&self, request: LoadRequest) -> Result<AssetValue, LoadError> {
        self.load_request(request).await
    }

    async fn fetch(&self, locator: &Locator) -> Result<RawAsset, LoadError> {
        self.fetch_raw(locator.as_str()).await
    }
}

fn settled(result: LoadResult) -> SharedLoad {
    future::ready(result).boxed().shared()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("stage panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("stage panicked: {message}")
    } else {
        "stage panicked".to_string()
    }
}

/// Configures and builds an [`AssetManager`].
///
/// `data:` URIs are always served; other sources are tried in the order they
/// were added.
#[derive(Default)]
pub struct AssetManagerBuilder {
    config: AssetManagerConfig,
    sources: Vec<Arc<dyn ContentSource>>,
    registry: TransformRegistry,
    rewrite: Option<RewriteHook>,
}

impl AssetManagerBuilder {
    /// Replaces the configuration.
    pub fn config(mut self, config: AssetManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how failed loads are cached.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Adds a prefix redirect.
    pub fn rewrite_rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.rewrites.push(RewriteRule::new(from, to));
        self
    }

    /// Installs a redirect hook consulted on every top-level and nested load,
    /// after the configured rules.
    ///
    /// The hook sees normalized locators and its output is normalized again.
    pub fn rewrite_locator(
        mut self,
        hook: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.rewrite = Some(Arc::new(hook));
        self
    }

    /// Adds a source.
    pub fn source(self, source: impl ContentSource + 'static) -> Self {
        self.shared_source(Arc::new(source))
    }

    /// Adds a source the caller keeps a handle to.
    pub fn shared_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds a [`DirectorySource`] rooted at `root`.
    pub fn directory(self, root: impl AsRef<Path>) -> Self {
        self.source(DirectorySource::new(root))
    }

    /// Registers a stage.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateStage`] for a duplicate
    /// (matcher, output) pair.
    pub fn stage(mut self, descriptor: StageDescriptor) -> Result<Self, RegistryError> {
        self.registry.register(descriptor)?;
        Ok(self)
    }

    /// Registers the built-in text and JSON stages.
    ///
    /// # Errors
    /// Fails if equivalent stages were registered already.
    pub fn builtin_stages(mut self) -> Result<Self, RegistryError> {
        kiln_lanes::builtin::register_builtin(&mut self.registry)?;
        Ok(self)
    }

    /// Builds the manager.
    pub fn build(self) -> AssetManager {
        let mut sources = SourceChain::new().with(Arc::new(DataUriSource::new()));
        for source in self.sources {
            sources.push(source);
        }
        log::debug!(
            "Asset manager ready: {} stages, {} sources, {:?} failures",
            self.registry.len(),
            sources.len(),
            self.config.failure_policy
        );
        AssetManager {
            inner: Arc::new(Inner {
                registry: Arc::new(RwLock::new(self.registry)),
                sources,
                cache: AssetCache::default(),
                config: self.config,
                rewrite: self.rewrite,
                stats: StatsCounters::default(),
            }),
        }
    }
}
