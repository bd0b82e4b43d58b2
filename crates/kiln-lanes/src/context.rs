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

//! The per-request record threaded through a chain, and the chain runner.
//!
//! A fresh [`ExecutionContext`] is built for every stage and moved into its
//! handler, carrying the previous stage's output as the input. Nested loads
//! go back through the [`AssetLoader`] handle and are ordinary cached loads;
//! they never share mutable state with the chain that issued them.

use crate::{
    registry::SharedRegistry,
    resolver::{find_chain, Chain},
    stage::StageDescriptor,
};
use anyhow::{anyhow, Context as _};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use kiln_core::{
    Asset, AssetHandle, AssetKey, AssetLoader, AssetValue, LoadError, LoadOptions, LoadRequest,
    Locator, RawAsset, SourceKind, TypeTag,
};
use std::sync::{Arc, PoisonError};

/// Gets told about every stage a chain runs.
pub trait ChainObserver: Send + Sync {
    /// Called after `stage` returned, whether it succeeded or not.
    fn stage_finished(&self, stage: &StageDescriptor, locator: &Locator, succeeded: bool);
}

/// Everything a stage can see while it runs.
#[derive(Clone)]
pub struct ExecutionContext {
    locator: Locator,
    origin: Locator,
    target: TypeTag,
    stage: Option<Arc<StageDescriptor>>,
    input: AssetValue,
    options: LoadOptions,
    ancestry: Vec<AssetKey>,
    loader: Arc<dyn AssetLoader>,
    registry: SharedRegistry,
    observer: Option<Arc<dyn ChainObserver>>,
}

impl ExecutionContext {
    /// Creates the context of a top-level chain for `key`, starting from
    /// `input`.
    pub fn new(
        loader: Arc<dyn AssetLoader>,
        registry: SharedRegistry,
        key: AssetKey,
        input: AssetValue,
    ) -> Self {
        Self {
            locator: key.locator.clone(),
            origin: key.locator.clone(),
            target: key.target.clone(),
            stage: None,
            input,
            options: LoadOptions::default(),
            ancestry: vec![key],
            loader,
            registry,
            observer: None,
        }
    }

    /// Sets the locator as the caller spelled it, before any rewrite.
    ///
    /// Relative references are merged against it, so nested loads go through
    /// the rewrites exactly once.
    #[must_use]
    pub fn with_origin(mut self, origin: Locator) -> Self {
        self.origin = origin;
        self
    }

    /// Attaches the options of the request.
    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Records the loads that issued this one, outermost first.
    #[must_use]
    pub fn with_ancestry(mut self, parents: Vec<AssetKey>) -> Self {
        let own = self.ancestry.pop();
        self.ancestry = parents;
        self.ancestry.extend(own);
        self
    }

    /// Installs an observer notified after each stage.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ChainObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The locator being loaded, after rewriting.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// The locator as requested, before rewriting.
    pub fn origin(&self) -> &Locator {
        &self.origin
    }

    /// The type requested from the whole chain.
    pub fn target(&self) -> &TypeTag {
        &self.target
    }

    /// The stage currently running, if any.
    pub fn stage(&self) -> Option<&StageDescriptor> {
        self.stage.as_deref()
    }

    /// The value handed to the current stage.
    pub fn input(&self) -> &AssetValue {
        &self.input
    }

    /// The input downcast to `T`.
    ///
    /// # Errors
    /// Fails if the previous stage produced a different Rust type.
    pub fn input_as<T: Send + Sync + 'static>(&self) -> anyhow::Result<Arc<T>> {
        self.input.downcast::<T>().map_err(|err| {
            anyhow!(
                "unexpected input for stage '{}': {err}",
                self.stage().map_or("?", StageDescriptor::label)
            )
        })
    }

    /// The fetched bytes, for stages at the start of a chain.
    ///
    /// # Errors
    /// Fails if the input is not a [`RawAsset`].
    pub fn raw(&self) -> anyhow::Result<Arc<RawAsset>> {
        self.input_as::<RawAsset>()
    }

    /// Free-form options of the request.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Keys of this load and of the loads that issued it, outermost first.
    pub fn ancestry(&self) -> &[AssetKey] {
        &self.ancestry
    }

    /// The orchestrator handle.
    pub fn loader(&self) -> &Arc<dyn AssetLoader> {
        &self.loader
    }

    /// Merges `reference` against the requested locator.
    ///
    /// The result is a logical locator; the orchestrator rewrites it when it
    /// is loaded or fetched.
    ///
    /// # Errors
    /// Returns [`LoadError::InvalidLocator`] if the reference cannot be parsed.
    pub fn resolve(&self, reference: &str) -> Result<Locator, LoadError> {
        self.origin
            .merge(reference)
            .map_err(|reason| LoadError::InvalidLocator {
                locator: reference.to_string(),
                reason,
            })
    }

    /// Loads `reference` (relative to the current locator) as `target`.
    pub async fn load(
        &self,
        reference: &str,
        target: impl Into<TypeTag>,
    ) -> Result<AssetValue, LoadError> {
        self.load_request(LoadRequest::new(reference, target)).await
    }

    /// Loads `reference` as the asset type `A`.
    pub async fn load_as<A: Asset>(&self, reference: &str) -> Result<AssetHandle<A>, LoadError> {
        let value = self.load(reference, TypeTag::of::<A>()).await?;
        AssetHandle::from_value(&value)
    }

    /// Issues a nested load.
    ///
    /// The request locator is merged against the requested one, and the request
    /// inherits this chain's ancestry unless it already carries one.
    pub async fn load_request(&self, mut request: LoadRequest) -> Result<AssetValue, LoadError> {
        request.locator = self.resolve(&request.locator)?.as_str().to_string();
        if request.ancestry.is_empty() {
            request.ancestry = self.ancestry.clone();
        }
        self.loader.load(request).await
    }

    /// Loads several dependencies concurrently. The first failure fails the
    /// whole batch.
    pub async fn load_all<I, S, T>(&self, requests: I) -> Result<Vec<AssetValue>, LoadError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<TypeTag>,
    {
        let requests: Vec<LoadRequest> = requests
            .into_iter()
            .map(|(reference, target)| LoadRequest::new(reference.as_ref(), target))
            .collect();
        try_join_all(requests.into_iter().map(|request| self.load_request(request))).await
    }

    /// Reads a side file relative to the requested locator, bypassing the cache.
    pub async fn fetch(&self, reference: &str) -> Result<RawAsset, LoadError> {
        let locator = self.resolve(reference)?;
        self.loader.fetch(&locator).await
    }

    /// Like [`ExecutionContext::fetch`], decoded as UTF-8.
    pub async fn fetch_text(&self, reference: &str) -> anyhow::Result<String> {
        let RawAsset { locator, bytes, .. } = self.fetch(reference).await?;
        String::from_utf8(bytes).with_context(|| format!("'{locator}' is not valid UTF-8"))
    }

    /// Runs the chain from `from` to `to` on `value` inline, without caching.
    ///
    /// # Errors
    /// Returns [`LoadError::NoPipeline`] if no chain connects the two types,
    /// or the failure of one of its stages.
    pub async fn convert(
        &self,
        value: AssetValue,
        from: impl Into<TypeTag>,
        to: impl Into<TypeTag>,
    ) -> Result<AssetValue, LoadError> {
        let input = SourceKind::Typed(from.into());
        let target = to.into();
        let chain = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            find_chain(&registry, &input, &target)
        };
        let chain = chain.map_err(|_| LoadError::NoPipeline {
            locator: self.locator.clone(),
            input,
            target: target.clone(),
        })?;

        let ctx = ExecutionContext {
            target,
            stage: None,
            input: value,
            ..self.clone()
        };
        ctx.run(chain).await
    }

    /// Executes `chain` stage by stage, starting from this context's input.
    ///
    /// Each stage is awaited before the next one starts. The first failure
    /// aborts the chain; later stages never run.
    pub fn run(self, chain: Chain) -> BoxFuture<'static, Result<AssetValue, LoadError>> {
        async move {
            let mut input = self.input.clone();
            for stage in chain.stages() {
                let ctx = ExecutionContext {
                    stage: Some(stage.clone()),
                    input,
                    ..self.clone()
                };
                log::trace!("Running stage '{}' on '{}'", stage.label(), self.locator);
                let result = stage.handler().handle(ctx).await;
                if let Some(observer) = &self.observer {
                    observer.stage_finished(stage, &self.locator, result.is_ok());
                }
                input = result.map_err(|err| {
                    LoadError::from_stage(&self.locator, &self.target, stage.label(), err)
                })?;
            }
            Ok(input)
        }
        .boxed()
    }
}
