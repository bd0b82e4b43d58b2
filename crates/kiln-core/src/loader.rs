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

//! The back-reference stages use to issue nested loads.
//!
//! Stages live in `kiln-lanes` and the orchestrator in `kiln-agents`; the
//! [`AssetLoader`] trait sits here so the execution context can hold a
//! handle to the orchestrator without a cyclic dependency between the two.

use crate::{
    asset::{AssetKey, AssetValue, TypeTag},
    error::LoadError,
    locator::Locator,
    options::LoadOptions,
    source::RawAsset,
};
use async_trait::async_trait;

/// A value supplied by the caller in place of fetched bytes.
#[derive(Debug, Clone)]
pub struct TypedInput {
    /// The tag the value was produced under.
    pub tag: TypeTag,
    /// The value itself.
    pub value: AssetValue,
}

/// Everything the asset manager needs to serve one load.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// The locator as requested, before rewriting and normalization.
    pub locator: String,
    /// The requested type.
    pub target: TypeTag,
    /// Free-form options handed to every stage of the chain.
    pub options: LoadOptions,
    /// Typed starting value; when set the chain starts from `input.tag`
    /// instead of fetched bytes.
    pub input: Option<TypedInput>,
    /// Keys of the loads that (transitively) issued this one.
    pub ancestry: Vec<AssetKey>,
}

impl LoadRequest {
    /// Creates a plain request for `locator` as `target`.
    pub fn new(locator: impl Into<String>, target: impl Into<TypeTag>) -> Self {
        Self {
            locator: locator.into(),
            target: target.into(),
            options: LoadOptions::default(),
            input: None,
            ancestry: Vec::new(),
        }
    }

    /// Attaches options.
    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Starts the chain from a typed value instead of fetched bytes.
    #[must_use]
    pub fn with_input(mut self, tag: impl Into<TypeTag>, value: AssetValue) -> Self {
        self.input = Some(TypedInput {
            tag: tag.into(),
            value,
        });
        self
    }

    /// Records the chain of loads that issued this request.
    #[must_use]
    pub fn with_ancestry(mut self, ancestry: Vec<AssetKey>) -> Self {
        self.ancestry = ancestry;
        self
    }
}

/// The orchestrator as seen from inside a running stage.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Loads (or joins the in-flight load of) a request, with full caching.
    async fn load(&self, request: LoadRequest) -> Result<AssetValue, LoadError>;

    /// Reads raw bytes through the configured sources, bypassing the cache.
    async fn fetch(&self, locator: &Locator) -> Result<RawAsset, LoadError>;
}
