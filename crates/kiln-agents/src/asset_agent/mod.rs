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

//! Acts as the **[A]gent** of the content pipeline.
//!
//! The [`AssetManager`] is the public entry point: it normalizes locators,
//! consults the cache, asks the resolver for a chain, runs it on a fresh
//! execution context and publishes the result. The heavy lifting is done by
//! the stages registered from `kiln-lanes`; this module only orchestrates.
//!
//! - `cache`: the per-key `Pending` / `Resolved` / `Failed` entries and
//!   request coalescing.
//! - `config`: failure policy and locator rewrite rules.
//! - `stats`: load counters.

mod cache;
mod config;
mod manager;
mod stats;

pub use cache::{EntryState, LoadResult, SharedLoad};
pub use config::{AssetManagerConfig, ConfigError, FailurePolicy, RewriteRule};
pub use manager::{AssetManager, AssetManagerBuilder, RewriteHook};
pub use stats::LoadStats;
