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

//! # Kiln Core
//!
//! Foundational crate containing the traits, core types, and interface
//! contracts shared by every part of the content pipeline.
//!
//! Nothing in here knows how bytes are fetched or how stages are chained;
//! it only defines the common language used by `kiln-io`, `kiln-lanes`
//! and `kiln-agents`.

#![warn(missing_docs)]

pub mod asset;
pub mod error;
pub mod loader;
pub mod locator;
pub mod options;
pub mod source;

pub use asset::{Asset, AssetHandle, AssetKey, AssetValue, TypeTag};
pub use error::{LoadError, LocatorError, SourceError, SourceKind};
pub use loader::{AssetLoader, LoadRequest, TypedInput};
pub use locator::Locator;
pub use options::LoadOptions;
pub use source::{ContentSource, RawAsset};
