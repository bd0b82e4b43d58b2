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

//! Provides the foundational traits and primitive types for Kiln's asset model.
//!
//! The key components are:
//! - The [`Asset`] trait: a marker for types that can be requested by tag.
//! - [`TypeTag`]: the identifier of a logical content type, the vertices of
//!   the transformation graph.
//! - [`AssetValue`]: a type-erased, cheaply cloneable value flowing between
//!   stages and stored in the cache.
//! - [`AssetHandle`]: the strongly typed view handed back to callers.
//! - [`AssetKey`]: the `(locator, target type)` pair identifying a cache slot.

mod handle;
mod key;
mod tag;
mod value;

pub use handle::*;
pub use key::*;
pub use tag::*;
pub use value::*;

/// A marker trait for types that can be requested from the asset manager.
///
/// The supertraits enforce that assets can be shared between the tasks
/// running load chains. `TYPE_NAME` is the [`TypeTag`] under which stages
/// producing this type are registered.
///
/// # Examples
///
/// ```
/// use kiln_core::asset::{Asset, TypeTag};
///
/// struct Texture {
///     width: u32,
/// }
///
/// impl Asset for Texture {
///     const TYPE_NAME: &'static str = "Texture2D";
/// }
///
/// assert_eq!(TypeTag::of::<Texture>(), TypeTag::new("Texture2D"));
/// ```
pub trait Asset: Send + Sync + 'static {
    /// Name of the type tag this asset is produced under.
    const TYPE_NAME: &'static str;
}
