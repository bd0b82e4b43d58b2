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

use super::{Asset, AssetValue};
use crate::error::LoadError;
use std::{ops::Deref, sync::Arc};

/// A thread-safe, reference-counted handle to a loaded asset.
///
/// This acts as a smart pointer, providing shared ownership of an asset's data.
/// Cloning a handle is cheap, as it only increments the reference count
/// and does not duplicate the underlying asset data.
///
/// The asset data is automatically deallocated when the last handle is dropped
/// and the asset manager's cache no longer holds it.
#[derive(Debug)]
pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    /// Creates a new `AssetHandle` that takes ownership of the asset data.
    pub fn new(asset: T) -> Self {
        Self(Arc::new(asset))
    }

    /// Creates a handle from an already shared asset.
    pub fn from_arc(asset: Arc<T>) -> Self {
        Self(asset)
    }

    /// Extracts a typed handle from a cached [`AssetValue`].
    ///
    /// # Errors
    /// Returns [`LoadError::TypeMismatch`] if the value does not hold a `T`.
    pub fn from_value(value: &AssetValue) -> Result<Self, LoadError> {
        value.downcast::<T>().map(Self)
    }

    /// Returns `true` if both handles point to the same asset instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the underlying shared pointer.
    pub fn into_arc(self) -> Arc<T> {
        self.0
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
