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

use crate::error::LoadError;
use std::{
    any::{type_name, Any},
    fmt,
    sync::Arc,
};

/// A type-erased, reference-counted value produced by a pipeline stage.
///
/// Intermediate results travel between stages as `AssetValue`s, and the
/// final result of a chain is stored in the cache as one. Cloning only bumps
/// a reference count, so every coalesced caller observes the same instance.
#[derive(Clone)]
pub struct AssetValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl AssetValue {
    /// Wraps an owned value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value without copying it.
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    /// The Rust type name of the wrapped value, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the wrapped value as a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns a shared pointer to the wrapped value as a `T`.
    ///
    /// # Errors
    /// Returns [`LoadError::TypeMismatch`] if the value is of another type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, LoadError> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| LoadError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.type_name,
            })
    }

    /// Returns `true` if both values point to the same allocation.
    pub fn ptr_eq(&self, other: &AssetValue) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetValue")
            .field("type_name", &self.type_name)
            .finish()
    }
}
