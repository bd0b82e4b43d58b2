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

use super::TypeTag;
use crate::locator::Locator;
use std::fmt;

/// Identifies one cache slot: a normalized locator requested as a target type.
///
/// Two requests with the same key observe the same resolved value or the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    /// The normalized location of the source.
    pub locator: Locator,
    /// The type the source is requested as.
    pub target: TypeTag,
}

impl AssetKey {
    /// Creates a new key.
    pub fn new(locator: Locator, target: impl Into<TypeTag>) -> Self {
        Self {
            locator,
            target: target.into(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' as {}", self.locator, self.target)
    }
}
