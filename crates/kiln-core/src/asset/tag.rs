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

use super::Asset;
use std::{fmt, hash::Hash, sync::Arc};

/// Identifier of a logical content type (e.g. `"Model"`, `"Texture2D"`).
///
/// Tags are opaque and totally ordered. The name lives behind an `Arc<str>`,
/// so clones share one allocation and compare by pointer before falling back
/// to the string comparison. Tags built separately from the same name are
/// equal but do not share storage.
#[derive(Clone, PartialOrd, Ord)]
pub struct TypeTag(Arc<str>);

impl TypeTag {
    /// Creates a tag from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the tag an [`Asset`] type is produced under.
    pub fn of<A: Asset>() -> Self {
        Self::new(A::TYPE_NAME)
    }

    /// Returns the tag name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&TypeTag> for TypeTag {
    fn from(tag: &TypeTag) -> Self {
        tag.clone()
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
