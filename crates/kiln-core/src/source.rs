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

//! The boundary to the outside world: where raw bytes come from.
//!
//! The pipeline treats fetching as an opaque, asynchronous byte source keyed
//! by [`Locator`]. Concrete sources (directories, in-memory fixtures, `data:`
//! URIs) live in `kiln-io`.

use crate::{error::SourceError, locator::Locator};
use async_trait::async_trait;
use std::str::Utf8Error;

/// Raw content fetched for a locator, before any stage has touched it.
#[derive(Debug, Clone)]
pub struct RawAsset {
    /// Where the bytes came from.
    pub locator: Locator,
    /// The content.
    pub bytes: Vec<u8>,
    /// Media type reported by the source, if it knows one.
    pub content_type: Option<String>,
}

impl RawAsset {
    /// Creates a raw asset without a content type.
    pub fn new(locator: Locator, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            locator,
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Sets the media type reported by the source.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Views the content as UTF-8 text.
    ///
    /// # Errors
    /// Returns the decoding error if the bytes are not valid UTF-8.
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the content is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A provider of raw bytes.
///
/// Sources are consulted in order by the asset manager. Returning `Ok(None)`
/// means "not mine" and lets the next source try; an `Err` is a hard failure
/// for the locator.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Reads the content at `locator`.
    async fn fetch(&self, locator: &Locator) -> Result<Option<RawAsset>, SourceError>;
}
