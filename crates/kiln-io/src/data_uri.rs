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

use async_trait::async_trait;
use base64::Engine;
use kiln_core::{ContentSource, Locator, RawAsset, SourceError};
use percent_encoding::percent_decode_str;

/// Serves inline `data:[<media type>][;base64],<payload>` locators.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriSource;

impl DataUriSource {
    /// Creates the source.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentSource for DataUriSource {
    fn name(&self) -> &str {
        "data-uri"
    }

    async fn fetch(&self, locator: &Locator) -> Result<Option<RawAsset>, SourceError> {
        if !locator.is_data_uri() {
            return Ok(None);
        }
        decode_data_uri(locator).map(Some)
    }
}

/// Decodes the payload of a `data:` locator.
///
/// # Errors
/// Returns [`SourceError::Malformed`] if the locator is not a `data:` URI,
/// has no `,` separator, or carries invalid base64.
pub fn decode_data_uri(locator: &Locator) -> Result<RawAsset, SourceError> {
    let uri = locator.as_str();
    let body = uri
        .strip_prefix("data:")
        .ok_or_else(|| SourceError::Malformed(format!("'{locator}' is not a data URI")))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| SourceError::Malformed("data URI without ',' separator".into()))?;

    let is_base64 = header
        .split(';')
        .any(|param| param.trim().eq_ignore_ascii_case("base64"));
    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| SourceError::Malformed(format!("invalid base64 payload: {e}")))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(RawAsset::new(locator.clone(), bytes).with_content_type(locator.extension()))
}
