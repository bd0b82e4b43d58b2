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

//! Declarative configuration of an [`AssetManager`](super::AssetManager).
//!
//! ```ron
//! (
//!     failure_policy: Evict,
//!     rewrites: [
//!         (from: "/assets/", to: "/fixtures/"),
//!     ],
//! )
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What happens to a cache entry whose chain failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// The failure is cached and returned to later requests until the entry
    /// is invalidated or `evict_failed` is called.
    #[default]
    Sticky,
    /// The entry is dropped as soon as the chain fails; the next request
    /// starts a new chain.
    Evict,
}

/// Redirects locators starting with `from` to start with `to` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    /// The prefix to replace.
    pub from: String,
    /// Its replacement.
    pub to: String,
}

impl RewriteRule {
    /// Creates a rule.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The rewritten locator, or `None` if the rule does not apply.
    pub fn apply(&self, locator: &str) -> Option<String> {
        locator
            .strip_prefix(&self.from)
            .map(|rest| format!("{}{rest}", self.to))
    }
}

/// An error raised while parsing a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The text is not a valid configuration in the given format.
    #[error("invalid {format} configuration: {message}")]
    InvalidFormat {
        /// `RON` or `JSON`.
        format: &'static str,
        /// The parser's message.
        message: String,
    },
}

/// Settings of an asset manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// How failed loads are cached.
    pub failure_policy: FailurePolicy,
    /// Prefix redirects; the first matching rule wins.
    pub rewrites: Vec<RewriteRule>,
}

impl AssetManagerConfig {
    /// Parses a RON configuration.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|e| ConfigError::InvalidFormat {
            format: "RON",
            message: e.to_string(),
        })
    }

    /// Parses a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidFormat {
            format: "JSON",
            message: e.to_string(),
        })
    }

    /// Reads a configuration file, picking the format from its extension
    /// (`.json` is JSON, anything else RON).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read asset configuration {path:?}"))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&text)
        } else {
            Self::from_ron(&text)
        }
        .with_context(|| format!("Failed to parse asset configuration {path:?}"))?;
        Ok(config)
    }

    /// Applies the first matching rewrite rule to `locator`.
    pub fn rewrite(&self, locator: &str) -> String {
        self.rewrites
            .iter()
            .find_map(|rule| rule.apply(locator))
            .unwrap_or_else(|| locator.to_string())
    }
}
