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

//! The public-facing API of the Kiln content pipeline.
//!
//! Re-exports the pieces an application needs to register stages and load
//! assets, plus [`content_dir`] for the common "assets live in a directory"
//! setup.

use anyhow::{Context, Result};
use std::path::Path;

pub use kiln_agents::{
    asset_agent::{ConfigError, LoadResult, RewriteHook, RewriteRule},
    AssetManager, AssetManagerBuilder, AssetManagerConfig, EntryState, FailurePolicy, LoadStats,
    SharedLoad,
};
pub use kiln_core as core;
pub use kiln_io as io;
pub use kiln_lanes as lanes;

/// Configuration file names looked up by [`content_dir`], in order.
pub const CONFIG_FILES: &[&str] = &["assets.ron", "assets.json"];

pub mod prelude {
    //! Everything needed to write stages and load assets.
    pub use crate::{content_dir, AssetManager, AssetManagerBuilder, FailurePolicy};
    pub use kiln_core::{
        Asset, AssetHandle, AssetKey, AssetValue, LoadError, LoadOptions, LoadRequest, Locator,
        RawAsset, SourceKind, TypeTag,
    };
    pub use kiln_lanes::{
        builtin::{Json, Text},
        stage_fn, ExecutionContext, InputMatcher, StageDescriptor, StageHandler,
    };
}

/// Starts a manager serving the files below `root`, with the built-in stages
/// registered.
///
/// If `root` contains one of [`CONFIG_FILES`], it is used as the manager's
/// configuration.
pub fn content_dir(root: impl AsRef<Path>) -> Result<AssetManagerBuilder> {
    let root = root.as_ref();
    if !root.is_dir() {
        anyhow::bail!("Content directory {root:?} does not exist");
    }

    let mut config = AssetManagerConfig::default();
    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
    {
        config = AssetManagerConfig::from_file(&path)?;
        log::info!("Using asset configuration {path:?}");
    }

    let builder = AssetManager::builder()
        .config(config)
        .directory(root)
        .builtin_stages()
        .context("Failed to register built-in stages")?;
    log::info!("Serving content from {root:?}");
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_content_dir_reads_config_and_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("v2")).unwrap();
        std::fs::write(dir.path().join("v2/readme.txt"), "current").unwrap();
        std::fs::write(
            dir.path().join("assets.ron"),
            r#"(failure_policy: Evict, rewrites: [(from: "/latest/", to: "/v2/")])"#,
        )
        .unwrap();

        let manager = content_dir(dir.path()).unwrap().build();
        assert_eq!(manager.config().failure_policy, FailurePolicy::Evict);

        let text = manager.load_as::<Text>("/latest/readme.txt").await.unwrap();
        assert_eq!(text.0, "current");
        let relative = manager.load_as::<Text>("latest/readme.txt").await.unwrap();
        assert!(AssetHandle::ptr_eq(&text, &relative));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(content_dir(dir.path().join("nope")).is_err());
    }
}
