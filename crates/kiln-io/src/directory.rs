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
use kiln_core::{ContentSource, Locator, RawAsset, SourceError};
use std::path::{Path, PathBuf};

/// Directory storage device. Plain (scheme-less) locators are read as files
/// below `root`.
///
/// Normalized locators never contain `..`, so reads cannot escape the root.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    /// The directory files are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &Locator) -> Option<PathBuf> {
        if locator.scheme().is_some() {
            return None;
        }
        let relative = locator.path().trim_start_matches('/');
        if relative.is_empty() || relative.ends_with('/') {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ContentSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, locator: &Locator) -> Result<Option<RawAsset>, SourceError> {
        let Some(path) = self.resolve(locator) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                log::trace!("Read {} bytes from {:?}", bytes.len(), path);
                Ok(Some(RawAsset::new(locator.clone(), bytes)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_files_below_root() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/cube.obj"), b"v 0 0 0").unwrap();

        let source = DirectorySource::new(dir.path());
        let locator = Locator::parse("models/cube.obj").unwrap();
        let raw = source.fetch(&locator).await.unwrap().unwrap();
        assert_eq!(raw.text().unwrap(), "v 0 0 0");
        assert_eq!(raw.locator, locator);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_mine() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let locator = Locator::parse("/nothing/here.png").unwrap();
        assert!(source.fetch(&locator).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_urls_are_ignored() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let locator = Locator::parse("http://example.com/a.png").unwrap();
        assert!(source.fetch(&locator).await.unwrap().is_none());
    }
}
