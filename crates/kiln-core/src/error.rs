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

//! Defines the error types of the content pipeline.
//!
//! [`LoadError`] is the terminal state of a failed load future. It is `Clone`
//! because one in-flight load is shared by every caller that requested the
//! same key, and each of them receives the same failure.

use crate::{asset::AssetKey, asset::TypeTag, locator::Locator};
use std::{fmt, sync::Arc};

/// Where a chain starts: raw bytes tagged with their extension, or an
/// already typed intermediate value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Raw bytes, keyed by file extension (`.obj`) or media type (`image/png`).
    Extension(String),
    /// A value already produced under a type tag.
    Typed(TypeTag),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Extension(ext) if ext.is_empty() => write!(f, "source without extension"),
            SourceKind::Extension(ext) => write!(f, "source '{ext}'"),
            SourceKind::Typed(tag) => write!(f, "type '{tag}'"),
        }
    }
}

/// An error raised while parsing or merging a [`Locator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    /// The locator string is blank.
    #[error("locator is empty")]
    Empty,
    /// A URL has a scheme but no host.
    #[error("locator '{0}' has a scheme but no host")]
    MissingHost(String),
}

/// An error reported by a [`ContentSource`](crate::source::ContentSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The underlying read failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The source found the resource but could not decode it.
    #[error("malformed content: {0}")]
    Malformed(String),
    /// Transport specific failure.
    #[error("{0}")]
    Other(String),
}

/// The error carried by a failed load.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The requested locator could not be parsed.
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator {
        /// The locator as requested.
        locator: String,
        /// Why it was rejected.
        reason: LocatorError,
    },
    /// No configured source provides the locator.
    #[error("no source provides '{locator}'")]
    NotFound {
        /// The locator that was looked up.
        locator: Locator,
    },
    /// A source failed while reading the locator.
    #[error("failed to fetch '{locator}': {cause}")]
    Fetch {
        /// The locator being read.
        locator: Locator,
        /// The source failure.
        cause: Arc<SourceError>,
    },
    /// No chain of registered stages connects the source to the target type.
    #[error("no registered pipeline from {input} to type '{target}' (loading '{locator}')")]
    NoPipeline {
        /// The locator being loaded.
        locator: Locator,
        /// The kind of source the search started from.
        input: SourceKind,
        /// The requested type.
        target: TypeTag,
    },
    /// A stage handler failed.
    #[error("stage '{stage}' failed while loading '{locator}' as {target}: {cause}")]
    Stage {
        /// The locator being loaded.
        locator: Locator,
        /// The requested type of the enclosing load.
        target: TypeTag,
        /// Label of the failing stage.
        stage: String,
        /// What the handler reported.
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// A nested load issued by a stage failed.
    #[error("stage '{stage}' failed while loading '{locator}' as {target}: dependency {cause}")]
    Dependency {
        /// The locator being loaded.
        locator: Locator,
        /// The requested type of the enclosing load.
        target: TypeTag,
        /// Label of the stage that issued the nested load.
        stage: String,
        /// The failure of the nested load.
        cause: Box<LoadError>,
    },
    /// A value did not have the expected Rust type.
    #[error("expected a value of type '{expected}', found '{found}'")]
    TypeMismatch {
        /// The requested Rust type.
        expected: &'static str,
        /// The Rust type actually stored.
        found: &'static str,
    },
    /// A nested load requested a key that is still being loaded by one of
    /// its own ancestors.
    #[error("circular dependency: {key} was requested while loading itself")]
    CircularDependency {
        /// The key that closed the cycle.
        key: AssetKey,
    },
    /// The chain stopped without settling (panic or runtime shutdown).
    #[error("load of '{locator}' as {target} aborted: {reason}")]
    Aborted {
        /// The locator being loaded.
        locator: Locator,
        /// The requested type.
        target: TypeTag,
        /// Panic payload or join error.
        reason: String,
    },
}

impl LoadError {
    /// Builds the error for a failed stage.
    ///
    /// A [`LoadError`] surfacing from a handler comes from a nested load and
    /// is reported as [`LoadError::Dependency`]; anything else becomes
    /// [`LoadError::Stage`].
    pub fn from_stage(
        locator: &Locator,
        target: &TypeTag,
        stage: &str,
        error: anyhow::Error,
    ) -> Self {
        match error.downcast::<LoadError>() {
            Ok(nested) => LoadError::Dependency {
                locator: locator.clone(),
                target: target.clone(),
                stage: stage.to_string(),
                cause: Box::new(nested),
            },
            Err(error) => {
                let cause: Box<dyn std::error::Error + Send + Sync> = error.into();
                LoadError::Stage {
                    locator: locator.clone(),
                    target: target.clone(),
                    stage: stage.to_string(),
                    cause: Arc::from(cause),
                }
            }
        }
    }

    /// Returns the innermost error of a dependency chain.
    pub fn root_cause(&self) -> &LoadError {
        match self {
            LoadError::Dependency { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn locator(s: &str) -> Locator {
        Locator::parse(s).unwrap()
    }

    #[test]
    fn test_no_pipeline_names_source_and_target() {
        let err = LoadError::NoPipeline {
            locator: locator("/x.foo"),
            input: SourceKind::Extension(".foo".into()),
            target: TypeTag::new("Widget"),
        };
        let message = err.to_string();
        assert!(message.contains("'.foo'"));
        assert!(message.contains("'Widget'"));
    }

    #[test]
    fn test_stage_error_from_handler_failure() {
        let err = LoadError::from_stage(
            &locator("/a.obj"),
            &TypeTag::new("Model"),
            "obj-parser",
            anyhow!("unexpected token"),
        );
        match &err {
            LoadError::Stage { stage, cause, .. } => {
                assert_eq!(stage, "obj-parser");
                assert_eq!(cause.to_string(), "unexpected token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nested_load_error_becomes_dependency() {
        let nested = LoadError::NotFound {
            locator: locator("/textures/missing.png"),
        };
        let err = LoadError::from_stage(
            &locator("/scene.json"),
            &TypeTag::new("Scene"),
            "scene-builder",
            anyhow::Error::new(nested),
        );
        assert!(matches!(err, LoadError::Dependency { .. }));
        assert!(matches!(err.root_cause(), LoadError::NotFound { .. }));
        assert!(err.to_string().contains("/textures/missing.png"));
    }
}
