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

//! The table of registered stages.

use crate::stage::{InputMatcher, StageDescriptor};
use kiln_core::{SourceKind, TypeTag};
use std::sync::{Arc, RwLock};

/// A registry shared between the asset manager and running chains.
pub type SharedRegistry = Arc<RwLock<TransformRegistry>>;

/// An error raised while registering a stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Another stage already declares the same matcher and output.
    #[error("a stage from {matcher} to '{output}' is already registered as '{existing}'")]
    DuplicateStage {
        /// The matcher of the rejected stage.
        matcher: InputMatcher,
        /// The output of the rejected stage.
        output: TypeTag,
        /// Label of the stage that was registered first.
        existing: String,
    },
}

/// An append-only table of [`StageDescriptor`]s.
///
/// Stages are kept in registration order, which is the tie-break the
/// resolver relies on for stages of equal specificity.
#[derive(Debug, Default)]
pub struct TransformRegistry {
    stages: Vec<Arc<StageDescriptor>>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateStage`] if a stage with an identical
    /// (matcher, output) pair is already registered.
    pub fn register(
        &mut self,
        mut descriptor: StageDescriptor,
    ) -> Result<Arc<StageDescriptor>, RegistryError> {
        if let Some(existing) = self.stages.iter().find(|stage| {
            stage.matcher() == descriptor.matcher() && stage.output() == descriptor.output()
        }) {
            log::warn!(
                "Rejected stage '{}': '{}' already maps {} to '{}'",
                descriptor.label(),
                existing.label(),
                descriptor.matcher(),
                descriptor.output()
            );
            return Err(RegistryError::DuplicateStage {
                matcher: descriptor.matcher().clone(),
                output: descriptor.output().clone(),
                existing: existing.label().to_string(),
            });
        }

        descriptor.id = self.stages.len();
        log::debug!(
            "Registered stage #{} '{}': {} -> '{}'",
            descriptor.id,
            descriptor.label(),
            descriptor.matcher(),
            descriptor.output()
        );
        let descriptor = Arc::new(descriptor);
        self.stages.push(descriptor.clone());
        Ok(descriptor)
    }

    /// Every stage accepting `input`, most specific first and in registration
    /// order within the same specificity.
    pub fn candidates_for(&self, input: &SourceKind) -> Vec<Arc<StageDescriptor>> {
        let mut candidates: Vec<_> = self
            .stages
            .iter()
            .filter(|stage| stage.matcher().accepts(input))
            .cloned()
            .collect();
        // Stable: registration order survives within a rank.
        candidates.sort_by_key(|stage| stage.matcher().specificity());
        candidates
    }

    /// All stages in registration order.
    pub fn stages(&self) -> &[Arc<StageDescriptor>] {
        &self.stages
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
