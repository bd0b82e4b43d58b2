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

//! Breadth-first search for a chain of stages connecting a source to a
//! requested type.
//!
//! Type tags are the vertices and registered stages the edges. A raw source
//! enters the graph through a virtual node keyed by its extension. Every tag
//! is visited at most once, which bounds the search by the number of distinct
//! tags and keeps it finite when registrations form cycles.

use crate::{registry::TransformRegistry, stage::StageDescriptor};
use ahash::{AHashMap, AHashSet};
use kiln_core::{SourceKind, TypeTag};
use std::{collections::VecDeque, fmt, sync::Arc};

/// An ordered sequence of stages, from the source to the target.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<StageDescriptor>>,
}

impl Chain {
    /// The stages in execution order.
    pub fn stages(&self) -> &[Arc<StageDescriptor>] {
        &self.stages
    }

    /// Iterates over the stages in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StageDescriptor>> {
        self.stages.iter()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// An empty chain means the input already has the requested type.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage labels in execution order.
    pub fn labels(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.label()).collect()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stages.is_empty() {
            return write!(f, "(identity)");
        }
        write!(f, "{}", self.labels().join(" -> "))
    }
}

/// The target type cannot be reached from the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no registered path from {input} to type '{target}'")]
pub struct ChainNotFound {
    /// Where the search started.
    pub input: SourceKind,
    /// The requested type.
    pub target: TypeTag,
}

/// Finds the shortest chain of stages turning `input` into `target`.
///
/// Among stages leaving the same node, the one the registry lists first wins
/// (see [`TransformRegistry::candidates_for`]), so the result only depends on
/// the registry contents.
///
/// # Errors
/// Returns [`ChainNotFound`] if `target` is unreachable.
pub fn find_chain(
    registry: &TransformRegistry,
    input: &SourceKind,
    target: &TypeTag,
) -> Result<Chain, ChainNotFound> {
    if let SourceKind::Typed(tag) = input {
        if tag == target {
            return Ok(Chain::default());
        }
    }

    let mut visited: AHashSet<TypeTag> = AHashSet::new();
    let mut parents: AHashMap<TypeTag, (SourceKind, Arc<StageDescriptor>)> = AHashMap::new();
    let mut queue: VecDeque<SourceKind> = VecDeque::new();

    if let SourceKind::Typed(tag) = input {
        visited.insert(tag.clone());
    }
    queue.push_back(input.clone());

    while let Some(node) = queue.pop_front() {
        for stage in registry.candidates_for(&node) {
            let output = stage.output().clone();
            if !visited.insert(output.clone()) {
                continue;
            }
            parents.insert(output.clone(), (node.clone(), stage));
            if &output == target {
                return Ok(Chain {
                    stages: backtrack(&parents, target),
                });
            }
            queue.push_back(SourceKind::Typed(output));
        }
    }

    Err(ChainNotFound {
        input: input.clone(),
        target: target.clone(),
    })
}

fn backtrack(
    parents: &AHashMap<TypeTag, (SourceKind, Arc<StageDescriptor>)>,
    target: &TypeTag,
) -> Vec<Arc<StageDescriptor>> {
    let mut stages = Vec::new();
    let mut current = target.clone();
    while let Some((previous, stage)) = parents.get(&current) {
        stages.push(stage.clone());
        match previous {
            SourceKind::Typed(tag) => current = tag.clone(),
            SourceKind::Extension(_) => break,
        }
    }
    stages.reverse();
    stages
}
