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

//! # Kiln Lanes
//!
//! The data plane of the content pipeline: the stage protocol, the
//! [`TransformRegistry`] stages are installed into, the breadth-first
//! [`find_chain`] resolver, and the [`ExecutionContext`] that runs a chain.

#![warn(missing_docs)]

pub mod builtin;
mod context;
mod registry;
mod resolver;
mod stage;

pub use context::{ChainObserver, ExecutionContext};
pub use registry::{RegistryError, SharedRegistry, TransformRegistry};
pub use resolver::{find_chain, Chain, ChainNotFound};
pub use stage::{stage_fn, FnStage, InputMatcher, StageDescriptor, StageHandler};
