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

//! # Kiln IO
//!
//! Concrete [`ContentSource`](kiln_core::ContentSource) implementations: the
//! external fetch collaborators the asset manager reads raw bytes through.
//!
//! - [`DirectorySource`]: files below a root directory.
//! - [`MemorySource`]: in-memory fixtures, handy for tests and generated data.
//! - [`DataUriSource`]: inline `data:` URIs.
//! - [`SourceChain`]: tries a list of sources in order.

#![warn(missing_docs)]

mod chain;
mod data_uri;
mod directory;
mod memory;

pub use chain::SourceChain;
pub use data_uri::{decode_data_uri, DataUriSource};
pub use directory::DirectorySource;
pub use memory::MemorySource;
