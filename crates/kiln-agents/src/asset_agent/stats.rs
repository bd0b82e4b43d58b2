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

//! Load counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of the asset manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Load requests received, nested ones included.
    pub requests: u64,
    /// Requests answered from a settled entry.
    pub cache_hits: u64,
    /// Requests that joined a load already in flight.
    pub coalesced: u64,
    /// Chains started.
    pub chains_started: u64,
    /// Chains that ended in failure.
    pub chains_failed: u64,
    /// Stage handlers that returned, successfully or not.
    pub stages_executed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) requests: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) chains_started: AtomicU64,
    pub(crate) chains_failed: AtomicU64,
    pub(crate) stages_executed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LoadStats {
        LoadStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            chains_started: self.chains_started.load(Ordering::Relaxed),
            chains_failed: self.chains_failed.load(Ordering::Relaxed),
            stages_executed: self.stages_executed.load(Ordering::Relaxed),
        }
    }
}
