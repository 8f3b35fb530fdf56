// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Health reporting assembled from the governor, cache, and counters.

use super::stats::RequestStats;
use crate::cache::CacheSnapshot;
use crate::memory::MemorySnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub memory: MemorySnapshot,
    pub cache: CacheSnapshot,
    pub requests: RequestStats,
    pub generated_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Degraded whenever the process is over its memory ceiling or the
    /// governor reports pressure; healthy otherwise.
    pub fn assemble(
        memory: MemorySnapshot,
        under_pressure: bool,
        cache: CacheSnapshot,
        requests: RequestStats,
    ) -> Self {
        let status = if under_pressure || !memory.within_budget {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self {
            status,
            memory,
            cache,
            requests,
            generated_at: Utc::now(),
        }
    }
}
