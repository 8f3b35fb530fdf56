// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Memory governor.
//!
//! Advisory watchdog consulted by the fetcher (per streamed interval)
//! and the extractor (per page batch). It answers ceiling and pressure
//! questions and never fails a caller by itself: when the platform
//! cannot report usage the governor degrades to always-within-budget.
//! Reclamation is advisory too; the pipeline owns the memory that can
//! actually be released (the response cache) and clears it when told.

use crate::config::MemoryConfig;
use serde::Serialize;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::{debug, warn};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Source of process and system memory numbers, in bytes. `None`
/// means the platform could not answer.
pub trait MemoryProbe: Send + Sync {
    fn process_rss(&self) -> Option<u64>;
    fn total_memory(&self) -> Option<u64>;
}

/// Production probe backed by `sysinfo`.
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn process_rss(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory());
        system.process(pid).map(|process| process.memory())
    }

    fn total_memory(&self) -> Option<u64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        let total = system.total_memory();
        (total > 0).then_some(total)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub rss_mb: Option<u64>,
    pub total_mb: Option<u64>,
    pub used_percent: Option<f32>,
    pub ceiling_mb: u64,
    pub within_budget: bool,
}

pub struct MemoryGovernor {
    probe: Box<dyn MemoryProbe>,
    config: MemoryConfig,
}

impl MemoryGovernor {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            probe: Box::new(SysinfoProbe::new()),
            config,
        }
    }

    /// Build a governor over an injected probe. Tests use fixed probes
    /// to drive ceiling and pressure paths deterministically.
    pub fn with_probe(probe: Box<dyn MemoryProbe>, config: MemoryConfig) -> Self {
        Self { probe, config }
    }

    pub fn ceiling_mb(&self) -> u64 {
        self.config.ceiling_mb
    }

    /// Current resident set in megabytes, when the platform can say.
    pub fn rss_mb(&self) -> Option<u64> {
        self.probe.process_rss().map(|bytes| bytes / BYTES_PER_MB)
    }

    /// True while the process stays under its resident-set ceiling.
    /// Unknown usage counts as within budget.
    pub fn check_ceiling(&self) -> bool {
        match self.rss_mb() {
            Some(rss_mb) => {
                let within = rss_mb < self.config.ceiling_mb;
                if !within {
                    warn!(
                        rss_mb,
                        ceiling_mb = self.config.ceiling_mb,
                        "memory ceiling breached"
                    );
                }
                within
            }
            None => true,
        }
    }

    /// True when the process holds more than the configured share of
    /// total memory. Unknown numbers never report pressure.
    pub fn under_pressure(&self) -> bool {
        let (Some(rss), Some(total)) = (self.probe.process_rss(), self.probe.total_memory())
        else {
            return false;
        };
        let used_percent = rss as f32 / total as f32 * 100.0;
        used_percent > self.config.pressure_percent
    }

    /// Advisory reclaim: reports the attempt; the pipeline clears the
    /// response cache in response. Never fails.
    pub fn force_reclaim(&self) {
        match self.rss_mb() {
            Some(rss_mb) => warn!(
                rss_mb,
                ceiling_mb = self.config.ceiling_mb,
                "memory reclaim requested"
            ),
            None => debug!("memory reclaim requested with no usage data"),
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let rss = self.probe.process_rss();
        let total = self.probe.total_memory();
        let used_percent = match (rss, total) {
            (Some(rss), Some(total)) if total > 0 => {
                Some(rss as f32 / total as f32 * 100.0)
            }
            _ => None,
        };
        MemorySnapshot {
            rss_mb: rss.map(|bytes| bytes / BYTES_PER_MB),
            total_mb: total.map(|bytes| bytes / BYTES_PER_MB),
            used_percent,
            ceiling_mb: self.config.ceiling_mb,
            within_budget: self.check_ceiling(),
        }
    }
}
