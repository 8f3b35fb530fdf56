// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Operational visibility: request counters, health reporting, and the
//! global tracing subscriber.

pub mod health;
pub mod stats;

pub use health::{HealthSnapshot, HealthStatus};
pub use stats::{timed, PipelineStats, RequestStats};

use std::str::FromStr;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global tracing subscriber (only once). Level comes from
/// `RUST_LOG` when it parses as a plain level, `info` otherwise.
pub fn init_tracing() {
    INIT.call_once(|| {
        let level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|raw| tracing::Level::from_str(raw.trim()).ok())
            .unwrap_or(tracing::Level::INFO);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .try_init();
    });
}
