// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lifetime request counters for the pipeline.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared counters, updated lock-free from concurrent request tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cache_served: AtomicU64,
    questions_answered: AtomicU64,
    total_elapsed_ms: AtomicU64,
}

/// Point-in-time view of [`PipelineStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStats {
    pub requests_started: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub cache_served: u64,
    pub questions_answered: u64,
    pub avg_request_ms: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, questions: usize, elapsed: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.questions_answered
            .fetch_add(questions as u64, Ordering::Relaxed);
        self.total_elapsed_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_served(&self) {
        self.cache_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestStats {
        let completed = self.completed.load(Ordering::Relaxed);
        let total_ms = self.total_elapsed_ms.load(Ordering::Relaxed);
        RequestStats {
            requests_started: self.started.load(Ordering::Relaxed),
            requests_completed: completed,
            requests_failed: self.failed.load(Ordering::Relaxed),
            cache_served: self.cache_served.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            avg_request_ms: if completed == 0 {
                0.0
            } else {
                total_ms as f64 / completed as f64
            },
        }
    }
}

/// Drive a future to completion and report how long it took.
pub async fn timed<F, T>(future: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let value = future.await;
    (value, start.elapsed())
}
