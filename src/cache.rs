// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response caching for answered batches.
//!
//! Maps an order-sensitive request fingerprint to the full answer
//! sequence. The store is bounded and evicts strictly in insertion
//! order; reads use `peek` so they never disturb that order, which is
//! what keeps the underlying LRU store behaving as a FIFO. Answer
//! computation always happens outside the lock, so two concurrent
//! misses on the same fingerprint may both compute; the cache promises
//! at-most-effectively-once reuse, not single-flight.

use crate::config::CacheConfig;
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// SHA-256 over the normalized document text and the questions in
/// order, each length-prefixed. Reordering questions changes the
/// fingerprint because answers are positional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(document_text: &str, questions: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((document_text.len() as u64).to_be_bytes());
        hasher.update(document_text.as_bytes());
        for question in questions {
            hasher.update((question.len() as u64).to_be_bytes());
            hasher.update(question.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

struct CacheState {
    entries: LruCache<Fingerprint, Vec<String>>,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
}

pub struct ResponseCache {
    config: CacheConfig,
    state: Arc<RwLock<CacheState>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            state: Arc::new(RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                insertions: 0,
                evictions: 0,
            })),
        }
    }

    /// Look up a cached answer sequence. Reads never change eviction
    /// order.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Vec<String>> {
        let mut state = self.state.write().await;
        if !self.config.enabled {
            state.misses += 1;
            return None;
        }
        let cached = state.entries.peek(fingerprint).cloned();
        match cached {
            Some(answers) => {
                state.hits += 1;
                debug!(%fingerprint, "cache hit");
                Some(answers)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a computed answer sequence. At capacity the oldest insert
    /// is evicted; refreshing an existing fingerprint keeps its
    /// position.
    pub async fn put(&self, fingerprint: Fingerprint, answers: Vec<String>) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.write().await;
        if let Some(slot) = state.entries.peek_mut(&fingerprint) {
            *slot = answers;
            return;
        }
        if let Some((evicted, _)) = state.entries.push(fingerprint, answers) {
            state.evictions += 1;
            debug!(fingerprint = %evicted, "evicted oldest cache entry");
        }
        state.insertions += 1;
    }

    /// Drop every entry. Called by the pipeline under memory pressure.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let dropped = state.entries.len();
        state.entries.clear();
        if dropped > 0 {
            debug!(dropped, "cleared response cache");
        }
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.read().await;
        let lookups = state.hits + state.misses;
        CacheSnapshot {
            entries: state.entries.len(),
            max_entries: self.config.max_entries,
            hits: state.hits,
            misses: state.misses,
            insertions: state.insertions,
            evictions: state.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }
}
