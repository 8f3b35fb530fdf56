// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page text extraction.
//!
//! Real parsing lives behind the `PageExtractor` trait; this module
//! owns the walk over the extractor's output: the page cap, batched
//! memory checks, and the skip rules for failed or near-empty pages.
//! Per-page failures are logged and skipped; only a document-level
//! failure or a memory breach aborts the request.

use crate::config::ExtractConfig;
use crate::error::PipelineError;
use crate::memory::MemoryGovernor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single page produced no text.
#[derive(Debug, Clone, Error)]
#[error("page {index}: {reason}")]
pub struct PageError {
    pub index: usize,
    pub reason: String,
}

/// One page from the extractor: its text, or the reason it failed.
pub type PageOutcome = Result<String, PageError>;

/// Document-level extraction failure (unreadable container).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unreadable document: {0}")]
    Unreadable(String),
}

/// Collaborator seam for the concrete parser. Implementations return
/// one outcome per page, in page order.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<Vec<PageOutcome>, ExtractError>;
}

#[derive(Debug)]
pub struct ExtractedDocument {
    /// Usable page texts, in original page order.
    pub pages: Vec<String>,
    /// Pages the extractor reported before the cap was applied.
    pub pages_seen: usize,
    /// Failed or near-empty pages dropped by the skip rules.
    pub pages_skipped: usize,
}

pub struct TextExtractor {
    extractor: Arc<dyn PageExtractor>,
    config: ExtractConfig,
    governor: Arc<MemoryGovernor>,
}

impl TextExtractor {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        config: ExtractConfig,
        governor: Arc<MemoryGovernor>,
    ) -> Self {
        Self {
            extractor,
            config,
            governor,
        }
    }

    /// Run the collaborator and walk its pages under the cap and the
    /// memory governor.
    pub async fn extract_document(
        &self,
        bytes: &[u8],
    ) -> Result<ExtractedDocument, PipelineError> {
        let mut outcomes = match self.extractor.extract(bytes).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                warn!(error = %err, "document-level extraction failure");
                return Err(PipelineError::NoExtractableText);
            }
        };

        let pages_seen = outcomes.len();
        if outcomes.len() > self.config.max_pages {
            warn!(
                pages = outcomes.len(),
                cap = self.config.max_pages,
                "page cap reached, dropping the tail"
            );
            outcomes.truncate(self.config.max_pages);
        }

        let total = outcomes.len();
        let mut pages = Vec::with_capacity(total);
        let mut pages_skipped = 0usize;

        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(text) => {
                    if text.trim().chars().count() < self.config.min_page_chars {
                        pages_skipped += 1;
                    } else {
                        pages.push(text);
                    }
                }
                Err(page_err) => {
                    warn!(page = page_err.index, reason = %page_err.reason, "skipping failed page");
                    pages_skipped += 1;
                }
            }

            // Governor cadence: once per batch, including the final
            // partial one.
            let end_of_batch =
                (idx + 1) % self.config.batch_size == 0 || idx + 1 == total;
            if end_of_batch && !self.governor.check_ceiling() {
                let rss_mb = self.governor.rss_mb().unwrap_or(0);
                return Err(PipelineError::ResourceExhausted {
                    rss_mb,
                    ceiling_mb: self.governor.ceiling_mb(),
                });
            }
        }

        if pages.is_empty() {
            return Err(PipelineError::NoExtractableText);
        }
        debug!(
            pages = pages.len(),
            pages_seen,
            pages_skipped,
            "extraction complete"
        );
        Ok(ExtractedDocument {
            pages,
            pages_seen,
            pages_skipped,
        })
    }
}
