// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-level error taxonomy.
//!
//! Only failures that abort a whole request live here. Per-question
//! failures (`ServiceError` in `dispatch`) are formatted into the answer
//! slot they belong to and never surface as a `PipelineError`.

use thiserror::Error;

/// A request-fatal failure, classified for the routing layer.
///
/// Callers receive either a complete answer sequence or exactly one of
/// these; a request never returns a short answer list.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// DNS, TLS, connect, read, or non-success HTTP status while
    /// fetching the document.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// Document exceeds the configured size ceiling, either from the
    /// declared Content-Length (before any body read) or from the
    /// running total while streaming.
    #[error("document exceeds the size ceiling of {limit_bytes} bytes")]
    TooLarge {
        /// Declared Content-Length when the rejection happened before
        /// the body was read; `None` when the stream outgrew the limit.
        declared_bytes: Option<u64>,
        limit_bytes: u64,
    },

    /// Memory ceiling breached mid-fetch or mid-extract. The pipeline
    /// runs a reclaim pass before surfacing this.
    #[error("memory ceiling breached: {rss_mb} MB resident against a {ceiling_mb} MB ceiling")]
    ResourceExhausted { rss_mb: u64, ceiling_mb: u64 },

    /// Extraction produced nothing usable (unreadable document, every
    /// page skipped, or an empty normalized text).
    #[error("no extractable text in document")]
    NoExtractableText,
}

impl PipelineError {
    /// Stable lowercase tag for logs and routing-layer responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transport { .. } => "transport",
            PipelineError::TooLarge { .. } => "too_large",
            PipelineError::ResourceExhausted { .. } => "resource_exhausted",
            PipelineError::NoExtractableText => "no_extractable_text",
        }
    }

    /// True when the failure came from document size or memory ceilings
    /// rather than the remote end.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            PipelineError::TooLarge { .. } | PipelineError::ResourceExhausted { .. }
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport {
            message: err.to_string(),
        }
    }
}
