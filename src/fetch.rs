// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded document fetcher.
//!
//! Streams a remote document into memory under two independent
//! ceilings: a hard byte limit (checked against the declared length
//! before any body read, then against the running total per chunk) and
//! the process memory ceiling (checked through the governor every
//! `memory_check_interval` streamed bytes). The accumulation loop is
//! generic over any byte stream so tests can drive it directly.

use crate::config::FetchConfig;
use crate::error::PipelineError;
use crate::memory::MemoryGovernor;
use bytes::{Bytes, BytesMut};
use futures::{pin_mut, Stream, StreamExt};
use reqwest::header;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct FetchedDocument {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub declared_len: Option<u64>,
}

pub struct BoundedFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    governor: Arc<MemoryGovernor>,
}

impl BoundedFetcher {
    pub fn new(config: FetchConfig, governor: Arc<MemoryGovernor>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(PipelineError::from)?;
        Ok(Self {
            client,
            config,
            governor,
        })
    }

    /// Fetch a document, enforcing both ceilings while streaming.
    pub async fn fetch(&self, url: &str) -> Result<FetchedDocument, PipelineError> {
        let url = Url::parse(url).map_err(|e| PipelineError::Transport {
            message: format!("invalid document url: {}", e),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(PipelineError::Transport {
                    message: format!("unsupported url scheme: {}", other),
                })
            }
        }

        debug!(%url, "fetching document");
        let response = self
            .client
            .get(url)
            .header(
                header::ACCEPT,
                "application/pdf,application/octet-stream,*/*",
            )
            .send()
            .await
            .map_err(PipelineError::from)?
            .error_for_status()
            .map_err(PipelineError::from)?;

        // Declared-length rejection happens before the first body read.
        let declared_len = response.content_length();
        if let Some(len) = declared_len {
            if len > self.config.max_bytes {
                return Err(PipelineError::TooLarge {
                    declared_bytes: Some(len),
                    limit_bytes: self.config.max_bytes,
                });
            }
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let stream = response.bytes_stream();
        let bytes = read_bounded(stream, &self.config, &self.governor, declared_len).await?;
        info!(
            bytes = bytes.len(),
            declared = ?declared_len,
            "document fetched"
        );
        Ok(FetchedDocument {
            bytes,
            content_type,
            declared_len,
        })
    }
}

/// Accumulate a byte stream under the configured ceilings.
///
/// Holds at most `max_bytes` plus one in-flight chunk; the buffer is
/// released inside the failure paths before the error surfaces.
pub async fn read_bounded<S, E>(
    stream: S,
    config: &FetchConfig,
    governor: &MemoryGovernor,
    declared_len: Option<u64>,
) -> Result<Bytes, PipelineError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    pin_mut!(stream);
    let capacity = declared_len
        .unwrap_or(config.chunk_bytes as u64 * 16)
        .min(config.max_bytes) as usize;
    let mut buffer = BytesMut::with_capacity(capacity);
    let mut bytes_since_check: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PipelineError::Transport {
            message: format!("read failed mid-stream: {}", e),
        })?;

        if buffer.len() as u64 + chunk.len() as u64 > config.max_bytes {
            drop(buffer);
            return Err(PipelineError::TooLarge {
                declared_bytes: None,
                limit_bytes: config.max_bytes,
            });
        }
        buffer.extend_from_slice(&chunk);

        bytes_since_check += chunk.len() as u64;
        if bytes_since_check >= config.memory_check_interval {
            bytes_since_check = 0;
            if !governor.check_ceiling() {
                let rss_mb = governor.rss_mb().unwrap_or(0);
                let ceiling_mb = governor.ceiling_mb();
                drop(buffer);
                return Err(PipelineError::ResourceExhausted { rss_mb, ceiling_mb });
            }
        }
    }
    Ok(buffer.freeze())
}
