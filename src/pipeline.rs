// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request orchestration.
//!
//! `DocumentQaPipeline` walks every request through the same linear
//! phases: fetch the document under its ceilings, extract pages through
//! the collaborator, normalize, optionally look up related reference
//! material, then answer the batch through the dispatcher with the
//! response cache in front. Document-side failures abort the request
//! with one classified error; answering failures never do.

use crate::cache::{Fingerprint, ResponseCache};
use crate::config::{PipelineConfig, RequestLimits};
use crate::dispatch::{AnsweringClient, QueryDispatcher};
use crate::error::PipelineError;
use crate::extract::{PageExtractor, TextExtractor};
use crate::fetch::BoundedFetcher;
use crate::memory::MemoryGovernor;
use crate::monitoring::{timed, HealthSnapshot, PipelineStats, RequestStats};
use crate::normalize::TextNormalizer;
use crate::postprocess::AnswerPostprocessor;
use crate::prompt::PromptBuilder;
use crate::similarity::TfidfIndex;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Linear request phases. Fan-out happens only inside `Dispatching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Extracting,
    Normalizing,
    SimilarityLookup,
    Dispatching,
    Caching,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fetching => "fetching",
            Phase::Extracting => "extracting",
            Phase::Normalizing => "normalizing",
            Phase::SimilarityLookup => "similarity_lookup",
            Phase::Dispatching => "dispatching",
            Phase::Caching => "caching",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the document phases saw, reported alongside the answers.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub declared_len: Option<u64>,
    pub fetched_bytes: usize,
    pub pages_seen: usize,
    pub pages_used: usize,
    pub text_chars: usize,
    pub fetched_at: DateTime<Utc>,
}

/// One completed request: answers slot-for-slot with the questions.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAnswers {
    pub request_id: Uuid,
    pub answers: Vec<String>,
    pub served_from_cache: bool,
    pub document: DocumentInfo,
    pub elapsed_ms: u64,
}

pub struct DocumentQaPipeline {
    config: PipelineConfig,
    fetcher: BoundedFetcher,
    extractor: TextExtractor,
    normalizer: TextNormalizer,
    prompt_builder: PromptBuilder,
    dispatcher: QueryDispatcher,
    cache: ResponseCache,
    governor: Arc<MemoryGovernor>,
    stats: Arc<PipelineStats>,
    index: Option<Arc<TfidfIndex>>,
}

impl DocumentQaPipeline {
    /// Wire the pipeline from its two collaborators: the page extractor
    /// and the answering client.
    pub fn new(
        config: PipelineConfig,
        page_extractor: Arc<dyn PageExtractor>,
        client: Arc<dyn AnsweringClient>,
    ) -> Result<Self, PipelineError> {
        let governor = Arc::new(MemoryGovernor::new(config.memory.clone()));
        let fetcher = BoundedFetcher::new(config.fetch.clone(), Arc::clone(&governor))?;
        let extractor = TextExtractor::new(
            page_extractor,
            config.extract.clone(),
            Arc::clone(&governor),
        );
        let normalizer = TextNormalizer::new(config.normalize.clone());
        let prompt_builder = PromptBuilder::new(config.prompt.clone());
        let postprocessor = Arc::new(AnswerPostprocessor::new(config.postprocess.clone()));
        let dispatcher = QueryDispatcher::new(client, postprocessor, config.dispatch.clone());
        let cache = ResponseCache::new(config.cache.clone());
        Ok(Self {
            config,
            fetcher,
            extractor,
            normalizer,
            prompt_builder,
            dispatcher,
            cache,
            governor,
            stats: Arc::new(PipelineStats::new()),
            index: None,
        })
    }

    /// Enable related-document lookups against a prebuilt index.
    pub fn with_index(mut self, index: Arc<TfidfIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Batch bounds the routing layer should enforce before calling
    /// [`run`](Self::run).
    pub fn limits(&self) -> &RequestLimits {
        &self.config.limits
    }

    pub fn stats(&self) -> RequestStats {
        self.stats.snapshot()
    }

    pub async fn health(&self) -> HealthSnapshot {
        HealthSnapshot::assemble(
            self.governor.snapshot(),
            self.governor.under_pressure(),
            self.cache.snapshot().await,
            self.stats.snapshot(),
        )
    }

    /// Answer a batch of questions about the document at `url`.
    ///
    /// Assumes the batch already passed `RequestLimits::validate_batch`.
    /// On success the answer list always matches the question list
    /// slot-for-slot; on failure exactly one classified error comes
    /// back, never a short answer list.
    pub async fn run(
        &self,
        url: &str,
        questions: Vec<String>,
    ) -> Result<BatchAnswers, PipelineError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        self.stats.record_started();
        info!(
            request_id = %request_id,
            url,
            questions = questions.len(),
            "request started"
        );

        match self.run_inner(request_id, url, &questions, started).await {
            Ok(batch) => {
                self.stats
                    .record_completed(batch.answers.len(), started.elapsed());
                if batch.served_from_cache {
                    self.stats.record_cache_served();
                }
                info!(
                    request_id = %request_id,
                    phase = %Phase::Done,
                    elapsed_ms = batch.elapsed_ms,
                    served_from_cache = batch.served_from_cache,
                    "request complete"
                );
                if self.governor.under_pressure() {
                    warn!(
                        request_id = %request_id,
                        "memory pressure after request, reclaiming"
                    );
                    self.governor.force_reclaim();
                    self.cache.clear().await;
                }
                Ok(batch)
            }
            Err(err) => {
                self.stats.record_failed();
                if matches!(err, PipelineError::ResourceExhausted { .. }) {
                    self.governor.force_reclaim();
                    self.cache.clear().await;
                }
                error!(
                    request_id = %request_id,
                    phase = %Phase::Failed,
                    kind = err.kind(),
                    error = %err,
                    "request failed"
                );
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        request_id: Uuid,
        url: &str,
        questions: &[String],
        started: Instant,
    ) -> Result<BatchAnswers, PipelineError> {
        let (fetched, elapsed) = timed(self.fetcher.fetch(url)).await;
        let fetched = fetched?;
        debug!(
            request_id = %request_id,
            phase = %Phase::Fetching,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes = fetched.bytes.len(),
            declared = ?fetched.declared_len,
            "phase complete"
        );

        let (extracted, elapsed) = timed(self.extractor.extract_document(&fetched.bytes)).await;
        let extracted = extracted?;
        debug!(
            request_id = %request_id,
            phase = %Phase::Extracting,
            elapsed_ms = elapsed.as_millis() as u64,
            pages_seen = extracted.pages_seen,
            pages_used = extracted.pages.len(),
            pages_skipped = extracted.pages_skipped,
            "phase complete"
        );

        let normalize_started = Instant::now();
        let text = self.normalizer.normalize(&extracted.pages);
        if text.is_empty() {
            return Err(PipelineError::NoExtractableText);
        }
        let text_chars = text.chars().count();
        debug!(
            request_id = %request_id,
            phase = %Phase::Normalizing,
            elapsed_ms = normalize_started.elapsed().as_millis() as u64,
            chars = text_chars,
            "phase complete"
        );

        let document = DocumentInfo {
            declared_len: fetched.declared_len,
            fetched_bytes: fetched.bytes.len(),
            pages_seen: extracted.pages_seen,
            pages_used: extracted.pages.len(),
            text_chars,
            fetched_at: Utc::now(),
        };

        if questions.is_empty() {
            info!(
                request_id = %request_id,
                "no questions, document phases only"
            );
            return Ok(BatchAnswers {
                request_id,
                answers: Vec::new(),
                served_from_cache: false,
                document,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let related = match &self.index {
            Some(index) => {
                let lookup_started = Instant::now();
                let related = index.query(&text, self.config.similarity.top_k);
                debug!(
                    request_id = %request_id,
                    phase = %Phase::SimilarityLookup,
                    elapsed_ms = lookup_started.elapsed().as_millis() as u64,
                    related = related.len(),
                    "phase complete"
                );
                related
            }
            None => Vec::new(),
        };

        let fingerprint = Fingerprint::compute(&text, questions);
        if let Some(answers) = self.cache.get(&fingerprint).await {
            info!(
                request_id = %request_id,
                fingerprint = %fingerprint,
                "serving cached answers"
            );
            return Ok(BatchAnswers {
                request_id,
                answers,
                served_from_cache: true,
                document,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let prompts: Vec<String> = questions
            .iter()
            .map(|question| self.prompt_builder.build(&text, question, &related))
            .collect();
        let (answers, elapsed) = timed(self.dispatcher.answer_all(prompts)).await;
        debug!(
            request_id = %request_id,
            phase = %Phase::Dispatching,
            elapsed_ms = elapsed.as_millis() as u64,
            answers = answers.len(),
            "phase complete"
        );

        let cache_started = Instant::now();
        self.cache.put(fingerprint, answers.clone()).await;
        debug!(
            request_id = %request_id,
            phase = %Phase::Caching,
            elapsed_ms = cache_started.elapsed().as_millis() as u64,
            "phase complete"
        );

        Ok(BatchAnswers {
            request_id,
            answers,
            served_from_cache: false,
            document,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
