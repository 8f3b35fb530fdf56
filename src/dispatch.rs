// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query dispatch.
//!
//! One dispatcher, three execution shapes picked by batch size: small
//! batches run strictly in order, mid-size batches run one task per
//! question under a semaphore, large batches run as contiguous chunks
//! with about one worker per permitted slot. Whatever the shape,
//! answers land in the slot of their original question index, a failed
//! question only poisons its own slot, and an elapsed batch deadline
//! abandons unfinished work while keeping every answer already
//! produced.

use crate::config::DispatchConfig;
use crate::postprocess::AnswerPostprocessor;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-question failure from the answering service. Never fatal to the
/// request; it is formatted into the question's answer slot.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("answering service unavailable: {0}")]
    Unavailable(String),
    #[error("answering service failed: {0}")]
    Backend(String),
    #[error("timed out waiting for the answering service")]
    Timeout,
}

/// Collaborator seam for the concrete answering backend.
#[async_trait]
pub trait AnsweringClient: Send + Sync {
    async fn answer(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// The answer slot text for a failed question.
pub fn failure_answer(err: &ServiceError) -> String {
    format!("Error processing this question: {}", err)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    Sequential,
    BoundedIndividual,
    Chunked { chunk_size: usize },
}

/// Pure strategy switch; `answer_all` applies whatever this returns.
pub fn select_strategy(question_count: usize, config: &DispatchConfig) -> DispatchStrategy {
    if question_count <= config.sequential_max {
        DispatchStrategy::Sequential
    } else if question_count >= config.chunked_min {
        let chunk_size = question_count.div_ceil(config.concurrency_limit).max(1);
        DispatchStrategy::Chunked { chunk_size }
    } else {
        DispatchStrategy::BoundedIndividual
    }
}

pub struct QueryDispatcher {
    client: Arc<dyn AnsweringClient>,
    postprocessor: Arc<AnswerPostprocessor>,
    config: DispatchConfig,
}

impl QueryDispatcher {
    pub fn new(
        client: Arc<dyn AnsweringClient>,
        postprocessor: Arc<AnswerPostprocessor>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            client,
            postprocessor,
            config,
        }
    }

    /// Answer one prompt per slot. The output length always equals the
    /// input length and slot order always matches prompt order.
    pub async fn answer_all(&self, prompts: Vec<String>) -> Vec<String> {
        let n = prompts.len();
        if n == 0 {
            return Vec::new();
        }
        let strategy = select_strategy(n, &self.config);
        debug!(questions = n, ?strategy, "dispatching batch");

        let token = CancellationToken::new();
        let deadline_timer = self.config.batch_deadline_secs.map(|secs| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                warn!(deadline_secs = secs, "batch deadline elapsed, abandoning unfinished work");
                token.cancel();
            })
        });

        let per_question = Duration::from_secs(self.config.per_question_timeout_secs);
        let answers = match strategy {
            DispatchStrategy::Sequential => {
                run_chunk(
                    &self.client,
                    &self.postprocessor,
                    per_question,
                    &token,
                    &prompts,
                )
                .await
            }
            DispatchStrategy::BoundedIndividual => {
                self.run_bounded(prompts, per_question, &token).await
            }
            DispatchStrategy::Chunked { chunk_size } => {
                self.run_chunked(prompts, chunk_size, per_question, &token).await
            }
        };

        if let Some(timer) = deadline_timer {
            timer.abort();
        }
        debug_assert_eq!(answers.len(), n);
        answers
    }

    /// One task per question, bounded by a semaphore.
    async fn run_bounded(
        &self,
        prompts: Vec<String>,
        per_question: Duration,
        token: &CancellationToken,
    ) -> Vec<String> {
        let n = prompts.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut join_set = JoinSet::new();

        for (idx, prompt) in prompts.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let postprocessor = Arc::clone(&self.postprocessor);
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            join_set.spawn(async move {
                let work = async {
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            run_question(
                                client.as_ref(),
                                postprocessor.as_ref(),
                                per_question,
                                &prompt,
                            )
                            .await
                        }
                        Err(_) => failure_answer(&ServiceError::Unavailable(
                            "worker pool closed".to_string(),
                        )),
                    }
                };
                let answer = tokio::select! {
                    answer = work => answer,
                    _ = token.cancelled() => failure_answer(&ServiceError::Timeout),
                };
                (idx, answer)
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; n];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, answer)) => slots[idx] = Some(answer),
                Err(err) => warn!(error = %err, "answer worker failed"),
            }
        }
        fill_missing(slots)
    }

    /// Contiguous chunks, one worker per chunk; each worker answers its
    /// chunk in order and reports the chunk's start index.
    async fn run_chunked(
        &self,
        prompts: Vec<String>,
        chunk_size: usize,
        per_question: Duration,
        token: &CancellationToken,
    ) -> Vec<String> {
        let n = prompts.len();
        let mut join_set = JoinSet::new();
        let mut start = 0usize;
        let mut iter = prompts.into_iter();
        loop {
            let chunk: Vec<String> = iter.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let chunk_start = start;
            start += chunk.len();
            let client = Arc::clone(&self.client);
            let postprocessor = Arc::clone(&self.postprocessor);
            let token = token.clone();
            join_set.spawn(async move {
                let answers =
                    run_chunk(&client, &postprocessor, per_question, &token, &chunk).await;
                (chunk_start, answers)
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; n];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((chunk_start, chunk_answers)) => {
                    for (offset, answer) in chunk_answers.into_iter().enumerate() {
                        slots[chunk_start + offset] = Some(answer);
                    }
                }
                Err(err) => warn!(error = %err, "chunk worker failed"),
            }
        }
        fill_missing(slots)
    }
}

/// Answer a run of prompts strictly in order. Shared by the sequential
/// strategy (whole batch) and chunk workers (their slice).
async fn run_chunk(
    client: &Arc<dyn AnsweringClient>,
    postprocessor: &Arc<AnswerPostprocessor>,
    per_question: Duration,
    token: &CancellationToken,
    prompts: &[String],
) -> Vec<String> {
    let mut answers = Vec::with_capacity(prompts.len());
    for prompt in prompts {
        if token.is_cancelled() {
            answers.push(failure_answer(&ServiceError::Timeout));
            continue;
        }
        let answer = tokio::select! {
            answer = run_question(
                client.as_ref(),
                postprocessor.as_ref(),
                per_question,
                prompt,
            ) => answer,
            _ = token.cancelled() => failure_answer(&ServiceError::Timeout),
        };
        answers.push(answer);
    }
    answers
}

/// One question against the answering service: per-question timeout,
/// failure formatting, post-processing of the successful path.
async fn run_question(
    client: &dyn AnsweringClient,
    postprocessor: &AnswerPostprocessor,
    per_question: Duration,
    prompt: &str,
) -> String {
    match tokio::time::timeout(per_question, client.answer(prompt)).await {
        Ok(Ok(raw)) => postprocessor.tidy(&raw),
        Ok(Err(err)) => {
            warn!(error = %err, "question failed");
            failure_answer(&err)
        }
        Err(_) => {
            warn!(
                timeout_secs = per_question.as_secs(),
                "question timed out"
            );
            failure_answer(&ServiceError::Timeout)
        }
    }
}

fn fill_missing(slots: Vec<Option<String>>) -> Vec<String> {
    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                failure_answer(&ServiceError::Backend("answer worker failed".to_string()))
            })
        })
        .collect()
}
