// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Component configuration.
//!
//! Every component gets its own config struct with defaults matching the
//! production ceilings; `PipelineConfig` aggregates them and can pull
//! overrides from `DOCQA_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Bounded Fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Hard ceiling on document size in bytes.
    pub max_bytes: u64,
    /// Expected streaming granularity; used to pre-size the buffer. The
    /// size ceiling is enforced per arriving chunk regardless.
    pub chunk_bytes: usize,
    /// Consult the memory governor after this many streamed bytes.
    pub memory_check_interval: u64,
    /// Whole-request timeout for the HTTP fetch.
    pub request_timeout_secs: u64,
    /// User-Agent header sent with the fetch.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            chunk_bytes: 16 * 1024,
            memory_check_interval: 2 * 1024 * 1024,
            request_timeout_secs: 45,
            user_agent: "Mozilla/5.0 (compatible; DocQA/1.0)".to_string(),
        }
    }
}

/// Page extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Pages beyond this are dropped with a warning.
    pub max_pages: usize,
    /// Governor checks happen once per batch of this many pages.
    pub batch_size: usize,
    /// Pages with fewer trimmed characters than this are skipped.
    pub min_page_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_pages: 600,
            batch_size: 20,
            min_page_chars: 20,
        }
    }
}

/// Text normalizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Ceiling on normalized text length in characters.
    pub max_chars: usize,
    /// A sentence boundary inside the window is honored only when it
    /// lies past this fraction of `max_chars`.
    pub sentence_boundary_ratio: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_chars: 300_000,
            sentence_boundary_ratio: 0.8,
        }
    }
}

/// TF-IDF similarity index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Vocabulary cap; most frequent terms win, ties alphabetical.
    pub max_features: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// Terms in more than this fraction of documents are dropped.
    pub max_df: f32,
    /// Terms in fewer than this many documents are dropped.
    pub min_df: usize,
    /// Matches at or below this cosine score are discarded.
    pub score_threshold: f32,
    pub top_k: usize,
    /// Length of the content snippet carried on each match.
    pub snippet_chars: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_min: 1,
            ngram_max: 3,
            max_df: 0.8,
            min_df: 2,
            score_threshold: 0.1,
            top_k: 3,
            snippet_chars: 400,
        }
    }
}

/// Query dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Batches up to this size run sequentially.
    pub sequential_max: usize,
    /// Batches at or above this size run in contiguous chunks.
    pub chunked_min: usize,
    /// Upper bound on concurrent in-flight questions or chunk workers.
    pub concurrency_limit: usize,
    /// Per-question timeout; an elapsed question becomes a timeout slot.
    pub per_question_timeout_secs: u64,
    /// Optional whole-batch deadline. Workers still running when it
    /// fires are abandoned; finished slots keep their answers.
    pub batch_deadline_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sequential_max: 2,
            chunked_min: 6,
            concurrency_limit: 4,
            per_question_timeout_secs: 30,
            batch_deadline_secs: None,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Strict entry ceiling; the oldest insert is evicted at capacity.
    pub max_entries: usize,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            enabled: true,
        }
    }
}

/// Memory governor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Resident-set ceiling consulted by fetch and extract.
    pub ceiling_mb: u64,
    /// Process share of total memory above which the governor reports
    /// pressure and the pipeline clears the cache.
    pub pressure_percent: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ceiling_mb: 450,
            pressure_percent: 70.0,
        }
    }
}

/// Prompt builder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Document characters included in each prompt.
    pub document_window: usize,
    /// Answer length guidance passed to the answering service.
    pub max_answer_sentences: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            document_window: 50_000,
            max_answer_sentences: 2,
        }
    }
}

/// Answer post-processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessConfig {
    /// Answers longer than this are cut, preferring a sentence end.
    pub max_chars: usize,
    /// A sentence end inside the window is honored only past this
    /// fraction of `max_chars`.
    pub sentence_cut_ratio: f32,
    pub strip_hedging: bool,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            max_chars: 250,
            sentence_cut_ratio: 0.7,
            strip_hedging: true,
        }
    }
}

/// Batch bounds the routing layer enforces before invoking the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLimits {
    pub max_questions: usize,
    pub max_question_chars: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_questions: 30,
            max_question_chars: 2000,
        }
    }
}

/// Why a batch was refused before reaching the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchRejection {
    #[error("a batch carries at most {limit} questions, got {got}")]
    TooManyQuestions { got: usize, limit: usize },
    #[error("question {index} is empty")]
    EmptyQuestion { index: usize },
    #[error("question {index} exceeds {limit} characters")]
    QuestionTooLong { index: usize, limit: usize },
}

impl RequestLimits {
    /// Routing-layer guard. `DocumentQaPipeline::run` assumes its input
    /// already passed this; the request error taxonomy has no
    /// invalid-input kinds. An empty batch is valid.
    pub fn validate_batch(&self, questions: &[String]) -> Result<(), BatchRejection> {
        if questions.len() > self.max_questions {
            return Err(BatchRejection::TooManyQuestions {
                got: questions.len(),
                limit: self.max_questions,
            });
        }
        for (index, question) in questions.iter().enumerate() {
            if question.trim().is_empty() {
                return Err(BatchRejection::EmptyQuestion { index });
            }
            if question.chars().count() > self.max_question_chars {
                return Err(BatchRejection::QuestionTooLong {
                    index,
                    limit: self.max_question_chars,
                });
            }
        }
        Ok(())
    }
}

/// Aggregate configuration for `DocumentQaPipeline`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
    pub normalize: NormalizeConfig,
    pub similarity: SimilarityConfig,
    pub dispatch: DispatchConfig,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub prompt: PromptConfig,
    pub postprocess: PostprocessConfig,
    pub limits: RequestLimits,
}

impl PipelineConfig {
    /// Build a config from defaults with `DOCQA_*` overrides.
    ///
    /// Only operationally tunable knobs are exposed; text-processing
    /// internals stay code-configured.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.fetch.max_bytes =
            env_parse("DOCQA_MAX_DOCUMENT_MB", 50u64) * 1024 * 1024;
        config.fetch.request_timeout_secs =
            env_parse("DOCQA_FETCH_TIMEOUT_SECS", config.fetch.request_timeout_secs);
        config.extract.max_pages = env_parse("DOCQA_MAX_PAGES", config.extract.max_pages);
        config.normalize.max_chars =
            env_parse("DOCQA_MAX_TEXT_CHARS", config.normalize.max_chars);
        config.dispatch.concurrency_limit =
            env_parse("DOCQA_CONCURRENCY_LIMIT", config.dispatch.concurrency_limit);
        config.dispatch.per_question_timeout_secs = env_parse(
            "DOCQA_PER_QUESTION_TIMEOUT_SECS",
            config.dispatch.per_question_timeout_secs,
        );
        if let Ok(secs) = env::var("DOCQA_BATCH_DEADLINE_SECS") {
            config.dispatch.batch_deadline_secs = secs.parse().ok();
        }
        config.cache.max_entries =
            env_parse("DOCQA_CACHE_MAX_ENTRIES", config.cache.max_entries);
        config.cache.enabled = env_parse("DOCQA_CACHE_ENABLED", config.cache.enabled);
        config.memory.ceiling_mb =
            env_parse("DOCQA_MEMORY_CEILING_MB", config.memory.ceiling_mb);
        config.limits.max_questions =
            env_parse("DOCQA_MAX_QUESTIONS", config.limits.max_questions);
        config.limits.max_question_chars =
            env_parse("DOCQA_MAX_QUESTION_CHARS", config.limits.max_question_chars);
        config
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch.max_bytes == 0 {
            return Err("fetch.max_bytes must be positive".to_string());
        }
        if self.fetch.memory_check_interval == 0 {
            return Err("fetch.memory_check_interval must be positive".to_string());
        }
        if self.extract.batch_size == 0 {
            return Err("extract.batch_size must be positive".to_string());
        }
        if self.normalize.max_chars == 0 {
            return Err("normalize.max_chars must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.normalize.sentence_boundary_ratio) {
            return Err("normalize.sentence_boundary_ratio must be within 0..=1".to_string());
        }
        if self.similarity.ngram_min == 0 || self.similarity.ngram_max < self.similarity.ngram_min
        {
            return Err("similarity n-gram range is invalid".to_string());
        }
        if self.dispatch.concurrency_limit == 0 {
            return Err("dispatch.concurrency_limit must be positive".to_string());
        }
        if self.dispatch.chunked_min <= self.dispatch.sequential_max {
            return Err(
                "dispatch.chunked_min must exceed dispatch.sequential_max".to_string(),
            );
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err("cache.max_entries must be positive when enabled".to_string());
        }
        if !(0.0..=1.0).contains(&self.postprocess.sentence_cut_ratio) {
            return Err("postprocess.sentence_cut_ratio must be within 0..=1".to_string());
        }
        if self.limits.max_questions == 0 {
            return Err("limits.max_questions must be positive".to_string());
        }
        Ok(())
    }
}
