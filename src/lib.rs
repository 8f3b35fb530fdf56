// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded document question answering.
//!
//! Fetches a remote document under hard size and memory ceilings,
//! extracts and normalizes its text, optionally consults a TF-IDF
//! reference index, and answers a batch of questions concurrently with
//! strict order fidelity, per-question failure isolation, and a FIFO
//! response cache in front of the answering service.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod memory;
pub mod monitoring;
pub mod normalize;
pub mod pipeline;
pub mod postprocess;
pub mod prompt;
pub mod similarity;

// Re-export main types
pub use cache::{CacheSnapshot, Fingerprint, ResponseCache};
pub use config::{
    BatchRejection, CacheConfig, DispatchConfig, ExtractConfig, FetchConfig, MemoryConfig,
    NormalizeConfig, PipelineConfig, PostprocessConfig, PromptConfig, RequestLimits,
    SimilarityConfig,
};
pub use corpus::{load_corpus, CorpusDocument, DocumentType};
pub use dispatch::{
    select_strategy, AnsweringClient, DispatchStrategy, QueryDispatcher, ServiceError,
};
pub use error::PipelineError;
pub use extract::{ExtractError, ExtractedDocument, PageError, PageExtractor, PageOutcome, TextExtractor};
pub use fetch::{BoundedFetcher, FetchedDocument};
pub use memory::{MemoryGovernor, MemoryProbe, MemorySnapshot, SysinfoProbe};
pub use monitoring::{init_tracing, HealthSnapshot, HealthStatus, PipelineStats, RequestStats};
pub use normalize::TextNormalizer;
pub use pipeline::{BatchAnswers, DocumentInfo, DocumentQaPipeline, Phase};
pub use postprocess::AnswerPostprocessor;
pub use prompt::{PromptBuilder, UNANSWERABLE};
pub use similarity::{SimilarDocument, SimilarityError, TfidfIndex};
