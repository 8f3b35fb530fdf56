// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/engine/test_cache_flow.rs - Response cache behavior end to end

use super::helpers::*;
use docqa_engine::PipelineConfig;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_identical_request_served_from_cache() {
    let client = Arc::new(ScriptedClient::new(vec![(
        "What is the grace period?",
        Ok("The grace period is thirty days.".to_string()),
    )]));
    let pipeline = build_pipeline(client.clone(), PipelineConfig::default());
    let questions = vec!["What is the grace period?".to_string()];

    // The cache keys on document content and questions, not the URL,
    // so serving the same bytes from a fresh port still hits.
    let first_url = serve_document(policy_document()).await;
    let first = pipeline.run(&first_url, questions.clone()).await.unwrap();
    assert!(!first.served_from_cache);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let second_url = serve_document(policy_document()).await;
    let second = pipeline.run(&second_url, questions).await.unwrap();
    assert!(second.served_from_cache);
    assert_eq!(second.answers, first.answers);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let stats = pipeline.stats();
    assert_eq!(stats.requests_completed, 2);
    assert_eq!(stats.cache_served, 1);
}

#[tokio::test]
async fn test_different_questions_do_not_hit() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let pipeline = build_pipeline(client.clone(), PipelineConfig::default());

    let first_url = serve_document(policy_document()).await;
    pipeline
        .run(&first_url, vec!["What is the grace period?".to_string()])
        .await
        .unwrap();
    let second_url = serve_document(policy_document()).await;
    let second = pipeline
        .run(&second_url, vec!["What is the sum insured?".to_string()])
        .await
        .unwrap();

    assert!(!second.served_from_cache);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_question_order_changes_the_fingerprint() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let pipeline = build_pipeline(client.clone(), PipelineConfig::default());
    let a = "What is the grace period?".to_string();
    let b = "What is the sum insured?".to_string();

    let first_url = serve_document(policy_document()).await;
    pipeline
        .run(&first_url, vec![a.clone(), b.clone()])
        .await
        .unwrap();
    let second_url = serve_document(policy_document()).await;
    let second = pipeline.run(&second_url, vec![b, a]).await.unwrap();

    // Answers are positional, so a reordered batch is a different request.
    assert!(!second.served_from_cache);
    assert_eq!(client.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_disabled_cache_always_dispatches() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let mut config = PipelineConfig::default();
    config.cache.enabled = false;
    let pipeline = build_pipeline(client.clone(), config);
    let questions = vec!["What is the grace period?".to_string()];

    let first_url = serve_document(policy_document()).await;
    let first = pipeline.run(&first_url, questions.clone()).await.unwrap();
    let second_url = serve_document(policy_document()).await;
    let second = pipeline.run(&second_url, questions).await.unwrap();

    assert!(!first.served_from_cache);
    assert!(!second.served_from_cache);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fifo_eviction_by_insertion_order() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let mut config = PipelineConfig::default();
    config.cache.max_entries = 1;
    let pipeline = build_pipeline(client.clone(), config);
    let questions = vec!["What changed?".to_string()];

    let doc_a = b"Document alpha carries enough text to be extracted.".to_vec();
    let doc_b = b"Document beta also carries enough text to be extracted.".to_vec();

    // A inserted, then B evicts A, so A dispatches again.
    let url = serve_document(doc_a.clone()).await;
    pipeline.run(&url, questions.clone()).await.unwrap();
    let url = serve_document(doc_b).await;
    pipeline.run(&url, questions.clone()).await.unwrap();
    let url = serve_document(doc_a).await;
    let third = pipeline.run(&url, questions).await.unwrap();

    assert!(!third.served_from_cache);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);

    let health = pipeline.health().await;
    assert_eq!(health.cache.evictions, 2);
    assert_eq!(health.cache.entries, 1);
}
