// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/engine/test_limits.rs - Size and memory ceilings end to end

use super::helpers::*;
use docqa_engine::{PipelineConfig, PipelineError};
use std::sync::Arc;

#[tokio::test]
async fn test_oversized_declared_length_rejected_before_body() {
    let declared: u64 = 60 * 1024 * 1024;
    // Headers promise 60 MiB; no body is ever written.
    let addr = serve_once(
        "HTTP/1.1 200 OK",
        vec![
            "Content-Type: application/pdf".to_string(),
            format!("Content-Length: {}", declared),
        ],
        Vec::new(),
    )
    .await;
    let url = format!("http://{}/huge.pdf", addr);

    let client = Arc::new(ScriptedClient::new(vec![]));
    let pipeline = build_pipeline(client.clone(), PipelineConfig::default());
    let err = pipeline
        .run(&url, vec!["What is covered?".to_string()])
        .await
        .unwrap_err();

    match err {
        PipelineError::TooLarge {
            declared_bytes,
            limit_bytes,
        } => {
            assert_eq!(declared_bytes, Some(declared));
            assert_eq!(limit_bytes, 50 * 1024 * 1024);
        }
        other => panic!("expected TooLarge, got {:?}", other),
    }
    // The answering service must never have been consulted.
    assert_eq!(client.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_streamed_overflow_rejected_without_declared_length() {
    // No Content-Length header, so the precheck cannot fire; the
    // running total must catch the overflow instead.
    let body = vec![b'x'; 4096];
    let addr = serve_once(
        "HTTP/1.1 200 OK",
        vec![
            "Content-Type: application/pdf".to_string(),
            "Connection: close".to_string(),
        ],
        body,
    )
    .await;
    let url = format!("http://{}/stream.pdf", addr);

    let mut config = PipelineConfig::default();
    config.fetch.max_bytes = 1024;
    let pipeline = build_pipeline(Arc::new(ScriptedClient::new(vec![])), config);
    let err = pipeline
        .run(&url, vec!["What is covered?".to_string()])
        .await
        .unwrap_err();

    match err {
        PipelineError::TooLarge {
            declared_bytes,
            limit_bytes,
        } => {
            assert_eq!(declared_bytes, None);
            assert_eq!(limit_bytes, 1024);
        }
        other => panic!("expected TooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status_is_transport() {
    let addr = serve_once(
        "HTTP/1.1 404 Not Found",
        vec!["Content-Length: 0".to_string()],
        Vec::new(),
    )
    .await;
    let url = format!("http://{}/missing.pdf", addr);

    let pipeline = build_pipeline(
        Arc::new(ScriptedClient::new(vec![])),
        PipelineConfig::default(),
    );
    let err = pipeline
        .run(&url, vec!["What is covered?".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn test_blank_document_has_no_extractable_text() {
    // One page of pure whitespace; the extractor drops it and the
    // pipeline classifies the request.
    let url = serve_document(b"   \n\t   ".to_vec()).await;

    let pipeline = build_pipeline(
        Arc::new(ScriptedClient::new(vec![])),
        PipelineConfig::default(),
    );
    let err = pipeline
        .run(&url, vec!["What is covered?".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_extractable_text");

    let stats = pipeline.stats();
    assert_eq!(stats.requests_failed, 1);
}

#[tokio::test]
async fn test_failed_request_never_returns_partial_answers() {
    let url = serve_document(b"".to_vec()).await;
    let pipeline = build_pipeline(
        Arc::new(ScriptedClient::new(vec![])),
        PipelineConfig::default(),
    );
    let result = pipeline
        .run(&url, vec!["One?".to_string(), "Two?".to_string()])
        .await;
    // All or nothing: a classified error, not a short answer list.
    assert!(result.is_err());
}
