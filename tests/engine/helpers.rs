// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/engine/helpers.rs - Shared fixtures for the engine test suite

use async_trait::async_trait;
use docqa_engine::extract::{ExtractError, PageOutcome};
use docqa_engine::{
    AnsweringClient, DocumentQaPipeline, PageExtractor, PipelineConfig, ServiceError,
};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one HTTP response on a loopback port, then close.
/// Reads the request head before answering so clients see a clean
/// exchange.
pub async fn serve_once(
    status_line: &'static str,
    headers: Vec<String>,
    body: Vec<u8>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                match socket.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        request.extend_from_slice(&chunk[..n]);
                        if request.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            let mut response = format!("{}\r\n", status_line);
            for header in &headers {
                response.push_str(header);
                response.push_str("\r\n");
            }
            response.push_str("\r\n");
            let mut payload = response.into_bytes();
            payload.extend_from_slice(&body);
            let _ = socket.write_all(&payload).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

/// Standard headers for a well-formed document response.
pub fn pdf_headers(body_len: usize) -> Vec<String> {
    vec![
        "Content-Type: application/pdf".to_string(),
        format!("Content-Length: {}", body_len),
        "Connection: close".to_string(),
    ]
}

/// Serve a well-formed document and return its URL.
pub async fn serve_document(body: Vec<u8>) -> String {
    let addr = serve_once("HTTP/1.1 200 OK", pdf_headers(body.len()), body).await;
    format!("http://{}/policy.pdf", addr)
}

/// Treats the payload as UTF-8 text with form-feed page breaks.
pub struct FormFeedExtractor;

#[async_trait]
impl PageExtractor for FormFeedExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<Vec<PageOutcome>, ExtractError> {
        let text = String::from_utf8_lossy(bytes);
        Ok(text
            .split('\u{0c}')
            .map(|page| Ok(page.to_string()))
            .collect())
    }
}

/// A three-page insurance document exercising the normalizer rewrites.
pub fn policy_document() -> Vec<u8> {
    let pages = [
        "This Health Insurance Policy provides coverage for hospitalization expenses. \
         The grace period for premium payment is thirty days from the due date.",
        "The waiting period for pre existing diseases is thirty six months of continuous \
         coverage. The policy holder must disclose all prior conditions at enrollment.",
        "Claims are settled within thirty days of document submission. The sum insured \
         is Rs. 500000 per policy year. Maternity expenses are covered after twenty four months.",
    ];
    pages.join("\u{0c}").into_bytes()
}

/// Answers by the first matching needle in the prompt; outcomes are
/// scripted per needle.
pub struct ScriptedClient {
    pub rules: Vec<(String, Result<String, ServiceError>)>,
    pub fallback: String,
    pub calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(rules: Vec<(&str, Result<String, ServiceError>)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(needle, outcome)| (needle.to_string(), outcome))
                .collect(),
            fallback: "No scripted answer.".to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnsweringClient for ScriptedClient {
    async fn answer(&self, prompt: &str) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        for (needle, outcome) in &self.rules {
            if prompt.contains(needle.as_str()) {
                return outcome.clone();
            }
        }
        Ok(self.fallback.clone())
    }
}

/// Echoes the question embedded in the prompt after a random short
/// delay, so completion order differs from question order.
pub struct QuestionEchoClient;

#[async_trait]
impl AnsweringClient for QuestionEchoClient {
    async fn answer(&self, prompt: &str) -> Result<String, ServiceError> {
        let delay_ms = { rand::thread_rng().gen_range(0..25u64) };
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        let question = prompt
            .split("QUESTION: ")
            .nth(1)
            .and_then(|rest| rest.split('\n').next())
            .unwrap_or("unknown");
        Ok(format!("Answer to {}", question.trim()))
    }
}

/// Captures every prompt it is asked to answer.
pub struct PromptSpyClient {
    pub prompts: Mutex<Vec<String>>,
    pub reply: String,
}

impl PromptSpyClient {
    pub fn new(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl AnsweringClient for PromptSpyClient {
    async fn answer(&self, prompt: &str) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub fn build_pipeline(
    client: Arc<dyn AnsweringClient>,
    config: PipelineConfig,
) -> DocumentQaPipeline {
    DocumentQaPipeline::new(config, Arc::new(FormFeedExtractor), client).unwrap()
}
