// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reference corpus loading.
//!
//! The similarity index is built from a local corpus of reference
//! documents stored as a JSON array. Each record carries a filename,
//! raw content, and optionally a document type; untyped records are
//! classified by keyword. Content is normalized on load so indexed
//! text matches query-side text.

use crate::normalize::TextNormalizer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// How many leading characters of content participate in keyword
/// classification.
const CLASSIFY_SAMPLE_CHARS: usize = 1000;

/// Closed set of recognized document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    InsurancePolicy,
    HealthInsurance,
    LifeInsurance,
    GeneralInsurance,
    /// Fallback when no keyword matches.
    InsuranceDocument,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::InsurancePolicy => "insurance_policy",
            DocumentType::HealthInsurance => "health_insurance",
            DocumentType::LifeInsurance => "life_insurance",
            DocumentType::GeneralInsurance => "general_insurance",
            DocumentType::InsuranceDocument => "insurance_document",
        }
    }

    /// Classify by filename first, then a leading content sample.
    /// Keyword order is fixed; the first match wins.
    pub fn classify(filename: &str, content: &str) -> Self {
        let filename = filename.to_lowercase();
        let sample: String = content
            .chars()
            .take(CLASSIFY_SAMPLE_CHARS)
            .collect::<String>()
            .to_lowercase();
        let matches = |keyword: &str| filename.contains(keyword) || sample.contains(keyword);

        if matches("policy") {
            DocumentType::InsurancePolicy
        } else if matches("health") {
            DocumentType::HealthInsurance
        } else if matches("life") {
            DocumentType::LifeInsurance
        } else if matches("general") {
            DocumentType::GeneralInsurance
        } else {
            DocumentType::InsuranceDocument
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reference document, normalized and typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub filename: String,
    pub content: String,
    pub document_type: DocumentType,
}

/// On-disk record; `document_type` is optional and filled by
/// classification when absent.
#[derive(Debug, Deserialize)]
struct CorpusRecord {
    filename: String,
    content: String,
    #[serde(default)]
    document_type: Option<DocumentType>,
}

/// Load a JSON corpus file, classifying and normalizing each record.
///
/// Records whose content normalizes to nothing are skipped with a
/// warning; they would contribute nothing to the index.
pub fn load_corpus(path: &Path, normalizer: &TextNormalizer) -> Result<Vec<CorpusDocument>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus file {}", path.display()))?;
    let records: Vec<CorpusRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse corpus file {}", path.display()))?;

    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let document_type = record
            .document_type
            .unwrap_or_else(|| DocumentType::classify(&record.filename, &record.content));
        let content = normalizer.normalize_text(&record.content);
        if content.is_empty() {
            warn!(filename = %record.filename, "skipping corpus record with no usable text");
            continue;
        }
        documents.push(CorpusDocument {
            filename: record.filename,
            content,
            document_type,
        });
    }

    info!(
        path = %path.display(),
        documents = documents.len(),
        "loaded reference corpus"
    );
    Ok(documents)
}
