// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TF-IDF similarity index over the reference corpus.
//!
//! Built once at startup and shared read-only across requests; lookups
//! never mutate the index. Scoring is cosine similarity over
//! L2-normalized tf-idf vectors with smoothed inverse document
//! frequency, word n-grams, and document-frequency bounds.

use crate::config::SimilarityConfig;
use crate::corpus::{CorpusDocument, DocumentType};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,
    #[error("no terms survived the document-frequency bounds")]
    EmptyVocabulary,
}

/// One indexed document's metadata, carried on matches.
#[derive(Debug, Clone)]
struct IndexedDocument {
    filename: String,
    document_type: DocumentType,
    snippet: String,
}

/// A corpus document matched by a query.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarDocument {
    /// Position in the corpus the index was built from.
    pub index: usize,
    pub filename: String,
    pub document_type: DocumentType,
    pub score: f32,
    pub snippet: String,
}

pub struct TfidfIndex {
    config: SimilarityConfig,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    /// Sparse L2-normalized vectors, sorted by feature index.
    doc_vectors: Vec<Vec<(usize, f32)>>,
    docs: Vec<IndexedDocument>,
}

impl TfidfIndex {
    /// Build an index over a corpus.
    ///
    /// # Arguments
    /// * `corpus` - Normalized reference documents
    /// * `config` - Vocabulary and scoring settings
    ///
    /// # Returns
    /// The index, or an error when the corpus is empty or the
    /// document-frequency bounds leave no vocabulary.
    pub fn build(
        corpus: &[CorpusDocument],
        config: SimilarityConfig,
    ) -> Result<Self, SimilarityError> {
        if corpus.is_empty() {
            return Err(SimilarityError::EmptyCorpus);
        }

        let n_docs = corpus.len();
        let doc_counts: Vec<HashMap<String, usize>> = corpus
            .iter()
            .map(|doc| term_counts(&doc.content, &config))
            .collect();

        // Document and corpus frequencies in one pass.
        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut cf: HashMap<&str, usize> = HashMap::new();
        for counts in &doc_counts {
            for (term, count) in counts {
                *cf.entry(term.as_str()).or_insert(0) += count;
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        // Frequency bounds; on corpora smaller than min_df the lower
        // bound degrades to 1 so tiny corpora still index.
        let max_df_count = (config.max_df * n_docs as f32) as usize;
        let min_df_count = if n_docs < config.min_df {
            1
        } else {
            config.min_df
        };

        let mut candidates: Vec<(&str, usize)> = df
            .iter()
            .filter(|(_, &d)| d >= min_df_count && d <= max_df_count)
            .map(|(&term, _)| (term, cf[term]))
            .collect();
        // Most frequent terms win the vocabulary cap, ties alphabetical.
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        candidates.truncate(config.max_features);

        if candidates.is_empty() {
            return Err(SimilarityError::EmptyVocabulary);
        }

        // Stable feature order regardless of hash iteration.
        let mut selected: Vec<&str> = candidates.iter().map(|(term, _)| *term).collect();
        selected.sort_unstable();
        let vocabulary: HashMap<String, usize> = selected
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();

        let mut idf = vec![0.0f32; vocabulary.len()];
        for (term, &idx) in &vocabulary {
            let d = df[term.as_str()] as f32;
            idf[idx] = ((1.0 + n_docs as f32) / (1.0 + d)).ln() + 1.0;
        }

        let doc_vectors = doc_counts
            .iter()
            .map(|counts| vectorize(counts, &vocabulary, &idf))
            .collect();

        let snippet_chars = config.snippet_chars;
        let docs = corpus
            .iter()
            .map(|doc| IndexedDocument {
                filename: doc.filename.clone(),
                document_type: doc.document_type,
                snippet: doc.content.chars().take(snippet_chars).collect(),
            })
            .collect();

        Ok(Self {
            config,
            vocabulary,
            idf,
            doc_vectors,
            docs,
        })
    }

    /// Find corpus documents related to a query text.
    ///
    /// # Arguments
    /// * `text` - Query text, any length
    /// * `top_k` - Maximum number of matches returned
    ///
    /// # Returns
    /// Matches scoring strictly above the configured threshold, sorted
    /// by score descending with ties broken by corpus order.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<SimilarDocument> {
        let counts = term_counts(text, &self.config);
        let query_vector = vectorize(&counts, &self.vocabulary, &self.idf);
        if query_vector.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<SimilarDocument> = self
            .doc_vectors
            .iter()
            .enumerate()
            .filter_map(|(index, doc_vector)| {
                let score = sparse_dot(&query_vector, doc_vector);
                if score > self.config.score_threshold {
                    let meta = &self.docs[index];
                    Some(SimilarDocument {
                        index,
                        filename: meta.filename.clone(),
                        document_type: meta.document_type,
                        score,
                        snippet: meta.snippet.clone(),
                    })
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        matches.truncate(top_k);
        matches
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Lowercase word tokens of at least two word characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|token| token.chars().count() >= 2)
        .map(|token| token.to_lowercase())
        .collect()
}

/// Term counts over word n-grams in the configured range.
fn term_counts(text: &str, config: &SimilarityConfig) -> HashMap<String, usize> {
    let tokens = tokenize(text);
    let mut counts = HashMap::new();
    for n in config.ngram_min..=config.ngram_max {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

/// Project counts onto the vocabulary, weight by idf, L2-normalize.
/// Unknown terms are dropped; an all-unknown input yields an empty
/// vector.
fn vectorize(
    counts: &HashMap<String, usize>,
    vocabulary: &HashMap<String, usize>,
    idf: &[f32],
) -> Vec<(usize, f32)> {
    let mut vector: Vec<(usize, f32)> = counts
        .iter()
        .filter_map(|(term, &count)| {
            vocabulary
                .get(term)
                .map(|&idx| (idx, count as f32 * idf[idx]))
        })
        .collect();
    vector.sort_unstable_by_key(|(idx, _)| *idx);

    let norm = vector
        .iter()
        .map(|(_, w)| w * w)
        .sum::<f32>()
        .sqrt();
    if norm > 0.0 {
        for (_, w) in &mut vector {
            *w /= norm;
        }
    }
    vector
}

/// Dot product of two index-sorted sparse vectors.
fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
