// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt construction for the answering service.

use crate::config::PromptConfig;
use crate::similarity::SimilarDocument;

/// The sentinel the answering service is instructed to return for
/// questions the document cannot answer. Exported so callers and tests
/// share one spelling.
pub const UNANSWERABLE: &str = "Information not available in the document.";

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Build one question's prompt: the windowed document, optional
    /// related reference excerpts, the question, and the instruction
    /// block carrying the unanswerable sentinel.
    pub fn build(
        &self,
        document: &str,
        question: &str,
        related: &[SimilarDocument],
    ) -> String {
        let window: String = document.chars().take(self.config.document_window).collect();

        let mut prompt = String::with_capacity(window.len() + question.len() + 512);
        prompt.push_str(
            "Based on the following document, answer the question accurately and concisely.\n\n",
        );
        prompt.push_str("DOCUMENT:\n");
        prompt.push_str(&window);
        prompt.push_str("\n\n");

        if !related.is_empty() {
            prompt.push_str("RELATED REFERENCE EXCERPTS:\n");
            for doc in related {
                prompt.push_str(&format!(
                    "[{}] {} (score {:.2}):\n{}\n",
                    doc.document_type, doc.filename, doc.score, doc.snippet
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("QUESTION: {}\n\n", question));
        prompt.push_str("INSTRUCTIONS:\n");
        prompt.push_str("- Answer based ONLY on the information in the document\n");
        prompt.push_str(
            "- Be specific and include exact details (numbers, percentages, conditions)\n",
        );
        prompt.push_str("- If the answer has multiple parts, include all parts\n");
        prompt.push_str(&format!(
            "- Keep the answer concise (at most {} sentences)\n",
            self.config.max_answer_sentences
        ));
        prompt.push_str(&format!(
            "- If the information is not in the document, say \"{}\"\n",
            UNANSWERABLE
        ));
        prompt.push_str("\nANSWER:");
        prompt
    }
}
