// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text normalization.
//!
//! Turns the extractor's page texts into one bounded string through a
//! fixed six-step pass: join, whitespace cleanup, domain vocabulary
//! rewrites, glued-token resplitting, structural cleanup, and a
//! sentence-aware length ceiling. The pass is pure and, for inputs
//! below the ceiling, idempotent.

use crate::config::NormalizeConfig;
use regex::Regex;

/// Appended when the ceiling cut lands on a sentence boundary.
pub const SENTENCE_TRUNCATION_MARKER: &str = "\n\n[Document truncated at sentence boundary]";
/// Appended when the ceiling cut is a hard cut at the window edge.
pub const LENGTH_TRUNCATION_MARKER: &str = "\n\n[Document truncated due to length]";

pub struct TextNormalizer {
    config: NormalizeConfig,
    space_runs: Regex,
    rewrites: Vec<(Regex, &'static str)>,
    lower_upper: Regex,
    digit_letter: Regex,
    letter_digit: Regex,
    blank_lines: Regex,
    sentence_break: Regex,
    double_spaces: Regex,
}

impl TextNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        let rewrites = vec![
            (Regex::new(r"(?i)\brs\.").unwrap(), "₹"),
            (Regex::new(r"(?i)\binr\b").unwrap(), "₹"),
            (Regex::new(r"(?i)\brupees?\b").unwrap(), "₹"),
            (Regex::new(r"(?i)\bpolicy\s+holder\b").unwrap(), "policyholder"),
            (Regex::new(r"(?i)\bsum\s+insured\b").unwrap(), "sum insured"),
            (
                Regex::new(r"(?i)\bclaim\s+settlement\b").unwrap(),
                "claim settlement",
            ),
            (Regex::new(r"(?i)\bpre[\s-]+existing\b").unwrap(), "pre-existing"),
        ];
        Self {
            config,
            space_runs: Regex::new(r"[ \t]+").unwrap(),
            rewrites,
            lower_upper: Regex::new(r"([a-z])([A-Z])").unwrap(),
            digit_letter: Regex::new(r"(\d)([A-Za-z])").unwrap(),
            letter_digit: Regex::new(r"([A-Za-z])(\d)").unwrap(),
            blank_lines: Regex::new(r"\n\s*\n\s*\n+").unwrap(),
            sentence_break: Regex::new(r"([.!?])\s*\n\s*([A-Z])").unwrap(),
            double_spaces: Regex::new(r" {2,}").unwrap(),
        }
    }

    /// Normalize extracted page texts into one bounded document string.
    ///
    /// Never fails; empty input yields an empty string and the caller
    /// decides whether that is an error.
    pub fn normalize(&self, pages: &[String]) -> String {
        let joined = pages.join("\n\n");
        self.normalize_text(&joined)
    }

    /// Normalize a single pre-joined text (corpus documents take this
    /// path so indexed text matches query-side text).
    pub fn normalize_text(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let cleaned = self.strip_unprintable(text);
        let cleaned = self.space_runs.replace_all(&cleaned, " ");

        let mut rewritten = cleaned.into_owned();
        for (pattern, replacement) in &self.rewrites {
            rewritten = pattern.replace_all(&rewritten, *replacement).into_owned();
        }

        let resplit = self.lower_upper.replace_all(&rewritten, "$1 $2");
        let resplit = self.digit_letter.replace_all(&resplit, "$1 $2");
        let resplit = self.letter_digit.replace_all(&resplit, "$1 $2");

        let structured = self.blank_lines.replace_all(&resplit, "\n\n");
        let structured = self.sentence_break.replace_all(&structured, "$1\n\n$2");
        let structured = self.double_spaces.replace_all(&structured, " ");

        self.truncate(structured.trim())
    }

    /// Drop control characters; `\n` survives as the only structural
    /// whitespace, `\r` and `\t` fold into it or into spaces.
    fn strip_unprintable(&self, text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }

    /// Apply the length ceiling, preferring a cut at the last `". "`
    /// inside the window when that boundary lies past the configured
    /// fraction of the window.
    fn truncate(&self, text: &str) -> String {
        let max_chars = self.config.max_chars;
        let window_end = match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => byte_idx,
            None => return text.to_string(),
        };
        let window = &text[..window_end];
        let min_boundary =
            (max_chars as f32 * self.config.sentence_boundary_ratio) as usize;

        if let Some(period_idx) = window.rfind(". ") {
            let boundary_chars = window[..period_idx].chars().count();
            if boundary_chars >= min_boundary {
                let mut truncated = window[..=period_idx].to_string();
                truncated.push_str(SENTENCE_TRUNCATION_MARKER);
                return truncated;
            }
        }

        let mut truncated = window.to_string();
        truncated.push_str(LENGTH_TRUNCATION_MARKER);
        truncated
    }
}
