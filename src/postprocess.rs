// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Answer post-processing.
//!
//! Applied to successful backend answers before they are slotted and
//! cached: strip one leading hedging phrase, capitalize, and shorten
//! over-long answers at a sentence boundary where one exists. Error
//! slots never pass through here, and the unanswerable sentinel is a
//! fixed point of the whole pass.

use crate::config::PostprocessConfig;

/// Hedging openers the answering service tends to produce. At most one
/// is stripped, case-insensitively.
const HEDGING_PREFIXES: &[&str] = &[
    "based on the document, ",
    "based on the provided document, ",
    "according to the document, ",
    "according to the policy, ",
    "the document states that ",
    "as mentioned in the document, ",
    "it appears that ",
    "it seems that ",
];

pub struct AnswerPostprocessor {
    config: PostprocessConfig,
}

impl AnswerPostprocessor {
    pub fn new(config: PostprocessConfig) -> Self {
        Self { config }
    }

    pub fn tidy(&self, raw: &str) -> String {
        let answer = raw.trim();
        let answer = if self.config.strip_hedging {
            strip_hedging(answer)
        } else {
            answer
        };
        let answer = capitalize_first(answer);
        self.shorten(&answer)
    }

    /// Cut answers past `max_chars`, keeping the period of the last
    /// sentence end inside the window when it lies far enough in;
    /// otherwise hard-cut with an ellipsis.
    fn shorten(&self, answer: &str) -> String {
        let max_chars = self.config.max_chars;
        let window_end = match answer.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => byte_idx,
            None => return answer.to_string(),
        };
        let window = &answer[..window_end];
        let min_cut = (max_chars as f32 * self.config.sentence_cut_ratio) as usize;

        if let Some(period_idx) = window.rfind('.') {
            if window[..period_idx].chars().count() >= min_cut {
                return window[..=period_idx].to_string();
            }
        }
        format!("{}...", window.trim_end())
    }
}

fn strip_hedging(answer: &str) -> &str {
    for prefix in HEDGING_PREFIXES {
        if answer.len() >= prefix.len()
            && answer.is_char_boundary(prefix.len())
            && answer[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return answer[prefix.len()..].trim_start();
        }
    }
    answer
}

fn capitalize_first(answer: &str) -> String {
    let mut chars = answer.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            let mut out = String::with_capacity(answer.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        _ => answer.to_string(),
    }
}
