//! Query and answer guardrails.
//!
//! Screens incoming questions before they reach retrieval and sanity-checks
//! generated answers before they reach the user. All patterns are compiled
//! once at startup.

use regex::Regex;
use std::collections::HashSet;

use crate::models::RetrievedChunk;

const HARMFUL_PATTERNS: &[&str] = &[
    r"\b(hack|crack|break|bypass|exploit)\b",
    r"\b(illegal|unlawful|criminal)\b",
    r"\b(violence|violent|harm|hurt|kill)\b",
    r"\b(drug|weapon|bomb|terrorist)\b",
    r"\b(porn|sexual|explicit)\b",
];

const OFF_TOPIC_PATTERNS: &[&str] = &[
    r"\bweather\b",
    r"\bstock price\b",
    r"\bnews today\b",
    r"\bcurrent events\b",
    r"\bsports score\b",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being",
];

const QUESTION_WORDS: &[&str] = &["what", "how", "when", "where", "why", "who"];

/// Outcome of validating a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid,
    Rejected { reason: String },
}

pub struct Guardrails {
    harmful: Vec<Regex>,
    off_topic: Vec<Regex>,
    stop_words: HashSet<&'static str>,
    max_query_length: usize,
}

impl Guardrails {
    pub fn new(max_query_length: usize) -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("guardrail pattern is valid"))
                .collect()
        };
        Self {
            harmful: compile(HARMFUL_PATTERNS),
            off_topic: compile(OFF_TOPIC_PATTERNS),
            stop_words: STOP_WORDS.iter().copied().collect(),
            max_query_length,
        }
    }

    /// Validate a query against length and content rules.
    pub fn validate_query(&self, query: &str) -> Verdict {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Verdict::Rejected {
                reason: "Query cannot be empty".to_string(),
            };
        }
        if trimmed.len() < 3 {
            return Verdict::Rejected {
                reason: "Query too short. Please provide a more detailed question.".to_string(),
            };
        }
        if query.len() > self.max_query_length {
            return Verdict::Rejected {
                reason: format!(
                    "Query too long. Please keep questions under {} characters.",
                    self.max_query_length
                ),
            };
        }

        let lower = query.to_lowercase();
        for pattern in &self.harmful {
            if pattern.is_match(&lower) {
                tracing::warn!("Blocked harmful query pattern: {}", pattern.as_str());
                return Verdict::Rejected {
                    reason: "Query contains inappropriate content. Please ask something else."
                        .to_string(),
                };
            }
        }
        for pattern in &self.off_topic {
            if pattern.is_match(&lower) {
                return Verdict::Rejected {
                    reason: "I can only answer questions about the uploaded documents. Please ask about the document content."
                        .to_string(),
                };
            }
        }

        Verdict::Valid
    }

    /// Rewrite a query for better retrieval: lowercase, strip punctuation,
    /// and drop stop words while preserving question structure. Never
    /// shrinks the query below 30% of its original length.
    pub fn optimize_query(&self, query: &str) -> String {
        let mut clean = String::with_capacity(query.len());
        for c in query.trim().to_lowercase().chars() {
            if c.is_alphanumeric() || c.is_whitespace() || c == '?' {
                clean.push(c);
            } else {
                clean.push(' ');
            }
        }

        let words: Vec<&str> = clean.split_whitespace().collect();
        let is_question = words.iter().any(|w| QUESTION_WORDS.contains(w));

        let optimized: Vec<&str> = if is_question {
            // Keep question words and everything substantive
            words.into_iter().filter(|w| w.len() > 1).collect()
        } else {
            words
                .into_iter()
                .filter(|w| !self.stop_words.contains(w) && w.len() > 2)
                .collect()
        };

        let optimized = optimized.join(" ");
        if optimized.len() < query.len() * 3 / 10 {
            return query.to_string();
        }

        if optimized != query {
            tracing::info!("Query optimized: '{query}' -> '{optimized}'");
        }
        optimized
    }

    /// Validate a generated answer: supply fallbacks for empty or ungrounded
    /// output, block harmful content, and attach source attribution when the
    /// answer does not cite anything.
    pub fn validate_answer(&self, answer: &str, context: &[RetrievedChunk]) -> String {
        if answer.trim().is_empty() {
            return "I apologize, but I couldn't generate a proper response. Please try rephrasing your question."
                .to_string();
        }

        if context.is_empty()
            && !answer.contains("I don't know")
            && !answer.contains("don't have")
        {
            return "I don't have enough information in the available documents to answer that question."
                .to_string();
        }

        let lower = answer.to_lowercase();
        for pattern in &self.harmful {
            if pattern.is_match(&lower) {
                tracing::warn!("Blocked harmful generated content");
                return "I cannot provide that information. Please ask about something else."
                    .to_string();
            }
        }

        if !context.is_empty() && !lower.contains("document") && !lower.contains("source") {
            let titles: Vec<&str> = context
                .iter()
                .take(2)
                .map(|c| c.document_title.as_str())
                .collect();
            return format!("{answer} (Based on: {})", titles.join(", "));
        }

        answer.to_string()
    }
}
