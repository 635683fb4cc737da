//! In-memory chat session storage.
//!
//! Sessions exist to give generation conversational context and to let
//! repeat questions be phrased elliptically; they are not durable and a
//! restart drops them.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::models::ChatMessage;

/// Hard cap per session, preventing unbounded memory growth.
const MAX_SESSION_MESSAGES: usize = 20;
/// Hard cap on concurrent sessions; the idle-longest session is evicted
/// to admit a new one.
const MAX_SESSIONS: usize = 500;
/// How many recent messages feed the generation prompt.
const GENERATION_HISTORY_WINDOW: usize = 5;
/// How many recent messages are mined for query-enhancement terms.
const CONTEXT_TERM_WINDOW: usize = 6;
/// Max number of context terms appended to a query.
const MAX_CONTEXT_TERMS: usize = 3;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user/assistant exchange, trimming to the message cap.
    /// At the session cap, the session idle the longest makes room.
    pub fn record_exchange(&self, session_id: &str, user_query: &str, answer: &str) {
        let mut sessions = self.sessions.write();

        if !sessions.contains_key(session_id) && sessions.len() >= MAX_SESSIONS {
            let idle_longest = sessions
                .iter()
                .min_by_key(|(_, msgs)| msgs.last().map(|m| m.timestamp))
                .map(|(id, _)| id.clone());
            if let Some(id) = idle_longest {
                tracing::debug!(session = %id, "evicting idle session at capacity");
                sessions.remove(&id);
            }
        }

        let history = sessions.entry(session_id.to_string()).or_default();

        history.push(ChatMessage {
            role: "user".to_string(),
            content: user_query.to_string(),
            timestamp: Utc::now(),
        });
        history.push(ChatMessage {
            role: "assistant".to_string(),
            content: answer.to_string(),
            timestamp: Utc::now(),
        });

        if history.len() > MAX_SESSION_MESSAGES {
            let excess = history.len() - MAX_SESSION_MESSAGES;
            history.drain(..excess);
        }
    }

    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// The tail of the history used when building the generation prompt.
    pub fn recent_for_generation(&self, session_id: &str) -> Vec<ChatMessage> {
        let sessions = self.sessions.read();
        let Some(history) = sessions.get(session_id) else {
            return Vec::new();
        };
        let start = history.len().saturating_sub(GENERATION_HISTORY_WINDOW);
        history[start..].to_vec()
    }

    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn total_messages(&self) -> usize {
        self.sessions.read().values().map(|h| h.len()).sum()
    }

    /// Enhance a query with distinct content terms from the session's recent
    /// user turns. Terms must be longer than 3 chars; at most 3 are added.
    pub fn enhance_query(&self, session_id: &str, query: &str) -> String {
        let sessions = self.sessions.read();
        let Some(history) = sessions.get(session_id) else {
            return query.to_string();
        };
        if history.is_empty() {
            return query.to_string();
        }

        let start = history.len().saturating_sub(CONTEXT_TERM_WINDOW);
        let mut seen = HashSet::new();
        let mut terms = Vec::new();

        for message in &history[start..] {
            if message.role != "user" {
                continue;
            }
            for word in message.content.split_whitespace() {
                if word.len() > 3 && seen.insert(word.to_lowercase()) {
                    terms.push(word.to_string());
                    if terms.len() == MAX_CONTEXT_TERMS {
                        break;
                    }
                }
            }
            if terms.len() == MAX_CONTEXT_TERMS {
                break;
            }
        }

        if terms.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, terms.join(" "))
        }
    }

    /// Plain-text transcript of a session, or None if it does not exist.
    pub fn export_transcript(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read();
        let history = sessions.get(session_id)?;

        let mut out = format!("Chat transcript for session {session_id}\n\n");
        for message in history {
            let role = match message.role.as_str() {
                "user" => "User",
                "assistant" => "Assistant",
                other => other,
            };
            writeln!(
                out,
                "[{}] {role}:\n{}\n",
                message.timestamp.to_rfc3339(),
                message.content
            )
            .ok()?;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_history() {
        let store = SessionStore::new();
        store.record_exchange("s1", "what is ml?", "ml is...");
        let history = store.history("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
    }

    #[test]
    fn test_session_cap_at_20_messages() {
        let store = SessionStore::new();
        for i in 0..15 {
            store.record_exchange("s1", &format!("q{i}"), &format!("a{i}"));
        }
        let history = store.history("s1");
        assert_eq!(history.len(), MAX_SESSION_MESSAGES);
        // Oldest turns dropped first
        assert_eq!(history.last().unwrap().content, "a14");
        assert_eq!(history[0].content, "q5");
    }

    #[test]
    fn test_session_count_capped_with_idle_eviction() {
        let store = SessionStore::new();
        for i in 0..MAX_SESSIONS + 10 {
            store.record_exchange(&format!("s{i}"), "q", "a");
        }
        assert_eq!(store.active_count(), MAX_SESSIONS);
        // The newest session is always admitted
        let newest = format!("s{}", MAX_SESSIONS + 9);
        assert!(!store.history(&newest).is_empty());
        // An existing session keeps recording without growing the map
        store.record_exchange(&newest, "q2", "a2");
        assert_eq!(store.active_count(), MAX_SESSIONS);
    }

    #[test]
    fn test_generation_window_is_five() {
        let store = SessionStore::new();
        for i in 0..5 {
            store.record_exchange("s1", &format!("q{i}"), &format!("a{i}"));
        }
        let recent = store.recent_for_generation("s1");
        assert_eq!(recent.len(), 5);
        assert_eq!(recent.last().unwrap().content, "a4");
    }

    #[test]
    fn test_enhance_query_appends_user_terms() {
        let store = SessionStore::new();
        store.record_exchange("s1", "explain gradient descent optimization", "it is...");
        let enhanced = store.enhance_query("s1", "and momentum?");
        assert!(enhanced.starts_with("and momentum?"));
        assert!(enhanced.contains("explain"));
        // At most 3 terms appended
        let appended = enhanced.trim_start_matches("and momentum?").trim();
        assert!(appended.split_whitespace().count() <= MAX_CONTEXT_TERMS);
    }

    #[test]
    fn test_enhance_query_skips_short_words() {
        let store = SessionStore::new();
        store.record_exchange("s1", "a an the of", "answer");
        assert_eq!(store.enhance_query("s1", "next"), "next");
    }

    #[test]
    fn test_enhance_query_unknown_session() {
        let store = SessionStore::new();
        assert_eq!(store.enhance_query("nope", "query"), "query");
    }

    #[test]
    fn test_clear_session() {
        let store = SessionStore::new();
        store.record_exchange("s1", "q", "a");
        assert!(store.clear("s1"));
        assert!(!store.clear("s1"));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_export_transcript_format() {
        let store = SessionStore::new();
        store.record_exchange("s1", "hello", "hi there");
        let transcript = store.export_transcript("s1").unwrap();
        assert!(transcript.contains("session s1"));
        assert!(transcript.contains("User:\nhello"));
        assert!(transcript.contains("Assistant:\nhi there"));
    }

    #[test]
    fn test_export_unknown_session() {
        let store = SessionStore::new();
        assert!(store.export_transcript("nope").is_none());
    }

    #[test]
    fn test_total_messages() {
        let store = SessionStore::new();
        store.record_exchange("s1", "q", "a");
        store.record_exchange("s2", "q", "a");
        assert_eq!(store.total_messages(), 4);
        assert_eq!(store.active_count(), 2);
    }
}
