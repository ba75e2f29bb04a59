//! Per-caller conversational context for text generation.
//!
//! Each caller-supplied session id owns its own [`ChatSession`] behind its
//! own lock. Concurrent requests for different sessions never see each
//! other's history; concurrent requests for the same session are
//! serialized on that session's lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// One user prompt and the reply it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Bounded history of exchanges for one session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: VecDeque<Exchange>,
    max_turns: usize,
}

impl ChatSession {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Drop all remembered exchanges.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Exchange> {
        self.turns.iter()
    }

    /// Render the remembered exchanges ahead of `prompt`.
    ///
    /// Returns `prompt` unchanged when there is no history.
    pub fn compose_prompt(&self, prompt: &str) -> String {
        if self.turns.is_empty() {
            return prompt.to_string();
        }

        let mut out = String::from("Previous conversation:\n");
        for turn in &self.turns {
            out.push_str("User: ");
            out.push_str(&turn.user);
            out.push_str("\nAssistant: ");
            out.push_str(&turn.assistant);
            out.push('\n');
        }
        out.push_str("\nUser: ");
        out.push_str(prompt);
        out
    }

    /// Remember an exchange, evicting the oldest beyond `max_turns`.
    pub fn record(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
    }
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    last_seen: Instant,
}

/// All live sessions, keyed by caller-supplied session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_turns: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(max_turns: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
            idle_timeout,
        }
    }

    /// Fetch (or create) the session for `id`.
    ///
    /// Sessions idle past the timeout and not currently held by a request
    /// are evicted on the way.
    pub async fn session(&self, id: &str) -> Arc<Mutex<ChatSession>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|key, entry| {
            key == id
                || now.duration_since(entry.last_seen) < self.idle_timeout
                || Arc::strong_count(&entry.session) > 1
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle chat sessions");
        }

        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Arc::new(Mutex::new(ChatSession::new(self.max_turns))),
                last_seen: now,
            });
        entry.last_seen = now;
        Arc::clone(&entry.session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
