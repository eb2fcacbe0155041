//! Turn and ConversationLog domain types.
//!
//! These are the core value objects that flow through the entire system:
//! User sends a query → memory windows the log → prompt is assembled →
//! generator responds → both turns are appended to the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single utterance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Render turns as `"<role>: <text><separator>"`, concatenated in order.
///
/// No truncation happens here; windowing is the memory policy's job.
pub fn render_history(turns: &[Turn], separator: &str) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.text);
        out.push_str(separator);
    }
    out
}

/// The full ordered turn history of one session.
///
/// Append-only: the only other mutation is a full [`reset`](Self::reset)
/// when the session switches persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLog {
    /// Unique conversation ID
    pub id: ConversationId,

    turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl ConversationLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a log from existing turns (e.g. loaded from a transcript).
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            ..Self::new()
        }
    }

    /// Append a turn in place.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Consume the log and return the new state with one more turn.
    pub fn append_turn(mut self, role: Role, text: impl Into<String>) -> Self {
        self.push(Turn::new(role, text));
        self
    }

    /// Discard every turn. Used on persona switch only.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_turns() -> Vec<Turn> {
        vec![
            Turn::user("User's initial message"),
            Turn::assistant("Assistant's Initial response"),
            Turn::user("User's Question?"),
            Turn::assistant("Assistant's response."),
            Turn::user("User's appreciation."),
        ]
    }

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello, Versa!");
        assert_eq!(turn.role(), Role::User);
        assert_eq!(turn.text(), "Hello, Versa!");
    }

    #[test]
    fn render_empty_history() {
        assert_eq!(render_history(&[], "\n"), "");
    }

    #[test]
    fn render_history_format() {
        let turns = vec![Turn::user("Hi"), Turn::assistant("Hello")];
        assert_eq!(render_history(&turns, "\n"), "user: Hi\nassistant: Hello\n");
        assert_eq!(render_history(&turns, " | "), "user: Hi | assistant: Hello | ");
    }

    #[test]
    fn render_history_split_count() {
        let turns = sample_turns();
        let rendered = render_history(&turns, "\n");
        assert_eq!(rendered.split('\n').count(), turns.len() + 1);
    }

    #[test]
    fn render_is_deterministic() {
        let turns = sample_turns();
        assert_eq!(render_history(&turns, "\n"), render_history(&turns.clone(), "\n"));
    }

    #[test]
    fn append_turn_returns_new_state() {
        let log = ConversationLog::new();
        let log = log
            .append_turn(Role::User, "Hi")
            .append_turn(Role::Assistant, "Hello");
        assert_eq!(log.len(), 2);
        assert_eq!(log.turns().last().map(Turn::role), Some(Role::Assistant));
    }

    #[test]
    fn log_tracks_updates() {
        let mut log = ConversationLog::new();
        let created = log.created_at;
        log.push(Turn::user("First message"));
        assert_eq!(log.len(), 1);
        assert!(log.updated_at >= created);
    }

    #[test]
    fn reset_discards_all_turns() {
        let mut log = ConversationLog::from_turns(sample_turns());
        let id = log.id.clone();
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.id, id);
    }

    #[test]
    fn turn_serialization_uses_lowercase_roles() {
        let json = serde_json::to_string(&Turn::assistant("ok")).unwrap();
        assert!(json.contains("\"assistant\""));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Turn::assistant("ok"));
    }
}
