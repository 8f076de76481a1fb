//! Conversation turns and the per-session transcript.

use serde::{Deserialize, Serialize};

/// System prompt every new transcript starts with.
pub const SEED_SYSTEM_PROMPT: &str = "You are a helpful knowledge-base assistant. \
Answer the user's questions accurately and concisely.";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turn history for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// A fresh transcript holding only the seeded system turn.
    pub fn seeded() -> Self {
        Self {
            turns: vec![Turn::system(SEED_SYSTEM_PROMPT)],
        }
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
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

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Turns after any leading system turns; what the model sees as history.
    pub fn conversation(&self) -> &[Turn] {
        let start = self
            .turns
            .iter()
            .position(|t| t.role != Role::System)
            .unwrap_or(self.turns.len());
        &self.turns[start..]
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}
