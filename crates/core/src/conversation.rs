//! Conversation-related types.
//!
//! Turns serialize as `{"role": "user" | "model", "message": "..."}`,
//! which is the shape stored next to a document.

use std::slice;

use buddy_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// The author of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The person using the assistant.
    #[serde(rename = "user")]
    User,
    /// The model.
    #[serde(rename = "model", alias = "assistant")]
    Assistant,
}

/// One message in a conversation.
///
/// A turn is immutable once it is created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    message: String,
}

impl Turn {
    /// Creates a turn authored by the user.
    #[inline]
    pub fn user<S: Into<String>>(message: S) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    /// Creates a turn authored by the assistant.
    #[inline]
    pub fn assistant<S: Into<String>>(message: S) -> Self {
        Self {
            role: Role::Assistant,
            message: message.into(),
        }
    }

    /// Returns the author of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.message.clone()),
            Role::Assistant => ModelMessage::Assistant(self.message.clone()),
        }
    }
}

/// The ordered, append-only list of turns of a document's conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Creates an empty history.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn at the end.
    #[inline]
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Returns the turns, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns an iterator over the turns, oldest first.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if the conversation has no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.turns.iter().map(Turn::to_model_message).collect()
    }
}

impl FromIterator<Turn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = slice::Iter<'a, Turn>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
