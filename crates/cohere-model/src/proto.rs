use buddy_model::{ModelFinishReason, ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

use crate::CohereConfig;

// ------------------------------
// Types received from the server
// ------------------------------

/// One line of a streamed chat response.
///
/// Only the discriminators this crate acts on are listed, everything
/// else (citations, search queries, tool calls, ...) falls into `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "event_type")]
pub enum StreamEvent {
    #[serde(rename = "stream-start")]
    StreamStart { generation_id: Option<String> },
    #[serde(rename = "text-generation")]
    TextGeneration { text: String },
    #[serde(rename = "stream-end")]
    StreamEnd { finish_reason: Option<String> },
    #[serde(other)]
    Other,
}

/// Body of a non-streaming chat response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Chatbot,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatMessage {
    role: Role,
    message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat_history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    model: String,
    temperature: f32,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &CohereConfig,
    stream: bool,
) -> ChatRequest {
    ChatRequest {
        message: req.message.clone(),
        chat_history: req.history.iter().map(create_message).collect(),
        preamble: req.preamble.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        stream,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> ChatMessage {
    let role = match msg {
        ModelMessage::User(_) => Role::User,
        ModelMessage::Assistant(_) => Role::Chatbot,
    };
    ChatMessage {
        role,
        message: msg.text().to_owned(),
    }
}

#[inline]
pub fn finish_reason(reason: Option<&str>) -> ModelFinishReason {
    match reason {
        Some("COMPLETE") | None => ModelFinishReason::Stop,
        Some("MAX_TOKENS") => ModelFinishReason::MaxTokens,
        Some(_) => ModelFinishReason::Other,
    }
}

/// Extracts the `message` field from an error response body.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.is_empty())
}
