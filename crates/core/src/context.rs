//! Assembly of chat requests about a document.
//!
//! The document body is never sent as a turn. It is embedded in a fixed
//! preamble so that the model treats it as background for the
//! conversation.

use buddy_model::ModelRequest;

use crate::Error;
use crate::conversation::ConversationHistory;

/// Text embedded in the preamble when the document has no content.
pub const EMPTY_DOCUMENT_PLACEHOLDER: &str =
    "(The document is empty. No content has been written yet.)";

const PREAMBLE_INTRO: &str = "\
You are ProjectBuddy, an assistant helping a student or professional \
improve the project document they are working on. The current content of \
the document is given below between the markers. Treat it as background \
information: do not reply to it directly, answer the user's messages \
about it. Be concise and write in plain text without Markdown symbols.";

const DOCUMENT_START: &str = "--- DOCUMENT START ---";
const DOCUMENT_END: &str = "--- DOCUMENT END ---";

/// Builds the preamble that carries the document as background.
pub fn preamble(document: &str) -> String {
    let body = if document.trim().is_empty() {
        EMPTY_DOCUMENT_PLACEHOLDER
    } else {
        document
    };
    format!("{PREAMBLE_INTRO}\n\n{DOCUMENT_START}\n{body}\n{DOCUMENT_END}")
}

/// Builds the request for a new user message.
///
/// `history` holds the turns committed before this message, the message
/// itself is sent separately and must not be part of it. Fails if the
/// message is empty after trimming.
pub fn assemble_request(
    document: &str,
    history: &ConversationHistory,
    message: &str,
) -> Result<ModelRequest, Error> {
    let message = message.trim();
    if message.is_empty() {
        return Err(Error::validation("message is empty"));
    }
    Ok(ModelRequest {
        preamble: Some(preamble(document)),
        history: history.to_model_messages(),
        message: message.to_owned(),
    })
}
