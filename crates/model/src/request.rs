/// A request to be sent to the model provider.
///
/// The request is split the way chat endpoints expect it: the new user
/// message is kept apart from the turns that precede it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// Instructions that set the behavioral context of the model.
    pub preamble: Option<String>,
    /// Prior turns, oldest first.
    pub history: Vec<ModelMessage>,
    /// The message the model should respond to.
    pub message: String,
}

/// A complete message in the history.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Returns the text of this message.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            ModelMessage::User(text) | ModelMessage::Assistant(text) => text,
        }
    }
}
