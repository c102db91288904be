use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
}

/// How a preset response fails.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    /// The request is rejected with the given status before any event.
    Reject { status: u16, message: String },
    /// The endpoint cannot be reached, so no status is received.
    Unreachable(String),
    /// The stream breaks after delivering the given number of events.
    InterruptAfter(usize),
}

/// The preset response for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the response fails instead of completing.
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a `PresetResponse` that streams the given fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_events(
            fragments
                .into_iter()
                .map(|f| PresetEvent::MessageDelta(f.into()))
                .collect::<Vec<_>>(),
        )
    }

    /// Creates a `PresetResponse` whose request is rejected.
    #[inline]
    pub fn rejected<S: Into<String>>(status: u16, message: S) -> Self {
        Self {
            events: vec![],
            failure: Some(PresetFailure::Reject {
                status,
                message: message.into(),
            }),
        }
    }

    /// Creates a `PresetResponse` whose endpoint cannot be reached.
    #[inline]
    pub fn unreachable<S: Into<String>>(message: S) -> Self {
        Self {
            events: vec![],
            failure: Some(PresetFailure::Unreachable(message.into())),
        }
    }

    /// Makes the stream break after `events` events.
    #[inline]
    pub fn interrupted_after(mut self, events: usize) -> Self {
        self.failure = Some(PresetFailure::InterruptAfter(events));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let response =
            PresetResponse::with_fragments(["I have read ", "your essay."])
                .interrupted_after(1);

        let serialized = serde_json::to_string(&response).unwrap();
        let deserialized: PresetResponse =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(response, deserialized);
    }
}
