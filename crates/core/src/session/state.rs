use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::conversation::{ConversationHistory, Turn};

/// Assistant text appended when a reply breaks off mid-stream.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

struct InFlight {
    call_id: u64,
    cancel: CancellationToken,
    // Set once the reply is committed, while its save is still running.
    committed: bool,
}

/// The mutable part of a session.
///
/// Every transition happens under the session lock, and none of them
/// await. Each generation is identified by a call id, so that a late
/// fragment or a stale completion cannot touch a newer exchange.
///
/// An exchange holds the single slot from [`start`](Self::start) until
/// [`release`](Self::release), which comes after the conversation has been
/// saved. Saves of consecutive exchanges therefore never overlap.
pub struct SessionState {
    history: ConversationHistory,
    streaming: Option<String>,
    in_flight: Option<InFlight>,
    next_call_id: u64,
}

/// A generation that has just been admitted.
pub struct Started {
    pub call_id: u64,
    pub cancel: CancellationToken,
    /// The history committed before the new user turn.
    pub prior_history: ConversationHistory,
    pub user_turn: Turn,
}

/// How a generation ended.
pub enum Outcome {
    Completed(String),
    Interrupted,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn new(history: ConversationHistory) -> Self {
        Self {
            history,
            streaming: None,
            in_flight: None,
            next_call_id: 1,
        }
    }

    /// Appends the user turn optimistically and marks the session pending.
    pub fn start(&mut self, message: &str) -> Result<Started, Error> {
        if self.in_flight.is_some() {
            return Err(Error::busy());
        }

        let call_id = self.next_call_id;
        self.next_call_id += 1;
        let cancel = CancellationToken::new();

        let prior_history = self.history.clone();
        let user_turn = Turn::user(message);
        self.history.push(user_turn.clone());
        self.streaming = Some(String::new());
        self.in_flight = Some(InFlight {
            call_id,
            cancel: cancel.clone(),
            committed: false,
        });

        Ok(Started {
            call_id,
            cancel,
            prior_history,
            user_turn,
        })
    }

    /// Extends the in-progress assistant text.
    ///
    /// Returns `false` if the fragment belongs to a call that is no longer
    /// in flight.
    pub fn append_fragment(&mut self, call_id: u64, fragment: &str) -> bool {
        if !self.is_streaming(call_id) {
            return false;
        }
        self.streaming
            .get_or_insert_with(String::new)
            .push_str(fragment);
        true
    }

    /// Ends the generation and returns the assistant turn it committed.
    ///
    /// The session stays pending until the call is released. Returns
    /// `None` without any change if `call_id` is not streaming.
    pub fn finish(
        &mut self,
        call_id: u64,
        outcome: Outcome,
    ) -> Option<Option<Turn>> {
        match &mut self.in_flight {
            Some(in_flight)
                if in_flight.call_id == call_id && !in_flight.committed =>
            {
                in_flight.committed = true;
            }
            _ => return None,
        }
        self.streaming = None;

        let turn = match outcome {
            Outcome::Completed(transcript) => Some(Turn::assistant(transcript)),
            Outcome::Interrupted => Some(Turn::assistant(APOLOGY)),
            Outcome::Failed | Outcome::Cancelled => None,
        };
        if let Some(turn) = &turn {
            self.history.push(turn.clone());
        }
        Some(turn)
    }

    /// Frees the slot held by `call_id`.
    ///
    /// Returns `false` if the call does not hold it.
    pub fn release(&mut self, call_id: u64) -> bool {
        let held = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.call_id == call_id);
        if held {
            self.in_flight = None;
        }
        held
    }

    /// Triggers cancellation of the streaming call, if any.
    pub fn cancel(&self) -> bool {
        match &self.in_flight {
            Some(in_flight) if !in_flight.committed => {
                in_flight.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    #[inline]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[inline]
    pub fn streaming(&self) -> Option<&str> {
        self.streaming.as_deref()
    }

    #[inline]
    fn is_streaming(&self, call_id: u64) -> bool {
        self.in_flight.as_ref().is_some_and(|in_flight| {
            in_flight.call_id == call_id && !in_flight.committed
        })
    }
}
