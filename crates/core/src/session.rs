mod builder;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context;
use crate::conversation::{ConversationHistory, Turn};
use crate::error::{Error, ErrorKind};
use crate::model_client::{ClientError, ModelClient};
use crate::store::{DocumentSource, HistoryStore};
pub use builder::SessionBuilder;
use state::{Outcome, SessionState};

type OnTurnFn = Box<dyn Fn(&Turn) + Send + Sync>;
type OnFragmentFn = Box<dyn Fn(&str) + Send + Sync>;
type OnPendingFn = Box<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) on_turn: Option<OnTurnFn>,
    pub(crate) on_fragment: Option<OnFragmentFn>,
    pub(crate) on_pending: Option<OnPendingFn>,
}

impl Callbacks {
    #[inline]
    fn turn(&self, turn: &Turn) {
        if let Some(on_turn) = &self.on_turn {
            on_turn(turn);
        }
    }

    #[inline]
    fn fragment(&self, fragment: &str) {
        if let Some(on_fragment) = &self.on_fragment {
            on_fragment(fragment);
        }
    }

    #[inline]
    fn pending(&self, pending: bool) {
        if let Some(on_pending) = &self.on_pending {
            on_pending(pending);
        }
    }
}

struct Shared {
    model_client: ModelClient,
    document_id: String,
    history_store: Arc<dyn HistoryStore>,
    document: Arc<dyn DocumentSource>,
    callbacks: Callbacks,
    state: Mutex<SessionState>,
}

impl Shared {
    /// Applies the end of a generation and notifies the `on_turn` callback.
    ///
    /// Returns the committed assistant turn, or `None` if the call had
    /// already ended.
    fn finish(&self, call_id: u64, outcome: Outcome) -> Option<Option<Turn>> {
        let turn = self.state.lock().finish(call_id, outcome)?;
        if let Some(turn) = &turn {
            self.callbacks.turn(turn);
        }
        Some(turn)
    }

    fn release(&self, call_id: u64) {
        if self.state.lock().release(call_id) {
            self.callbacks.pending(false);
        }
    }
}

/// A point-in-time copy of what a conversation view displays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Committed turns, oldest first.
    pub turns: Vec<Turn>,
    /// The assistant text received so far for the reply being generated.
    pub streaming: Option<String>,
    /// Whether a reply is being generated.
    pub pending: bool,
}

/// The conversation about one document.
///
/// A session accepts one message at a time. The user turn is appended as
/// soon as a message is accepted, the assistant turn once the reply has
/// been fully received. After every successful exchange the whole
/// conversation is saved to the history store.
///
/// Sessions are cheap to clone, clones share the same conversation.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    fn from_builder(builder: SessionBuilder, history: ConversationHistory) -> Self {
        let SessionBuilder {
            model_client,
            document_id,
            history_store,
            document,
            callbacks,
        } = builder;
        let shared = Shared {
            model_client,
            document_id,
            history_store,
            document,
            callbacks,
            state: Mutex::new(SessionState::new(history)),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Sends a message and waits for the assistant's reply.
    ///
    /// Returns the assistant turn that was appended. Fails without any
    /// change to the conversation if the message is blank, the model is
    /// not configured, or another reply is still being generated.
    ///
    /// When the endpoint rejects the request with a status, no assistant
    /// turn is appended. Any other failure appends an apology turn and the
    /// error is still returned. The session stays pending until the
    /// conversation has been saved. Dropping the returned future cancels
    /// the reply.
    pub async fn send_message(&self, message: &str) -> Result<Turn, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::validation("message is empty"));
        }
        let shared = &self.shared;
        shared
            .model_client
            .check_config()
            .map_err(|err| Error::from_provider(err.as_ref()))?;

        let started = shared.state.lock().start(message)?;
        let call_id = started.call_id;
        let _guard = CallGuard { shared, call_id };
        shared.callbacks.pending(true);
        shared.callbacks.turn(&started.user_turn);

        let document = shared.document.current_text();
        let req = context::assemble_request(
            &document,
            &started.prior_history,
            message,
        )?;
        debug!(
            "sending message #{call_id} of {:?} with {} prior turns",
            shared.document_id,
            started.prior_history.len()
        );

        let on_fragment = {
            let shared = Arc::clone(shared);
            move |fragment: String| {
                let accepted =
                    shared.state.lock().append_fragment(call_id, &fragment);
                if accepted {
                    shared.callbacks.fragment(&fragment);
                }
            }
        };
        let result = shared
            .model_client
            .send_request(req, on_fragment, started.cancel)
            .await;

        let (outcome, err) = match result {
            Ok(resp) => (Outcome::Completed(resp.transcript), None),
            Err(ClientError::Cancelled) => {
                (Outcome::Cancelled, Some(Error::cancelled()))
            }
            Err(ClientError::Provider(err)) => {
                let err = Error::from_provider(err.as_ref());
                (failure_outcome(&err), Some(err))
            }
        };

        let turn = match shared.finish(call_id, outcome) {
            Some(turn) => turn,
            None => return Err(Error::cancelled()),
        };
        if let Some(err) = err {
            warn!("message #{call_id} failed: {err}");
            return Err(err);
        }
        let Some(turn) = turn else {
            return Err(Error::cancelled());
        };

        // The slot stays held until the save is over.
        self.persist().await;
        Ok(turn)
    }

    /// Cancels the reply being generated.
    ///
    /// Returns `false` if no reply is being generated. The pending
    /// [`send_message`](Self::send_message) call then fails with a
    /// `Cancelled` error.
    pub fn cancel(&self) -> bool {
        self.shared.state.lock().cancel()
    }

    /// Returns `true` if a reply is being generated.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().is_pending()
    }

    /// Returns a copy of the committed conversation.
    #[inline]
    pub fn history(&self) -> ConversationHistory {
        self.shared.state.lock().history().clone()
    }

    /// Returns what a conversation view should display now.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.state.lock();
        SessionSnapshot {
            turns: state.history().turns().to_vec(),
            streaming: state.streaming().map(str::to_owned),
            pending: state.is_pending(),
        }
    }

    /// Returns the id of the document this conversation belongs to.
    #[inline]
    pub fn document_id(&self) -> &str {
        &self.shared.document_id
    }

    async fn persist(&self) {
        let shared = &self.shared;
        let history = shared.state.lock().history().clone();
        if let Err(err) = shared
            .history_store
            .save_history(&shared.document_id, &history)
            .await
        {
            error!(
                "failed to save the conversation of {:?}: {err}",
                shared.document_id
            );
        }
    }
}

/// Returns how a failed generation ends the exchange.
///
/// Only a request the endpoint rejected with a status leaves no assistant
/// turn. Any other failure is answered with the apology.
fn failure_outcome(err: &Error) -> Outcome {
    match err.kind() {
        ErrorKind::Configuration => Outcome::Failed,
        ErrorKind::Transport if err.status().is_some() => Outcome::Failed,
        _ => Outcome::Interrupted,
    }
}

/// Releases the slot when `send_message` returns or is dropped.
///
/// A call dropped before its reply was committed ends as cancelled.
struct CallGuard<'a> {
    shared: &'a Arc<Shared>,
    call_id: u64,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.shared.finish(self.call_id, Outcome::Cancelled).is_some() {
            debug!("message #{} dropped while in flight", self.call_id);
        }
        self.shared.release(self.call_id);
    }
}
