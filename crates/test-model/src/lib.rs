//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use buddy_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use parking_lot::Mutex;
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Error {
    #[inline]
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.message, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn status(&self) -> Option<u16> {
        self.status
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    interrupt_after: Option<usize>,
    event_idx: usize,
    completed: bool,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if this.interrupt_after == Some(this.event_idx) {
                this.interrupt_after = None;
                this.completed = true;
                this.event_idx = this.events.len();
                return Poll::Ready(Err(Error::new(
                    "connection reset",
                    ErrorKind::StreamInterrupted,
                )));
            }

            if this.event_idx < this.events.len() {
                let event = match &this.events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            }

            if !this.completed {
                this.completed = true;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    ModelFinishReason::Stop,
                ))));
            }

            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to queue the responses. Every request
/// consumes the next queued response, and an error is returned when the
/// queue is empty. All received requests are recorded so that tests can
/// inspect what the caller sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<VecDeque<PresetResponse>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Queues a response for a future request.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.lock().push_back(preset);
    }

    /// Sets the delay before each event of a response.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

impl Debug for TestModelProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModelProvider")
            .field("queued", &self.script.lock().len())
            .field("received", &self.requests.lock().len())
            .finish()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests.lock().push(req.clone());

        let result = match self.script.lock().pop_front() {
            None => Err(Error::new("no enough steps", ErrorKind::Other)),
            Some(PresetResponse {
                failure: Some(PresetFailure::Reject { status, message }),
                ..
            }) => Err(Error {
                message,
                kind: ErrorKind::Transport,
                status: Some(status),
            }),
            Some(PresetResponse {
                failure: Some(PresetFailure::Unreachable(message)),
                ..
            }) => Err(Error::new(message, ErrorKind::Transport)),
            Some(PresetResponse { events, failure }) => {
                let interrupt_after = match failure {
                    Some(PresetFailure::InterruptAfter(n)) => Some(n),
                    _ => None,
                };
                Ok(TestModelResponse {
                    events,
                    interrupt_after,
                    event_idx: 0,
                    completed: false,
                    delay: self.delay.unwrap_or(Duration::from_millis(1)),
                    sleep: None,
                })
            }
        };
        ready(result)
    }
}
