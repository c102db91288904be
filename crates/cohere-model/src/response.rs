use std::pin::Pin;
use std::task::{Context, Poll, ready};

use buddy_model::{ErrorKind, ModelResponse, ModelResponseEvent};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Lines;
use crate::proto::{self, StreamEvent};

struct PartialState {
    lines: Lines,
    generation_id: Option<String>,
    fragments: usize,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streamed chat response.
    ///
    /// Dropping the response releases the underlying connection.
    pub struct CohereResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl CohereResponse {
    #[inline]
    pub(crate) fn from_lines(lines: Lines) -> Self {
        let partial_state = PartialState {
            lines,
            generation_id: None,
            fragments: 0,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for CohereResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    debug!(
                        "stream {:?} ended after {} fragments",
                        partial_state.generation_id, partial_state.fragments
                    );
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        let line = match partial_state.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(
                    format!("{err} (after {} fragments)", partial_state.fragments),
                    ErrorKind::StreamInterrupted,
                ));
            }
        };
        trace!("got line: {}", String::from_utf8_lossy(&line));

        let event = match serde_json::from_slice::<StreamEvent>(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!("skipping malformed stream line: {err}");
                continue;
            }
        };

        match event {
            StreamEvent::TextGeneration { text } => {
                if text.is_empty() {
                    continue;
                }
                partial_state.fragments += 1;
                return Ok((
                    Some(ModelResponseEvent::MessageDelta(text)),
                    partial_state,
                ));
            }
            StreamEvent::StreamEnd { finish_reason } => {
                let reason = proto::finish_reason(finish_reason.as_deref());
                return Ok((
                    Some(ModelResponseEvent::Completed(reason)),
                    partial_state,
                ));
            }
            StreamEvent::StreamStart { generation_id } => {
                debug!("stream started: {generation_id:?}");
                partial_state.generation_id = generation_id;
            }
            StreamEvent::Other => {}
        }
    }

    Ok((None, partial_state))
}
