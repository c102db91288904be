use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use buddy_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type ProviderError = Box<dyn ModelProviderError>;
type SendRequestResult = Result<ModelClientResponse, ClientError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Box<dyn Fn(String) + Send + 'static>, CancellationToken)
        -> BoxedSendRequestFuture + Send + Sync
>;
type CheckFn = Arc<dyn Fn() -> Result<(), ProviderError> + Send + Sync>;

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    check_fn: CheckFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let provider = Arc::new(provider);
        let check_fn: CheckFn = {
            let provider = Arc::clone(&provider);
            Arc::new(move || {
                provider
                    .check_config()
                    .map_err(|err| Box::new(err) as ProviderError)
            })
        };
        let handler_fn: HandlerFn =
            Arc::new(move |req, on_fragment, cancel| {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        let resp_or_err = select! {
                            biased;

                            _ = cancel.cancelled() => {
                                debug!("cancelled before the response arrived");
                                return Err(ClientError::Cancelled);
                            }
                            resp_or_err = fut => resp_or_err,
                        };
                        handle_response::<P>(resp_or_err, on_fragment, cancel)
                            .await
                    }
                    .instrument(trace_span!("model client req")),
                )
            });
        Self {
            handler_fn,
            check_fn,
        }
    }

    /// Checks the provider configuration without any network activity.
    #[inline]
    pub fn check_config(&self) -> Result<(), ProviderError> {
        (self.check_fn)()
    }

    /// Sends a request and streams the message deltas to `on_fragment`.
    ///
    /// Fragments are delivered in arrival order. When the call fails after
    /// some fragments were delivered, those fragments stay delivered.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled, either by dropping the
    /// future or by triggering `cancel`.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_fragment: impl Fn(String) + Send + 'static,
        cancel: CancellationToken,
    ) -> SendRequestResult {
        (self.handler_fn)(req, Box::new(on_fragment), cancel).await
    }
}

impl Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").finish_non_exhaustive()
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// Concatenation of all fragments, in arrival order.
    pub transcript: String,
    /// The reason the model finished generating, if it was reported.
    pub finish_reason: Option<ModelFinishReason>,
}

/// Error returned by [`ModelClient::send_request`].
#[derive(Debug)]
pub enum ClientError {
    /// The provider failed.
    Provider(ProviderError),
    /// The call was cancelled through its token.
    Cancelled,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_fragment: Box<dyn Fn(String) + Send + 'static>,
    cancel: CancellationToken,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(ClientError::Provider(Box::new(err)));
        }
    };

    let mut transcript = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err = select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("cancelled after {} bytes", transcript.len());
                return Err(ClientError::Cancelled);
            }
            event_or_err = poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)) => {
                event_or_err
            }
        };
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(ClientError::Provider(Box::new(err)));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
                on_fragment(msg);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        finish_reason,
    })
}
