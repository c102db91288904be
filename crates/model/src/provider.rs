use std::error::Error;
use std::future::poll_fn;
use std::pin::pin;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::{ModelResponse, ModelResponseEvent};

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// Returns the status code reported by the endpoint, if the request
    /// was rejected with one.
    fn status(&self) -> Option<u16> {
        None
    }
}

/// A type that represents a model provider, which is an entry for sampling
/// chat requests.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Checks that the provider is able to send requests at all.
    ///
    /// Callers use this to fail before any state change or network
    /// activity when, for example, a credential is missing.
    fn check_config(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Sends a streaming request to the model.
    ///
    /// The returned future resolves once the endpoint has accepted the
    /// request. Events are then pulled from the response.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;

    /// Sends a request and waits for the complete text.
    ///
    /// The default implementation drains a streaming response. Providers
    /// with a dedicated non-streaming endpoint may override it.
    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static {
        let resp_fut = self.send_request(req);
        async move {
            let mut resp = pin!(resp_fut.await?);
            let mut text = String::new();
            while let Some(event) =
                poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
            {
                if let ModelResponseEvent::MessageDelta(delta) = event {
                    text.push_str(&delta);
                }
            }
            Ok(text)
        }
    }
}
