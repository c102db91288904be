//! A model provider for Cohere-compatible chat APIs.
//!
//! Streaming responses are newline-delimited JSON objects, each carrying
//! an `event_type` discriminator. Only `text-generation` events produce
//! message deltas. Lines that cannot be decoded are logged and skipped,
//! they never end the stream.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use buddy_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use mime::Mime;
use reqwest::{Client, RequestBuilder, Response, header};

pub use config::{CohereConfig, CohereConfigBuilder};
use io::{Chunks, Lines};
pub use response::CohereResponse;

/// Error type for [`CohereProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    #[inline]
    fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => write!(f, "{}", self.message),
        }
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

/// Cohere-compatible model provider.
#[derive(Clone, Debug)]
pub struct CohereProvider {
    client: Client,
    config: Arc<CohereConfig>,
}

impl CohereProvider {
    /// Creates a new `CohereProvider` with the given configuration.
    #[inline]
    pub fn new(config: CohereConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    #[inline]
    fn api_key(&self) -> Result<&str, Error> {
        self.config.api_key.as_deref().ok_or_else(|| {
            Error::new(
                "Cohere API key is not configured",
                ErrorKind::Configuration,
            )
        })
    }

    /// Prepares the HTTP request, failing if no API key is configured.
    fn prepare(
        &self,
        req: &ModelRequest,
        stream: bool,
    ) -> Result<RequestBuilder, Error> {
        let api_key = self.api_key()?;
        let body = proto::create_request(req, &self.config, stream);
        Ok(self
            .client
            .post(self.config.chat_url())
            .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Client-Name", &self.config.client_name)
            .json(&body))
    }
}

impl ModelProvider for CohereProvider {
    type Error = Error;
    type Response = CohereResponse;

    #[inline]
    fn check_config(&self) -> Result<(), Self::Error> {
        self.api_key().map(|_| ())
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let prepared = self.prepare(req, true);
        async move {
            let resp = send_checked(prepared?).await?;
            check_content_type(&resp);

            // Here we got a successful response.
            let lines = Lines::new(Chunks::from_response(resp));
            Ok(CohereResponse::from_lines(lines))
        }
    }

    /// Sends a non-streaming request and returns the `text` field of the
    /// response.
    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static {
        let prepared = self.prepare(req, false);
        async move {
            let resp = send_checked(prepared?).await?;
            let body = resp.bytes().await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transport)
            })?;
            let resp = serde_json::from_slice::<proto::ChatResponse>(&body)
                .map_err(|err| {
                    Error::new(
                        format!("Malformed chat response: {err}"),
                        ErrorKind::Other,
                    )
                })?;
            Ok(resp.text)
        }
    }
}

/// Sends the request and turns a non-success status into an error carrying
/// the status code and the server's message.
async fn send_checked(builder: RequestBuilder) -> Result<Response, Error> {
    let resp = builder
        .send()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.bytes().await.unwrap_or_default();
    let message = proto::error_message(&body)
        .unwrap_or_else(|| format!("Cohere API error: {}", status.as_u16()));
    error!("request rejected with {status}: {message}");
    Err(Error::new(message, ErrorKind::Transport).with_status(status.as_u16()))
}

fn check_content_type(resp: &Response) {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let Some(content_type) = content_type else {
        return;
    };
    let is_json = content_type
        .parse()
        .map(|m: Mime| {
            m.suffix() == Some(mime::JSON)
                || m.subtype().as_str().ends_with("json")
        })
        .unwrap_or(false);
    if !is_json {
        warn!("unexpected content type for a chat stream: {content_type}");
    }
}
