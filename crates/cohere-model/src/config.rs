use std::fmt::Debug;

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";
const DEFAULT_MODEL: &str = "command-a-03-2025";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_CLIENT_NAME: &str = "projectbuddy";

/// Builder for [`CohereConfig`].
#[derive(Clone, Default, PartialEq)]
pub struct CohereConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    client_name: Option<String>,
}

impl CohereConfigBuilder {
    /// Creates a builder without an API key.
    ///
    /// A provider built from such a configuration refuses every request
    /// with a configuration error.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Sets the API key, `None` leaves the provider unconfigured.
    #[inline]
    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the value of the `X-Client-Name` header.
    #[inline]
    pub fn with_client_name<S: Into<String>>(mut self, client_name: S) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> CohereConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        CohereConfig {
            api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            client_name: self
                .client_name
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
        }
    }
}

impl Debug for CohereConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("client_name", &self.client_name)
            .finish()
    }
}

/// Configuration for the Cohere-compatible provider.
#[derive(Clone, PartialEq)]
pub struct CohereConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: f32,
    pub(crate) client_name: String,
}

impl CohereConfig {
    /// Returns `true` if an API key is present.
    #[inline]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns the model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub(crate) fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

impl Debug for CohereConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("client_name", &self.client_name)
            .finish()
    }
}
