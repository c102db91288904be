use std::sync::Arc;

use buddy_model::ModelProvider;

use super::{Callbacks, Session};
use crate::conversation::Turn;
use crate::model_client::ModelClient;
use crate::store::{DocumentSource, HistoryStore, MemoryHistoryStore};

const DEFAULT_DOCUMENT_ID: &str = "untitled";

/// [`Session`] builder.
pub struct SessionBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) document_id: String,
    pub(crate) history_store: Arc<dyn HistoryStore>,
    pub(crate) document: Arc<dyn DocumentSource>,
    pub(crate) callbacks: Callbacks,
}

impl SessionBuilder {
    /// Creates a new builder with the specified model provider.
    ///
    /// Without further settings the session talks about an empty document
    /// and keeps its conversation in memory.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            document_id: DEFAULT_DOCUMENT_ID.to_owned(),
            history_store: Arc::new(MemoryHistoryStore::new()),
            document: Arc::new(String::new()),
            callbacks: Callbacks::default(),
        }
    }

    /// Sets the id of the document the conversation belongs to.
    #[inline]
    pub fn with_document_id<S: Into<String>>(mut self, document_id: S) -> Self {
        self.document_id = document_id.into();
        self
    }

    /// Sets where the conversation is loaded from and saved to.
    #[inline]
    pub fn with_history_store(
        mut self,
        store: impl HistoryStore + 'static,
    ) -> Self {
        self.history_store = Arc::new(store);
        self
    }

    /// Sets where the document text is read from.
    #[inline]
    pub fn with_document_source(
        mut self,
        source: impl DocumentSource + 'static,
    ) -> Self {
        self.document = Arc::new(source);
        self
    }

    /// Attaches a callback to be invoked when a turn is appended.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_turn = Some(Box::new(on_turn));
        self
    }

    /// Attaches a callback to be invoked for every streamed fragment.
    #[inline]
    pub fn on_fragment(
        mut self,
        on_fragment: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_fragment = Some(Box::new(on_fragment));
        self
    }

    /// Attaches a callback to be invoked when a reply starts or stops
    /// being generated.
    #[inline]
    pub fn on_pending(
        mut self,
        on_pending: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_pending = Some(Box::new(on_pending));
        self
    }

    /// Builds the session, loading the stored conversation.
    ///
    /// A conversation that fails to load is logged and the session starts
    /// empty.
    pub async fn build(self) -> Session {
        let history =
            match self.history_store.load_history(&self.document_id).await {
                Ok(history) => history,
                Err(err) => {
                    error!(
                        "failed to load the conversation of {:?}: {err}",
                        self.document_id
                    );
                    Default::default()
                }
            };
        debug!(
            "loaded {} turns for {:?}",
            history.len(),
            self.document_id
        );
        Session::from_builder(self, history)
    }
}
