//! Collaborators of a [`Session`](crate::Session).
//!
//! A session reads the document text through a [`DocumentSource`] every
//! time it builds a request, and loads and saves its conversation through a
//! [`HistoryStore`].

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::conversation::ConversationHistory;

/// Error returned by a [`HistoryStore`].
#[derive(Debug)]
pub struct StoreError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StoreError {
    /// Creates an error with a message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error caused by another error.
    #[inline]
    pub fn with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

/// Persistent storage for conversations, keyed by document id.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the conversation of a document.
    ///
    /// A document without a stored conversation has an empty history.
    async fn load_history(
        &self,
        document_id: &str,
    ) -> Result<ConversationHistory, StoreError>;

    /// Replaces the stored conversation of a document.
    async fn save_history(
        &self,
        document_id: &str,
        history: &ConversationHistory,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    async fn load_history(
        &self,
        document_id: &str,
    ) -> Result<ConversationHistory, StoreError> {
        (**self).load_history(document_id).await
    }

    async fn save_history(
        &self,
        document_id: &str,
        history: &ConversationHistory,
    ) -> Result<(), StoreError> {
        (**self).save_history(document_id, history).await
    }
}

/// A [`HistoryStore`] that keeps conversations in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryHistoryStore {
    histories: Arc<Mutex<HashMap<String, ConversationHistory>>>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored conversation of a document, if any.
    #[inline]
    pub fn get(&self, document_id: &str) -> Option<ConversationHistory> {
        self.histories.lock().get(document_id).cloned()
    }

    /// Stores a conversation directly.
    #[inline]
    pub fn insert<S: Into<String>>(
        &self,
        document_id: S,
        history: ConversationHistory,
    ) {
        self.histories.lock().insert(document_id.into(), history);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load_history(
        &self,
        document_id: &str,
    ) -> Result<ConversationHistory, StoreError> {
        Ok(self.get(document_id).unwrap_or_default())
    }

    async fn save_history(
        &self,
        document_id: &str,
        history: &ConversationHistory,
    ) -> Result<(), StoreError> {
        self.insert(document_id, history.clone());
        Ok(())
    }
}

/// Supplies the document text a conversation is about.
///
/// The text is read once per request, right before the request is built.
pub trait DocumentSource: Send + Sync {
    /// Returns the authoritative text of the document at this moment.
    fn current_text(&self) -> String;
}

/// A [`DocumentSource`] backed by a closure.
///
/// Created by [`document_fn`].
#[derive(Clone, Copy, Debug)]
pub struct DocumentFn<F>(F);

/// Creates a [`DocumentSource`] that calls `f` for every request.
#[inline]
pub fn document_fn<F>(f: F) -> DocumentFn<F>
where
    F: Fn() -> String + Send + Sync,
{
    DocumentFn(f)
}

impl<F> DocumentSource for DocumentFn<F>
where
    F: Fn() -> String + Send + Sync,
{
    #[inline]
    fn current_text(&self) -> String {
        (self.0)()
    }
}

impl DocumentSource for str {
    #[inline]
    fn current_text(&self) -> String {
        self.to_owned()
    }
}

impl DocumentSource for String {
    #[inline]
    fn current_text(&self) -> String {
        self.clone()
    }
}

impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    #[inline]
    fn current_text(&self) -> String {
        (**self).current_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryHistoryStore::new();
        assert!(store.load_history("essay").await.unwrap().is_empty());

        let history: ConversationHistory =
            [Turn::user("Hi"), Turn::assistant("Hello")].into_iter().collect();
        store.save_history("essay", &history).await.unwrap();

        let shared: Arc<dyn HistoryStore> = Arc::new(store.clone());
        assert_eq!(shared.load_history("essay").await.unwrap(), history);
        assert!(shared.load_history("other").await.unwrap().is_empty());
    }

    #[test]
    fn test_document_sources() {
        let text = String::from("draft");
        assert_eq!(text.current_text(), "draft");
        assert_eq!(
            document_fn(|| "from closure".to_owned()).current_text(),
            "from closure"
        );
        let shared: Arc<dyn DocumentSource> = Arc::new("shared".to_owned());
        assert_eq!(shared.current_text(), "shared");
    }

    #[test]
    fn test_error_display() {
        let io_err = std::io::Error::other("disk full");
        let err = StoreError::with_source("failed to write history", io_err);
        assert_eq!(err.to_string(), "failed to write history: disk full");
        assert!(StdError::source(&err).is_some());
    }
}
