//! The document body being discussed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::DocumentSource;

#[derive(Debug, Default)]
struct Inner {
    saved: String,
    draft: Option<String>,
}

/// A document that can be edited in place.
///
/// The saved text stays untouched while an edit is in progress. Readers
/// that need what the user currently sees should use
/// [`current_text`](Self::current_text), which prefers the draft.
///
/// Clones share the same underlying document.
#[derive(Clone, Debug, Default)]
pub struct EditableDocument {
    inner: Arc<Mutex<Inner>>,
}

impl EditableDocument {
    /// Creates a document with saved content.
    #[inline]
    pub fn new<S: Into<String>>(saved: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                saved: saved.into(),
                draft: None,
            })),
        }
    }

    /// Starts editing by copying the saved content into a draft.
    ///
    /// Does nothing if an edit is already in progress.
    pub fn begin_edit(&self) {
        let mut inner = self.inner.lock();
        if inner.draft.is_none() {
            inner.draft = Some(inner.saved.clone());
        }
    }

    /// Replaces the draft text, starting an edit if needed.
    pub fn update_draft<S: Into<String>>(&self, text: S) {
        self.inner.lock().draft = Some(text.into());
    }

    /// Promotes the draft to saved content and ends the edit.
    ///
    /// Returns the new saved content, or `None` if nothing was being
    /// edited.
    pub fn save(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let draft = inner.draft.take()?;
        inner.saved = draft;
        Some(inner.saved.clone())
    }

    /// Records `text` as the saved content once it has been written
    /// elsewhere.
    ///
    /// The edit ends unless the draft changed after `text` was taken from
    /// it.
    pub fn mark_saved<S: Into<String>>(&self, text: S) {
        let mut inner = self.inner.lock();
        let text = text.into();
        if inner.draft.as_ref() == Some(&text) {
            inner.draft = None;
        }
        inner.saved = text;
    }

    /// Discards the draft.
    pub fn cancel_edit(&self) {
        self.inner.lock().draft = None;
    }

    /// Returns `true` if an edit is in progress.
    #[inline]
    pub fn is_editing(&self) -> bool {
        self.inner.lock().draft.is_some()
    }

    /// Returns the draft, or `None` if nothing is being edited.
    #[inline]
    pub fn draft(&self) -> Option<String> {
        self.inner.lock().draft.clone()
    }

    /// Returns the saved content.
    #[inline]
    pub fn saved_text(&self) -> String {
        self.inner.lock().saved.clone()
    }

    /// Returns the draft while editing, otherwise the saved content.
    pub fn current_text(&self) -> String {
        let inner = self.inner.lock();
        inner.draft.as_ref().unwrap_or(&inner.saved).clone()
    }
}

impl DocumentSource for EditableDocument {
    #[inline]
    fn current_text(&self) -> String {
        EditableDocument::current_text(self)
    }
}
