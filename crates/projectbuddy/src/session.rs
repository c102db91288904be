use buddy_core::conversation::Turn;
use buddy_core::document::EditableDocument;
use buddy_core::store::StoreError;
use buddy_core::{Error, Session, SessionBuilder};
use buddy_model::ModelProvider;

use crate::project::Project;
use crate::store::ProjectStore;

/// A project session builder.
///
/// See [`ProjectSession`].
pub struct ProjectSessionBuilder {
    session_builder: SessionBuilder,
    store: ProjectStore,
}

impl ProjectSessionBuilder {
    /// Creates a builder with a model provider and the store holding the
    /// projects.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
        store: ProjectStore,
    ) -> Self {
        let session_builder = SessionBuilder::with_model_provider(provider)
            .with_history_store(store.clone());
        Self {
            session_builder,
            store,
        }
    }

    /// Attaches a callback to be invoked when a turn is appended.
    #[inline]
    pub fn on_turn(
        mut self,
        on_turn: impl Fn(&Turn) + Send + Sync + 'static,
    ) -> Self {
        self.session_builder = self.session_builder.on_turn(on_turn);
        self
    }

    /// Attaches a callback to be invoked for every streamed fragment.
    #[inline]
    pub fn on_fragment(
        mut self,
        on_fragment: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.session_builder = self.session_builder.on_fragment(on_fragment);
        self
    }

    /// Attaches a callback to be invoked when a reply starts or stops
    /// being generated.
    #[inline]
    pub fn on_pending(
        mut self,
        on_pending: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.session_builder = self.session_builder.on_pending(on_pending);
        self
    }

    /// Opens the conversation of a stored project.
    pub async fn open(self, project_id: &str) -> Result<ProjectSession, StoreError> {
        let project = self.store.load(project_id).await?.ok_or_else(|| {
            StoreError::new(format!("project {project_id:?} not found"))
        })?;
        let document = EditableDocument::new(project.content.as_str());
        let session = self
            .session_builder
            .with_document_id(project.id.as_str())
            .with_document_source(document.clone())
            .build()
            .await;

        Ok(ProjectSession {
            session,
            document,
            store: self.store,
            project,
        })
    }
}

/// A chat session about a project document, like a page that shows the
/// document next to its conversation.
///
/// The session is basically a wrapper around [`Session`] that keeps the
/// document in sync with the project store.
pub struct ProjectSession {
    session: Session,
    document: EditableDocument,
    store: ProjectStore,
    project: Project,
}

impl ProjectSession {
    /// Sends a message about the document.
    #[inline]
    pub async fn send_message(&self, message: &str) -> Result<Turn, Error> {
        self.session.send_message(message).await
    }

    /// Returns the underlying conversation.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the document, including any unsaved draft.
    #[inline]
    pub fn document(&self) -> &EditableDocument {
        &self.document
    }

    /// Returns the project as it was last loaded or saved.
    #[inline]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Saves the draft, if any, into the project store.
    ///
    /// Returns `false` if there was nothing to save. The draft is kept if
    /// the store cannot be written.
    pub async fn save_document(&mut self) -> Result<bool, StoreError> {
        let Some(content) = self.document.draft() else {
            return Ok(false);
        };
        self.project = self
            .store
            .save_document(&self.project.id, &self.project.title, &content)
            .await?;
        self.document.mark_saved(content);
        Ok(true)
    }
}
