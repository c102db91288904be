use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use buddy_model::{
    ErrorKind as ModelErrorKind, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use buddy_test_model::{PresetResponse, TestModelProvider};
use parking_lot::Mutex;
use tokio::time::sleep;

use super::state::APOLOGY;
use crate::conversation::{ConversationHistory, Role, Turn};
use crate::document::EditableDocument;
use crate::store::{HistoryStore, MemoryHistoryStore, StoreError};
use crate::{ErrorKind, SessionBuilder};

#[derive(Default)]
struct Recorded {
    turns: Vec<Turn>,
    fragments: Vec<String>,
    pending: Vec<bool>,
}

fn recording_builder(
    provider: TestModelProvider,
) -> (SessionBuilder, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let builder = SessionBuilder::with_model_provider(provider)
        .with_document_id("essay")
        .on_turn({
            let recorded = Arc::clone(&recorded);
            move |turn| recorded.lock().turns.push(turn.clone())
        })
        .on_fragment({
            let recorded = Arc::clone(&recorded);
            move |fragment| recorded.lock().fragments.push(fragment.to_owned())
        })
        .on_pending({
            let recorded = Arc::clone(&recorded);
            move |pending| recorded.lock().pending.push(pending)
        });
    (builder, recorded)
}

#[tokio::test]
async fn test_successful_exchange() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_fragments(["Hel", "lo", " world"]));
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider.clone());
    let session = builder.with_history_store(store.clone()).build().await;

    let turn = session.send_message("  Say hello  ").await.unwrap();
    assert_eq!(turn, Turn::assistant("Hello world"));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.turns()[0], Turn::user("Say hello"));
    assert_eq!(history.turns()[1], Turn::assistant("Hello world"));

    let recorded = recorded.lock();
    assert_eq!(recorded.fragments, ["Hel", "lo", " world"]);
    assert_eq!(recorded.pending, [true, false]);
    assert_eq!(recorded.turns, history.turns());

    let snapshot = session.snapshot();
    assert!(!snapshot.pending);
    assert_eq!(snapshot.streaming, None);
    assert_eq!(store.get("essay"), Some(history));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Say hello");
    assert!(requests[0].history.is_empty());
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let provider = TestModelProvider::default();
    let (builder, recorded) = recording_builder(provider.clone());
    let session = builder.build().await;

    for message in ["", "   ", "\n\t"] {
        let err = session.send_message(message).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(session.history().is_empty());
    assert!(provider.requests().is_empty());
    assert!(recorded.lock().pending.is_empty());
}

#[tokio::test]
async fn test_rejected_request() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::rejected(503, "service unavailable"));
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider);
    let session = builder.with_history_store(store.clone()).build().await;

    let err = session.send_message("Hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_ne!(err.kind(), ErrorKind::StreamInterrupted);
    assert_eq!(err.status(), Some(503));
    assert!(err.reason().contains("service unavailable"));

    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.last().map(Turn::role), Some(Role::User));
    assert!(!session.is_pending());
    assert_eq!(recorded.lock().pending, [true, false]);
    assert_eq!(store.get("essay"), None);
}

#[tokio::test]
async fn test_interrupted_stream() {
    let mut provider = TestModelProvider::default();
    provider.add_response(
        PresetResponse::with_fragments(["Once ", "upon ", "a time"])
            .interrupted_after(2),
    );
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider);
    let session = builder.with_history_store(store.clone()).build().await;

    let err = session.send_message("Tell me a story").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StreamInterrupted);

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.turns()[1], Turn::assistant(APOLOGY));
    assert_eq!(recorded.lock().fragments, ["Once ", "upon "]);
    assert!(!session.is_pending());
    assert_eq!(store.get("essay"), None);
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::unreachable("connection refused"));
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider);
    let session = builder.with_history_store(store.clone()).build().await;

    let err = session.send_message("Hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), None);
    assert!(err.reason().contains("connection refused"));

    let history = session.history();
    assert_eq!(history.turns(), [Turn::user("Hi"), Turn::assistant(APOLOGY)]);
    assert!(!session.is_pending());
    assert_eq!(recorded.lock().pending, [true, false]);
    assert_eq!(store.get("essay"), None);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submit_is_rejected() {
    let mut provider = TestModelProvider::default();
    provider.set_delay(Duration::from_secs(1));
    provider.add_response(PresetResponse::with_fragments(["Sure."]));

    let (builder, _recorded) = recording_builder(provider.clone());
    let session = builder.build().await;

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("First").await }
    });
    sleep(Duration::from_millis(500)).await;
    assert!(session.is_pending());
    assert_eq!(session.snapshot().streaming.as_deref(), Some(""));

    let err = session.send_message("Second").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(session.history().len(), 1);

    let turn = task.await.unwrap().unwrap();
    assert_eq!(turn.message(), "Sure.");
    assert_eq!(session.history().len(), 2);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn test_history_survives_reload() {
    let store = MemoryHistoryStore::new();
    let original: ConversationHistory = [
        Turn::user("Is the intro clear?"),
        Turn::assistant("Mostly, yes."),
    ]
    .into_iter()
    .collect();
    store.insert("essay", original.clone());

    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_fragments(["Add a ", "thesis."]));
    let session = SessionBuilder::with_model_provider(provider.clone())
        .with_document_id("essay")
        .with_history_store(store.clone())
        .build()
        .await;
    assert_eq!(session.history(), original);

    session.send_message("What is missing?").await.unwrap();

    let requests = provider.requests();
    assert_eq!(
        requests[0].history,
        vec![
            ModelMessage::User("Is the intro clear?".to_owned()),
            ModelMessage::Assistant("Mostly, yes.".to_owned()),
        ]
    );

    let reloaded = SessionBuilder::with_model_provider(TestModelProvider::default())
        .with_document_id("essay")
        .with_history_store(store)
        .build()
        .await;
    let history = reloaded.history();
    assert_eq!(history.len(), original.len() + 2);
    assert_eq!(&history.turns()[..2], original.turns());
    assert_eq!(history.turns()[2], Turn::user("What is missing?"));
    assert_eq!(history.turns()[3], Turn::assistant("Add a thesis."));
}

#[tokio::test]
async fn test_document_is_read_per_request() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_fragments(["One."]));
    provider.add_response(PresetResponse::with_fragments(["Two."]));

    let document = EditableDocument::new("Saved text.");
    let session = SessionBuilder::with_model_provider(provider.clone())
        .with_document_source(document.clone())
        .build()
        .await;

    session.send_message("First").await.unwrap();
    document.begin_edit();
    document.update_draft("Unsaved draft.");
    session.send_message("Second").await.unwrap();

    let requests = provider.requests();
    let first = requests[0].preamble.as_deref().unwrap();
    let second = requests[1].preamble.as_deref().unwrap();
    assert!(first.contains("Saved text."));
    assert!(second.contains("Unsaved draft."));
    assert!(!second.contains("Saved text."));
    assert_eq!(
        requests[1].history,
        vec![
            ModelMessage::User("First".to_owned()),
            ModelMessage::Assistant("One.".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_failed_turns_stay_in_context() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::rejected(500, "boom"));
    provider.add_response(PresetResponse::with_fragments(["Hi again."]));

    let session = SessionBuilder::with_model_provider(provider.clone())
        .build()
        .await;
    session.send_message("Hello?").await.unwrap_err();
    session.send_message("Anyone?").await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests[1].history, vec![ModelMessage::User("Hello?".to_owned())]);
    assert_eq!(requests[1].message, "Anyone?");
}

#[tokio::test(start_paused = true)]
async fn test_cancel() {
    let mut provider = TestModelProvider::default();
    provider.set_delay(Duration::from_secs(1));
    provider.add_response(PresetResponse::with_fragments(["a", "b", "c"]));
    provider.add_response(PresetResponse::with_fragments(["Done."]));
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider);
    let session = builder.with_history_store(store.clone()).build().await;
    assert!(!session.cancel());

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Go").await }
    });
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(session.snapshot().streaming.as_deref(), Some("a"));
    assert!(session.cancel());

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.turns, [Turn::user("Go")]);
    assert_eq!(snapshot.streaming, None);
    assert!(!snapshot.pending);
    assert_eq!(store.get("essay"), None);
    assert_eq!(recorded.lock().pending, [true, false]);

    // The session accepts new messages afterwards.
    session.send_message("Again").await.unwrap();
    assert_eq!(session.history().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_call_releases_the_slot() {
    let mut provider = TestModelProvider::default();
    provider.set_delay(Duration::from_secs(1));
    provider.add_response(PresetResponse::with_fragments(["slow"]));

    let session = SessionBuilder::with_model_provider(provider).build().await;
    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("Hi").await }
    });
    sleep(Duration::from_millis(500)).await;
    assert!(session.is_pending());

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!session.is_pending());
    assert_eq!(session.history().len(), 1);
}

/// Holds the first save back for ten seconds.
struct SlowFirstSave {
    inner: MemoryHistoryStore,
    saves: Mutex<usize>,
}

#[async_trait]
impl HistoryStore for SlowFirstSave {
    async fn load_history(
        &self,
        document_id: &str,
    ) -> Result<ConversationHistory, StoreError> {
        self.inner.load_history(document_id).await
    }

    async fn save_history(
        &self,
        document_id: &str,
        history: &ConversationHistory,
    ) -> Result<(), StoreError> {
        let first = {
            let mut saves = self.saves.lock();
            *saves += 1;
            *saves == 1
        };
        if first {
            sleep(Duration::from_secs(10)).await;
        }
        self.inner.save_history(document_id, history).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_saves_do_not_overlap() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_fragments(["First."]));
    provider.add_response(PresetResponse::with_fragments(["Second."]));
    let store = MemoryHistoryStore::new();

    let (builder, recorded) = recording_builder(provider);
    let session = builder
        .with_history_store(SlowFirstSave {
            inner: store.clone(),
            saves: Mutex::new(0),
        })
        .build()
        .await;

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("one").await }
    });
    sleep(Duration::from_secs(1)).await;

    // The reply is committed but its save is still running.
    let snapshot = session.snapshot();
    assert_eq!(snapshot.turns.len(), 2);
    assert_eq!(snapshot.streaming, None);
    assert!(snapshot.pending);
    assert!(!session.cancel());
    assert_eq!(store.get("essay"), None);

    let err = session.send_message("two").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_eq!(session.history().len(), 2);

    task.await.unwrap().unwrap();
    assert!(!session.is_pending());
    assert_eq!(store.get("essay").map(|h| h.len()), Some(2));

    session.send_message("two").await.unwrap();
    assert_eq!(store.get("essay"), Some(session.history()));
    assert_eq!(session.history().len(), 4);
    assert_eq!(recorded.lock().pending, [true, false, true, false]);
}

struct FailingStore {
    saves: Arc<Mutex<usize>>,
}

#[async_trait]
impl HistoryStore for FailingStore {
    async fn load_history(
        &self,
        _document_id: &str,
    ) -> Result<ConversationHistory, StoreError> {
        Err(StoreError::new("corrupted file"))
    }

    async fn save_history(
        &self,
        _document_id: &str,
        _history: &ConversationHistory,
    ) -> Result<(), StoreError> {
        *self.saves.lock() += 1;
        Err(StoreError::new("disk full"))
    }
}

#[tokio::test]
async fn test_store_failures_are_not_fatal() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::with_fragments(["Fine."]));
    let saves = Arc::new(Mutex::new(0));

    let session = SessionBuilder::with_model_provider(provider)
        .with_history_store(FailingStore {
            saves: Arc::clone(&saves),
        })
        .build()
        .await;
    assert!(session.history().is_empty());

    let turn = session.send_message("Hi").await.unwrap();
    assert_eq!(turn.message(), "Fine.");
    assert_eq!(session.history().len(), 2);
    assert_eq!(*saves.lock(), 1);
}

#[derive(Debug)]
struct MissingKey;

impl Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("API key is not configured")
    }
}

impl StdError for MissingKey {}

impl ModelProviderError for MissingKey {
    fn kind(&self) -> ModelErrorKind {
        ModelErrorKind::Configuration
    }
}

struct UnconfiguredProvider;

impl ModelProvider for UnconfiguredProvider {
    type Error = MissingKey;
    type Response = NeverResponse;

    fn check_config(&self) -> Result<(), Self::Error> {
        Err(MissingKey)
    }

    fn send_request(
        &self,
        _req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(Err(MissingKey))
    }
}

struct NeverResponse;

impl ModelResponse for NeverResponse {
    type Error = MissingKey;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(None))
    }
}

#[tokio::test]
async fn test_missing_configuration() {
    let pending = Arc::new(Mutex::new(Vec::new()));
    let session = SessionBuilder::with_model_provider(UnconfiguredProvider)
        .on_pending({
            let pending = Arc::clone(&pending);
            move |value| pending.lock().push(value)
        })
        .build()
        .await;

    let err = session.send_message("Hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(session.history().is_empty());
    assert!(pending.lock().is_empty());
}
