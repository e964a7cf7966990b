use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::history::{self, HistoryStore, MessageLog, PersistedEntry, RESTORE_LIMIT};
use super::message::{Message, Sender};
use super::quick_replies::{suggestions_for, WELCOME_CONTEXT};
use super::render::{render_bot, render_user};
use crate::api::{ChatBackend, ChatRequest};
use crate::error::ApiError;
use crate::logger::{Logger, SessionMetrics};
use crate::utils::write_json_export;

pub const WELCOME_MESSAGE: &str = "Hello! I'm your farming assistant. \
Ask me about crops, market prices, weather or pest control.";

/// Shown for every failed reply, whatever the cause.
pub const ERROR_MESSAGE: &str =
    "Sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Rendering surface the session drives. Implemented by the terminal host and
/// by test doubles.
pub trait ChatView: Send {
    /// Show (`true`) or hide the chat window; the launcher takes the opposite state.
    fn set_visible(&mut self, open: bool);
    fn focus_input(&mut self);
    fn clear_input(&mut self);
    fn scroll_to_bottom(&mut self);
    fn render_message(&mut self, message: &Message, markup: &str);
    fn set_typing(&mut self, typing: bool);
    /// Remove every rendered bubble.
    fn clear_messages(&mut self);
    /// Replace the suggestion row; an empty slice clears it.
    fn show_quick_replies(&mut self, replies: &[&str]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    OpenIdle,
    OpenAwaitingReply,
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Busy,
    Closed,
    NoSuchReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(Rejection),
    Replied,
    Failed,
}

/// An accepted submission waiting for its single backend result.
#[derive(Debug)]
pub struct PendingReply {
    request: ChatRequest,
}

impl PendingReply {
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }
}

#[derive(Serialize)]
struct ChatExport<'a> {
    exported_at: String,
    messages: &'a [Message],
}

/// The chat widget's state: visibility, the busy flag, the message log and
/// the current quick-reply row.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    store: Box<dyn HistoryStore>,
    view: Box<dyn ChatView>,
    logger: Option<Logger>,
    log: MessageLog,
    is_open: bool,
    is_typing: bool,
    quick_replies: &'static [&'static str],
    metrics: SessionMetrics,
}

impl ChatSession {
    /// Build a closed session: render the welcome message and its
    /// suggestions, then restore the most recent persisted messages.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Box<dyn HistoryStore>,
        view: Box<dyn ChatView>,
        logger: Option<Logger>,
    ) -> Self {
        let welcome = Message::bot(WELCOME_MESSAGE);
        let mut session = Self {
            backend,
            store,
            view,
            logger,
            log: MessageLog::with_welcome(welcome.clone()),
            is_open: false,
            is_typing: false,
            quick_replies: &[],
            metrics: SessionMetrics::new(),
        };
        session.view.render_message(&welcome, &render_bot(&welcome.body));
        session.set_quick_replies(WELCOME_CONTEXT);
        session.restore_history();
        session
    }

    fn restore_history(&mut self) {
        let entries = match history::try_load_entries(&*self.store) {
            Ok(entries) => entries,
            Err(e) => {
                self.diagnostic(&format!("Discarding stored chat history: {:#}", e));
                Vec::new()
            }
        };
        for entry in history::take_recent(entries, RESTORE_LIMIT) {
            let message = entry.into_message();
            let markup = markup_for(&message);
            self.view.render_message(&message, &markup);
            self.log.push(message);
        }
    }

    // ── Visibility ──────────────────────────────────────────────────────

    pub fn open(&mut self) {
        if self.is_open {
            return;
        }
        self.is_open = true;
        self.view.set_visible(true);
        self.view.focus_input();
        self.view.scroll_to_bottom();
    }

    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }
        self.is_open = false;
        self.view.set_visible(false);
    }

    pub fn toggle(&mut self) {
        if self.is_open {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn state(&self) -> SessionState {
        match (self.is_open, self.is_typing) {
            (false, _) => SessionState::Closed,
            (true, false) => SessionState::OpenIdle,
            (true, true) => SessionState::OpenAwaitingReply,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    // ── Submission ──────────────────────────────────────────────────────

    /// Validate and record a submission. On success the session is awaiting
    /// a reply and the returned request must be passed to [`Self::complete`].
    pub fn begin_submit(&mut self, input: &str) -> Result<PendingReply, Rejection> {
        let text = input.trim();
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if !self.is_open {
            return Err(Rejection::Closed);
        }
        if self.is_typing {
            return Err(Rejection::Busy);
        }

        self.view.clear_input();

        let message = Message::user(text);
        if let Err(e) = history::append_entry(&*self.store, PersistedEntry::from(&message)) {
            self.diagnostic(&format!("Failed to persist chat history: {:#}", e));
        }
        self.view.render_message(&message, &render_user(text));
        self.log.push(message);
        self.view.scroll_to_bottom();

        self.is_typing = true;
        self.view.set_typing(true);

        self.metrics.chat_requests += 1;
        if let Some(logger) = &self.logger {
            let _ = logger.log_chat_request(text);
        }

        Ok(PendingReply {
            request: ChatRequest {
                message: text.to_string(),
            },
        })
    }

    /// Apply the backend result for `pending` and return to idle.
    pub fn complete(
        &mut self,
        pending: PendingReply,
        outcome: Result<String, ApiError>,
    ) -> SubmitOutcome {
        self.is_typing = false;
        self.view.set_typing(false);

        let result = match outcome {
            Ok(reply) => {
                if let Some(logger) = &self.logger {
                    let _ = logger.log_chat_response(&reply);
                }
                let message = Message::bot(reply);
                self.view.render_message(&message, &render_bot(&message.body));
                self.log.push(message);
                self.set_quick_replies(&pending.request.message);
                self.metrics.chat_replies += 1;
                SubmitOutcome::Replied
            }
            Err(e) => {
                let line = match &e {
                    ApiError::Transport { url, source } => {
                        format!("Network error reaching {}: {}", url, source)
                    }
                    ApiError::Malformed { detail } => {
                        format!("Malformed chat response: {}", detail)
                    }
                    other => format!(
                        "Chat backend failure: {} ({})",
                        other,
                        other.server_message().unwrap_or("no message")
                    ),
                };
                self.diagnostic(&line);
                let message = Message::bot_error(ERROR_MESSAGE);
                self.view.render_message(&message, &render_bot(&message.body));
                self.log.push(message);
                self.metrics.chat_failures += 1;
                SubmitOutcome::Failed
            }
        };

        self.view.scroll_to_bottom();
        result
    }

    /// Submit `input` and await exactly one backend result.
    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        let pending = match self.begin_submit(input) {
            Ok(p) => p,
            Err(reason) => return SubmitOutcome::Rejected(reason),
        };
        let outcome = self.backend.send_chat(pending.request()).await;
        self.complete(pending, outcome)
    }

    /// Submit the text of the `index`-th (0-based) suggestion currently shown.
    pub async fn submit_quick_reply(&mut self, index: usize) -> SubmitOutcome {
        match self.quick_replies.get(index) {
            Some(text) => self.submit(text).await,
            None => SubmitOutcome::Rejected(Rejection::NoSuchReply),
        }
    }

    fn set_quick_replies(&mut self, context: &str) {
        self.quick_replies = suggestions_for(context);
        self.view.show_quick_replies(self.quick_replies);
    }

    pub fn quick_replies(&self) -> &'static [&'static str] {
        self.quick_replies
    }

    // ── History ─────────────────────────────────────────────────────────

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Forget persisted history and drop everything but the welcome message.
    pub fn clear_history(&mut self) -> Result<()> {
        self.store.clear()?;
        self.log.reset();
        self.view.clear_messages();
        if let Some(welcome) = self.log.first() {
            let markup = markup_for(welcome);
            self.view.render_message(welcome, &markup);
        }
        self.set_quick_replies(WELCOME_CONTEXT);
        Ok(())
    }

    /// Write the on-screen log to `dir/chat_history_<timestamp>.json`.
    pub fn export_history(&self, dir: &Path) -> Result<PathBuf> {
        let export = ChatExport {
            exported_at: chrono::Local::now().to_rfc3339(),
            messages: self.log.messages(),
        };
        write_json_export(dir, "chat_history", &export)
    }

    fn diagnostic(&self, line: &str) {
        if let Some(logger) = &self.logger {
            let _ = logger.log_error(line);
        }
    }
}

fn markup_for(message: &Message) -> String {
    match message.sender {
        Sender::User => render_user(&message.body),
        Sender::Bot => render_bot(&message.body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::history::MemoryHistoryStore;
    use crate::chat::message::MessageKind;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum ViewEvent {
        Visible(bool),
        Focus,
        ClearInput,
        Scroll,
        Render(String),
        Typing(bool),
        ClearMessages,
        QuickReplies(Vec<String>),
    }

    #[derive(Clone, Default)]
    struct RecordingView {
        events: Arc<Mutex<Vec<ViewEvent>>>,
    }

    impl RecordingView {
        fn events(&self) -> Vec<ViewEvent> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, e: ViewEvent) {
            self.events.lock().unwrap().push(e);
        }
    }

    impl ChatView for RecordingView {
        fn set_visible(&mut self, open: bool) {
            self.push(ViewEvent::Visible(open));
        }
        fn focus_input(&mut self) {
            self.push(ViewEvent::Focus);
        }
        fn clear_input(&mut self) {
            self.push(ViewEvent::ClearInput);
        }
        fn scroll_to_bottom(&mut self) {
            self.push(ViewEvent::Scroll);
        }
        fn render_message(&mut self, _message: &Message, markup: &str) {
            self.push(ViewEvent::Render(markup.to_string()));
        }
        fn set_typing(&mut self, typing: bool) {
            self.push(ViewEvent::Typing(typing));
        }
        fn clear_messages(&mut self) {
            self.push(ViewEvent::ClearMessages);
        }
        fn show_quick_replies(&mut self, replies: &[&str]) {
            self.push(ViewEvent::QuickReplies(
                replies.iter().map(|r| r.to_string()).collect(),
            ));
        }
    }

    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ApiError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<String, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn send_chat(&self, request: &ChatRequest) -> Result<String, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Malformed { detail: "script exhausted".into() }))
        }
    }

    fn session_with(
        backend: Arc<ScriptedBackend>,
        store: MemoryHistoryStore,
    ) -> (ChatSession, RecordingView) {
        let view = RecordingView::default();
        let session = ChatSession::new(backend, Box::new(store), Box::new(view.clone()), None);
        (session, view)
    }

    #[test]
    fn test_new_session_is_closed_with_welcome() {
        let (session, view) = session_with(ScriptedBackend::with(vec![]), MemoryHistoryStore::new());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].body, WELCOME_MESSAGE);
        assert_eq!(
            session.quick_replies(),
            &["Crop recommendations", "Market prices", "Weather advice", "Pest control"]
        );
        assert!(matches!(view.events()[0], ViewEvent::Render(_)));
    }

    #[test]
    fn test_open_close_side_effects() {
        let (mut session, view) = session_with(ScriptedBackend::with(vec![]), MemoryHistoryStore::new());
        let before = view.events().len();

        session.toggle();
        assert_eq!(session.state(), SessionState::OpenIdle);
        assert_eq!(
            view.events()[before..],
            [ViewEvent::Visible(true), ViewEvent::Focus, ViewEvent::Scroll]
        );

        session.toggle();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(view.events().last(), Some(&ViewEvent::Visible(false)));
    }

    #[tokio::test]
    async fn test_crop_question_example() {
        let backend = ScriptedBackend::with(vec![Ok("Try maize.".to_string())]);
        let (mut session, _view) = session_with(backend.clone(), MemoryHistoryStore::new());
        session.open();

        let outcome = session.submit("What crops should I plant?").await;
        assert_eq!(outcome, SubmitOutcome::Replied);
        assert_eq!(
            backend.requests(),
            vec![ChatRequest { message: "What crops should I plant?".to_string() }]
        );

        let msgs = session.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].sender, Sender::User);
        assert_eq!(msgs[1].body, "What crops should I plant?");
        assert_eq!(msgs[2].sender, Sender::Bot);
        assert_eq!(msgs[2].kind, MessageKind::Normal);
        assert_eq!(msgs[2].body, "Try maize.");
        assert_eq!(
            session.quick_replies(),
            &["Maize farming", "Tea cultivation", "Vegetable growing", "Organic farming"]
        );
        assert_eq!(session.state(), SessionState::OpenIdle);
    }

    #[test]
    fn test_begin_submit_side_effect_order() {
        let (mut session, view) = session_with(ScriptedBackend::with(vec![]), MemoryHistoryStore::new());
        session.open();
        let before = view.events().len();

        let pending = session.begin_submit("  hello  ").unwrap();
        assert_eq!(pending.request().message, "hello");
        assert_eq!(session.state(), SessionState::OpenAwaitingReply);
        assert_eq!(
            view.events()[before..],
            [
                ViewEvent::ClearInput,
                ViewEvent::Render("hello".to_string()),
                ViewEvent::Scroll,
                ViewEvent::Typing(true),
            ]
        );
    }

    #[test]
    fn test_rejects_while_awaiting_reply() {
        let backend = ScriptedBackend::with(vec![]);
        let (mut session, _view) = session_with(backend.clone(), MemoryHistoryStore::new());
        session.open();

        let _pending = session.begin_submit("first").unwrap();
        let len = session.messages().len();

        assert_eq!(session.begin_submit("second").unwrap_err(), Rejection::Busy);
        assert_eq!(session.messages().len(), len);
        assert_eq!(session.state(), SessionState::OpenAwaitingReply);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_whitespace_only() {
        let backend = ScriptedBackend::with(vec![]);
        let (mut session, view) = session_with(backend.clone(), MemoryHistoryStore::new());
        session.open();
        let before = view.events().len();

        assert_eq!(session.submit("   \n\t").await, SubmitOutcome::Rejected(Rejection::Empty));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(view.events().len(), before);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_when_closed() {
        let backend = ScriptedBackend::with(vec![]);
        let (mut session, _view) = session_with(backend.clone(), MemoryHistoryStore::new());

        assert_eq!(session.submit("hi").await, SubmitOutcome::Rejected(Rejection::Closed));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_status_error_yields_single_error_message() {
        let backend = ScriptedBackend::with(vec![Err(ApiError::Status {
            status: 500,
            message: Some("Failed to process message".to_string()),
        })]);
        let (mut session, view) = session_with(backend, MemoryHistoryStore::new());
        session.open();

        assert_eq!(session.submit("market prices?").await, SubmitOutcome::Failed);
        let errors: Vec<_> = session.messages().iter().filter(|m| m.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].body, ERROR_MESSAGE);
        assert_eq!(errors[0].sender, Sender::Bot);
        assert_eq!(session.state(), SessionState::OpenIdle);
        assert!(view.events().contains(&ViewEvent::Typing(false)));
    }

    #[tokio::test]
    async fn test_malformed_and_status_share_user_message() {
        let backend = ScriptedBackend::with(vec![
            Err(ApiError::Malformed { detail: "missing `response` field".into() }),
            Err(ApiError::Status { status: 502, message: None }),
        ]);
        let (mut session, _view) = session_with(backend, MemoryHistoryStore::new());
        session.open();

        session.submit("one").await;
        session.submit("two").await;
        let errors: Vec<_> = session
            .messages()
            .iter()
            .filter(|m| m.is_error())
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(errors, vec![ERROR_MESSAGE.to_string(), ERROR_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_only_user_messages_persisted() {
        let store = MemoryHistoryStore::new();
        let backend = ScriptedBackend::with(vec![Ok("Sell after harvest.".to_string())]);
        let view = RecordingView::default();
        let mut session = ChatSession::new(backend, Box::new(store), Box::new(view), None);
        session.open();
        session.submit("When to sell?").await;

        let raw = session.store.read().unwrap().unwrap();
        let entries: Vec<PersistedEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "When to sell?");
        assert_eq!(entries[0].sender, Sender::User);
    }

    #[test]
    fn test_restores_last_twenty_after_welcome() {
        let store = MemoryHistoryStore::new();
        for i in 0..30 {
            history::append_entry(
                &store,
                PersistedEntry::from(&Message::user(format!("q{i}"))),
            )
            .unwrap();
        }
        let (session, _view) = session_with(ScriptedBackend::with(vec![]), store);
        let msgs = session.messages();
        assert_eq!(msgs.len(), 21);
        assert_eq!(msgs[0].body, WELCOME_MESSAGE);
        assert_eq!(msgs[1].body, "q10");
        assert_eq!(msgs[20].body, "q29");
    }

    #[test]
    fn test_corrupt_history_starts_empty() {
        let store = MemoryHistoryStore::with_raw("[{\"message\": 12");
        let (session, _view) = session_with(ScriptedBackend::with(vec![]), store);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_log_never_exceeds_cap() {
        let replies = (0..40).map(|i| Ok(format!("reply {i}"))).collect();
        let (mut session, _view) = session_with(ScriptedBackend::with(replies), MemoryHistoryStore::new());
        session.open();
        for i in 0..40 {
            session.submit(&format!("question {i}")).await;
            assert!(session.messages().len() <= history::MAX_LOG_ENTRIES);
        }
        assert_eq!(session.messages()[0].body, WELCOME_MESSAGE);
        assert_eq!(session.messages().last().unwrap().body, "reply 39");
    }

    #[tokio::test]
    async fn test_quick_reply_submits_its_text() {
        let backend = ScriptedBackend::with(vec![Ok("Prices are up.".to_string())]);
        let (mut session, _view) = session_with(backend.clone(), MemoryHistoryStore::new());
        session.open();

        // Welcome row: index 1 is "Market prices"
        assert_eq!(session.submit_quick_reply(1).await, SubmitOutcome::Replied);
        assert_eq!(backend.requests()[0].message, "Market prices");
        assert_eq!(session.quick_replies()[0], "Maize prices");

        assert_eq!(
            session.submit_quick_reply(9).await,
            SubmitOutcome::Rejected(Rejection::NoSuchReply)
        );
    }

    #[tokio::test]
    async fn test_unmatched_reply_clears_suggestions() {
        let backend = ScriptedBackend::with(vec![Ok("You're welcome.".to_string())]);
        let (mut session, view) = session_with(backend, MemoryHistoryStore::new());
        session.open();
        session.submit("Thanks!").await;
        assert!(session.quick_replies().is_empty());
        assert!(view.events().contains(&ViewEvent::QuickReplies(vec![])));
    }

    #[tokio::test]
    async fn test_clear_history() {
        let backend = ScriptedBackend::with(vec![Ok("ok".to_string())]);
        let (mut session, _view) = session_with(backend, MemoryHistoryStore::new());
        session.open();
        session.submit("plant beans?").await;
        assert_eq!(session.messages().len(), 3);

        session.clear_history().unwrap();
        assert_eq!(session.messages().len(), 1);
        assert!(history::restore_recent(&*session.store, RESTORE_LIMIT).is_empty());
    }

    #[tokio::test]
    async fn test_clear_history_redraws_view() {
        let backend = ScriptedBackend::with(vec![Ok("ok".to_string())]);
        let (mut session, view) = session_with(backend, MemoryHistoryStore::new());
        session.open();
        session.submit("plant beans?").await;
        let before = view.events().len();

        session.clear_history().unwrap();
        let events = view.events()[before..].to_vec();
        assert_eq!(events[0], ViewEvent::ClearMessages);
        assert_eq!(events[1], ViewEvent::Render(render_bot(WELCOME_MESSAGE)));
        assert_eq!(
            events[2],
            ViewEvent::QuickReplies(
                ["Crop recommendations", "Market prices", "Weather advice", "Pest control"]
                    .iter()
                    .map(|r| r.to_string())
                    .collect()
            )
        );
    }

    /// Store that counts reads of the durable value.
    struct CountingStore {
        inner: MemoryHistoryStore,
        reads: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl HistoryStore for CountingStore {
        fn read(&self) -> Result<Option<String>> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.read()
        }
        fn write(&self, raw: &str) -> Result<()> {
            self.inner.write(raw)
        }
        fn clear(&self) -> Result<()> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_restore_reads_store_once() {
        let inner = MemoryHistoryStore::new();
        for i in 0..25 {
            history::append_entry(&inner, PersistedEntry::from(&Message::user(format!("q{i}"))))
                .unwrap();
        }
        let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let store = CountingStore {
            inner,
            reads: reads.clone(),
        };
        let session = ChatSession::new(
            ScriptedBackend::with(vec![]),
            Box::new(store),
            Box::new(RecordingView::default()),
            None,
        );
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(session.messages().len(), 21);
        assert_eq!(session.messages()[1].body, "q5");
    }
}
