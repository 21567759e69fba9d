//! The client sync controller.
//!
//! # Design
//! `SyncController` owns a `SyncState` and is the only thing that mutates it.
//! Every operation follows the same shape: build a request with `ApiClient`,
//! await the `Transport`, parse, then fold the outcome into state and notify
//! observers. Failures never escape as panics; each operation returns its
//! `ApiError` after the state already reflects it.
//!
//! The controller is single-threaded (`!Send`). State sits in a `RefCell` and
//! no borrow is held across an `.await`, so several operations may be in
//! flight at once on one thread (`tokio::join!`, a `LocalSet`). Independent
//! actions are not ordered against each other: two refreshes can race. When
//! `discard_stale_fetches` is on, a todo-list result is dropped if a fetch
//! issued after it has already been applied.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{CreateTodo, SendMessage, Todo, TodoId};

/// Shown when a message could not be delivered and the backend gave no reason.
pub const SEND_FALLBACK: &str = "Failed to send message";

/// Reachability of the backend as last observed by a health check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Checking,
    Connected,
    Error,
}

/// Outcome of the last message exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// The backend's `response` text.
    Response(String),
    /// Human-readable failure, already prefixed with `Error:`.
    Error(String),
}

impl Incoming {
    pub fn text(&self) -> &str {
        match self {
            Incoming::Response(text) | Incoming::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Incoming::Error(_))
    }
}

/// Everything a view renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub connection: ConnectionStatus,
    pub message_draft: String,
    pub last_response: Option<Incoming>,
    /// Result of the most recently applied successful fetch.
    pub todos: Vec<Todo>,
    pub todo_draft: String,
    /// True while a message is in flight.
    pub loading: bool,
}

/// Handle returned by [`SyncController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Rc<dyn Fn(&SyncState)>;

pub struct SyncController<T = UreqTransport> {
    api: ApiClient,
    transport: T,
    discard_stale_fetches: bool,
    state: RefCell<SyncState>,
    observers: RefCell<Vec<(SubscriptionId, Observer)>>,
    next_subscription: Cell<u64>,
    fetch_issued: Cell<u64>,
    fetch_applied: Cell<u64>,
}

impl SyncController<UreqTransport> {
    /// Controller talking to a real backend over `ureq`.
    pub fn connect(config: &ClientConfig) -> Self {
        Self::new(config, UreqTransport::new(config))
    }
}

impl<T: Transport> SyncController<T> {
    pub fn new(config: &ClientConfig, transport: T) -> Self {
        Self {
            api: ApiClient::new(&config.base_url),
            transport,
            discard_stale_fetches: config.discard_stale_fetches,
            state: RefCell::new(SyncState::default()),
            observers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            fetch_issued: Cell::new(0),
            fetch_applied: Cell::new(0),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Register a callback run after every state mutation.
    ///
    /// Callbacks receive a snapshot of the new state and may call back into
    /// the controller, including to unsubscribe themselves. A callback added
    /// or removed during a notification takes effect from the next one.
    pub fn subscribe(&self, observer: impl Fn(&SyncState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn set_message_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.message_draft = text);
    }

    pub fn set_todo_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.todo_draft = text);
    }

    /// Startup sequence: health check and first todo fetch, concurrently.
    pub async fn initialize(&self) {
        let _ = tokio::join!(self.check_health(), self.fetch_todos());
    }

    /// GET /health. Only this operation changes `connection`.
    pub async fn check_health(&self) -> Result<(), ApiError> {
        let result = self.send(self.api.build_health()).await.and_then(|r| self.api.parse_health(r));
        match &result {
            Ok(()) => info!(base_url = self.api.base_url(), "connected to backend"),
            Err(e) => warn!(error = %e, "backend health check failed"),
        }
        let status = if result.is_ok() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Error
        };
        self.update(|state| state.connection = status);
        result
    }

    /// Re-check health every `interval` until the returned future is dropped.
    pub async fn poll_health(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = self.check_health().await;
        }
    }

    /// GET /api/todos, replacing the collection on success.
    pub async fn fetch_todos(&self) -> Result<(), ApiError> {
        let seq = self.fetch_issued.get() + 1;
        self.fetch_issued.set(seq);

        let result = self
            .send(self.api.build_list_todos())
            .await
            .and_then(|r| self.api.parse_list_todos(r));
        let todos = match result {
            Ok(todos) => todos,
            Err(e) => {
                warn!(error = %e, "failed to fetch todos");
                return Err(e);
            }
        };

        if self.discard_stale_fetches && seq < self.fetch_applied.get() {
            debug!(seq, applied = self.fetch_applied.get(), "discarding stale todo list");
            return Ok(());
        }
        self.fetch_applied.set(seq);
        debug!(count = todos.len(), "fetched todos");
        self.update(|state| state.todos = todos);
        Ok(())
    }

    /// POST /api/message with the trimmed text.
    ///
    /// Whitespace-only input is ignored. Concurrent sends are not prevented
    /// here; a view should disable its send control while `loading` is set.
    pub async fn send_message(&self, text: &str) -> Result<(), ApiError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty message");
            return Ok(());
        }

        self.update(|state| {
            state.loading = true;
            state.last_response = None;
        });

        debug!(message = text, "sending message");
        let result = self.exchange(text).await;

        let incoming = match &result {
            Ok(reply) => {
                info!("message sent");
                Incoming::Response(reply.clone())
            }
            Err(e) => {
                warn!(error = %e, "message send failed");
                Incoming::Error(self.describe_send_failure(e))
            }
        };
        let succeeded = result.is_ok();
        self.update(|state| {
            if succeeded {
                state.message_draft.clear();
            }
            state.last_response = Some(incoming);
            state.loading = false;
        });
        result.map(|_| ())
    }

    /// Sends the current message draft.
    pub async fn submit_message(&self) -> Result<(), ApiError> {
        let draft = self.state.borrow().message_draft.clone();
        self.send_message(&draft).await
    }

    /// POST /api/todos, then refresh the list.
    ///
    /// Only the create result is returned; a failed follow-up fetch is logged
    /// and leaves the collection as it was.
    pub async fn add_todo(&self, text: &str) -> Result<(), ApiError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty todo");
            return Ok(());
        }

        debug!(text, "adding todo");
        let input = CreateTodo {
            text: text.to_string(),
        };
        let request = self.api.build_create_todo(&input)?;
        if let Err(e) = self.send(request).await.and_then(|r| self.api.parse_create_todo(r)) {
            warn!(error = %e, "failed to add todo");
            return Err(e);
        }

        info!(text, "todo added");
        self.update(|state| state.todo_draft.clear());
        let _ = self.fetch_todos().await;
        Ok(())
    }

    /// Adds the current todo draft.
    pub async fn submit_todo(&self) -> Result<(), ApiError> {
        let draft = self.state.borrow().todo_draft.clone();
        self.add_todo(&draft).await
    }

    /// DELETE /api/todos/{id}, then refresh the list.
    pub async fn delete_todo(&self, id: &TodoId) -> Result<(), ApiError> {
        debug!(%id, "deleting todo");
        if let Err(e) = self
            .send(self.api.build_delete_todo(id))
            .await
            .and_then(|r| self.api.parse_delete_todo(r))
        {
            warn!(%id, error = %e, "failed to delete todo");
            return Err(e);
        }

        info!(%id, "todo deleted");
        let _ = self.fetch_todos().await;
        Ok(())
    }

    async fn exchange(&self, text: &str) -> Result<String, ApiError> {
        let input = SendMessage {
            message: text.to_string(),
        };
        let request = self.api.build_send_message(&input)?;
        let response = self.send(request).await?;
        self.api.parse_send_message(response)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        Ok(self.transport.execute(request).await?)
    }

    fn describe_send_failure(&self, err: &ApiError) -> String {
        match err {
            ApiError::NetworkUnavailable(_) => format!(
                "Error: Unable to connect to backend. Make sure the server is running on {}",
                self.api.base_url()
            ),
            ApiError::BackendRejected { reason, .. } => format!("Error: {reason}"),
            ApiError::BackendRejectedNoReason { .. }
            | ApiError::MalformedResponse(_)
            | ApiError::Serialization(_) => format!("Error: {SEND_FALLBACK}"),
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut SyncState)) {
        mutate(&mut *self.state.borrow_mut());
        // Observers may re-enter, so no borrow is held while they run.
        let snapshot = self.state();
        let observers: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::rc::Weak;

    use super::*;
    use crate::error::TransportError;
    use crate::http::HttpMethod;

    type Reply = (Option<Duration>, Result<HttpResponse, TransportError>);

    /// Transport answering from per-endpoint queues, optionally after a delay.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: RefCell<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
        requests: RefCell<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn on(&self, method: HttpMethod, path: &str, status: u16, body: &str) -> &Self {
            self.push(method, path, None, Ok(ok(status, body)))
        }

        fn on_delayed(&self, method: HttpMethod, path: &str, delay_ms: u64, status: u16, body: &str) -> &Self {
            self.push(method, path, Some(Duration::from_millis(delay_ms)), Ok(ok(status, body)))
        }

        fn fail(&self, method: HttpMethod, path: &str) -> &Self {
            self.push(method, path, None, Err(TransportError::new("connection refused")))
        }

        fn push(
            &self,
            method: HttpMethod,
            path: &str,
            delay: Option<Duration>,
            reply: Result<HttpResponse, TransportError>,
        ) -> &Self {
            self.replies
                .borrow_mut()
                .entry((method, format!("{BASE}{path}")))
                .or_default()
                .push_back((delay, reply));
            self
        }

        fn count(&self, method: HttpMethod, path: &str) -> usize {
            let url = format!("{BASE}{path}");
            self.requests
                .borrow()
                .iter()
                .filter(|r| r.method == method && r.url == url)
                .count()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(
            &self,
            request: HttpRequest,
        ) -> impl std::future::Future<Output = Result<HttpResponse, TransportError>> {
            let next = self
                .replies
                .borrow_mut()
                .get_mut(&(request.method, request.url.clone()))
                .and_then(|queue| queue.pop_front());
            self.requests.borrow_mut().push(request);
            async move {
                let (delay, reply) = next.unwrap_or((None, Err(TransportError::new("no scripted reply"))));
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
        }
    }

    const BASE: &str = "http://backend.test";

    fn ok(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.to_string(),
        }
    }

    fn controller() -> SyncController<ScriptedTransport> {
        SyncController::new(&ClientConfig::new(BASE), ScriptedTransport::default())
    }

    fn todo_ids(controller: &SyncController<ScriptedTransport>) -> Vec<TodoId> {
        controller.state().todos.into_iter().map(|t| t.id).collect()
    }

    #[test]
    fn initial_state_is_checking_and_empty() {
        let state = controller().state();
        assert_eq!(state.connection, ConnectionStatus::Checking);
        assert!(state.todos.is_empty());
        assert!(state.last_response.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn health_ok_marks_connected() {
        let c = controller();
        c.transport.on(HttpMethod::Get, "/health", 200, r#"{"status":"healthy"}"#);
        assert!(c.check_health().await.is_ok());
        assert_eq!(c.state().connection, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn health_failure_marks_error_and_recovers() {
        let c = controller();
        c.transport
            .fail(HttpMethod::Get, "/health")
            .on(HttpMethod::Get, "/health", 503, "")
            .on(HttpMethod::Get, "/health", 200, "");

        assert!(matches!(c.check_health().await, Err(ApiError::NetworkUnavailable(_))));
        assert_eq!(c.state().connection, ConnectionStatus::Error);

        assert!(c.check_health().await.is_err());
        assert_eq!(c.state().connection, ConnectionStatus::Error);

        c.check_health().await.unwrap();
        assert_eq!(c.state().connection, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn health_check_is_idempotent() {
        let c = controller();
        for _ in 0..3 {
            c.transport.on(HttpMethod::Get, "/health", 200, "");
        }
        for _ in 0..3 {
            c.check_health().await.unwrap();
            assert_eq!(c.state().connection, ConnectionStatus::Connected);
        }
    }

    #[tokio::test]
    async fn fetch_replaces_collection() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":1,"text":"a"},{"id":2,"text":"b"}]}"#)
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":3,"text":"c"}]}"#);

        c.fetch_todos().await.unwrap();
        assert_eq!(todo_ids(&c), vec![TodoId::from(1), TodoId::from(2)]);

        c.fetch_todos().await.unwrap();
        assert_eq!(c.state().todos, vec![Todo::new(3, "c")]);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_collection_and_status() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":1,"text":"a"}]}"#)
            .on(HttpMethod::Get, "/api/todos", 500, r#"{"error":"boom"}"#)
            .fail(HttpMethod::Get, "/api/todos")
            .on(HttpMethod::Get, "/api/todos", 200, "garbage");

        c.fetch_todos().await.unwrap();
        assert!(c.fetch_todos().await.is_err());
        assert!(c.fetch_todos().await.is_err());
        assert!(matches!(c.fetch_todos().await, Err(ApiError::MalformedResponse(_))));

        let state = c.state();
        assert_eq!(state.todos, vec![Todo::new(1, "a")]);
        assert_eq!(state.connection, ConnectionStatus::Checking);
    }

    #[tokio::test]
    async fn fetch_without_todos_field_clears_collection() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":1,"text":"a"}]}"#)
            .on(HttpMethod::Get, "/api/todos", 200, "{}");
        c.fetch_todos().await.unwrap();
        c.fetch_todos().await.unwrap();
        assert!(c.state().todos.is_empty());
    }

    #[tokio::test]
    async fn send_message_success_sets_response_and_clears_draft() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/message", 200, r#"{"response":"hi"}"#);
        c.set_message_draft("hello");

        c.submit_message().await.unwrap();

        let state = c.state();
        assert_eq!(state.last_response, Some(Incoming::Response("hi".to_string())));
        assert!(state.message_draft.is_empty());
        assert!(!state.loading);

        let sent = c.transport.requests.borrow()[0].clone();
        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"message": "hello"}));
    }

    #[tokio::test]
    async fn send_message_trims_before_sending() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/message", 200, r#"{"response":"ok"}"#);
        c.send_message("  padded \n").await.unwrap();
        let sent = c.transport.requests.borrow()[0].clone();
        assert_eq!(sent.body.as_deref(), Some(r#"{"message":"padded"}"#));
    }

    #[tokio::test]
    async fn send_message_rejection_shows_backend_reason_and_keeps_draft() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/message", 500, r#"{"error":"bad input"}"#);
        c.set_message_draft("hello");

        let err = c.submit_message().await.unwrap_err();
        assert_eq!(err.reason(), Some("bad input"));

        let state = c.state();
        let incoming = state.last_response.unwrap();
        assert!(incoming.is_error());
        assert!(incoming.text().contains("bad input"));
        assert_eq!(incoming.text(), "Error: bad input");
        assert_eq!(state.message_draft, "hello");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn send_message_unreadable_rejection_uses_fallback() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/message", 502, "Bad Gateway");
        assert!(c.send_message("hello").await.is_err());
        assert_eq!(
            c.state().last_response,
            Some(Incoming::Error("Error: Failed to send message".to_string()))
        );
    }

    #[tokio::test]
    async fn send_message_network_failure_names_backend() {
        let c = controller();
        c.transport.fail(HttpMethod::Post, "/api/message");
        c.set_message_draft("hello");

        let err = c.submit_message().await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkUnavailable(_)));

        let state = c.state();
        let text = state.last_response.unwrap().text().to_string();
        assert!(text.starts_with("Error: Unable to connect to backend"));
        assert!(text.contains(BASE));
        assert_eq!(state.message_draft, "hello");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn unreadable_reply_is_not_reported_as_connectivity() {
        let c = controller();
        c.transport.push(
            HttpMethod::Post,
            "/api/message",
            None,
            Err(TransportError::unreadable_body("body exceeds limit")),
        );
        c.set_message_draft("hello");

        let err = c.submit_message().await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));

        let state = c.state();
        assert_eq!(
            state.last_response,
            Some(Incoming::Error("Error: Failed to send message".to_string()))
        );
        assert_eq!(state.message_draft, "hello");
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let c = controller();
        c.send_message("   ").await.unwrap();
        c.add_todo("\t").await.unwrap();
        assert!(c.transport.requests.borrow().is_empty());
        assert_eq!(c.state(), SyncState::default());
    }

    #[tokio::test]
    async fn loading_is_observed_during_send() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/message", 200, r#"{"response":"hi"}"#);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        c.subscribe(move |state| {
            sink.borrow_mut()
                .push((state.loading, state.last_response.clone()));
        });

        c.send_message("hello").await.unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (true, None));
        assert_eq!(seen[1], (false, Some(Incoming::Response("hi".to_string()))));
    }

    #[tokio::test]
    async fn add_todo_success_clears_draft_and_refetches() {
        let c = controller();
        c.transport
            .on(HttpMethod::Post, "/api/todos", 201, r#"{"message":"Todo created successfully"}"#)
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":"t1","text":"buy milk"}]}"#);
        c.set_todo_draft("  buy milk ");

        c.submit_todo().await.unwrap();

        let state = c.state();
        assert!(state.todo_draft.is_empty());
        assert_eq!(state.todos, vec![Todo::new("t1", "buy milk")]);

        let requests = c.transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"text":"buy milk"}"#));
        assert_eq!(requests[1].method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn add_todo_failure_keeps_draft_and_skips_fetch() {
        let c = controller();
        c.transport.on(HttpMethod::Post, "/api/todos", 400, r#"{"error":"Todo text is required"}"#);
        c.set_todo_draft("x");

        assert!(c.submit_todo().await.is_err());
        assert_eq!(c.state().todo_draft, "x");
        assert_eq!(c.transport.count(HttpMethod::Get, "/api/todos"), 0);
    }

    #[tokio::test]
    async fn add_todo_succeeds_even_if_refresh_fails() {
        let c = controller();
        c.transport
            .on(HttpMethod::Post, "/api/todos", 201, "{}")
            .fail(HttpMethod::Get, "/api/todos");
        c.set_todo_draft("x");
        c.submit_todo().await.unwrap();
        assert!(c.state().todo_draft.is_empty());
        assert!(c.state().todos.is_empty());
    }

    #[tokio::test]
    async fn delete_todo_refetches_without_the_item() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":42,"text":"a"},{"id":7,"text":"b"}]}"#)
            .on(HttpMethod::Delete, "/api/todos/42", 200, "{}")
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":7,"text":"b"}]}"#);

        c.fetch_todos().await.unwrap();
        c.delete_todo(&TodoId::from(42)).await.unwrap();
        assert_eq!(todo_ids(&c), vec![TodoId::from(7)]);
    }

    #[tokio::test]
    async fn delete_todo_failure_leaves_collection() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":42,"text":"a"}]}"#)
            .on(HttpMethod::Delete, "/api/todos/42", 404, r#"{"error":"Todo not found"}"#);

        c.fetch_todos().await.unwrap();
        let err = c.delete_todo(&TodoId::from(42)).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(todo_ids(&c), vec![TodoId::from(42)]);
        assert_eq!(c.transport.count(HttpMethod::Get, "/api/todos"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fetch_is_discarded() {
        let c = controller();
        c.transport
            .on_delayed(HttpMethod::Get, "/api/todos", 50, 200, r#"{"todos":[{"id":1,"text":"old"}]}"#)
            .on_delayed(HttpMethod::Get, "/api/todos", 10, 200, r#"{"todos":[{"id":2,"text":"new"}]}"#);

        let (first, second) = tokio::join!(c.fetch_todos(), c.fetch_todos());
        first.unwrap();
        second.unwrap();
        assert_eq!(c.state().todos, vec![Todo::new(2, "new")]);
    }

    #[tokio::test(start_paused = true)]
    async fn without_guard_last_fetch_to_resolve_wins() {
        let config = ClientConfig::new(BASE).with_stale_fetch_guard(false);
        let c = SyncController::new(&config, ScriptedTransport::default());
        c.transport
            .on_delayed(HttpMethod::Get, "/api/todos", 50, 200, r#"{"todos":[{"id":1,"text":"old"}]}"#)
            .on_delayed(HttpMethod::Get, "/api/todos", 10, 200, r#"{"todos":[{"id":2,"text":"new"}]}"#);

        let _ = tokio::join!(c.fetch_todos(), c.fetch_todos());
        assert_eq!(c.state().todos, vec![Todo::new(1, "old")]);
    }

    #[tokio::test]
    async fn initialize_checks_health_and_fetches() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/health", 200, "")
            .on(HttpMethod::Get, "/api/todos", 200, r#"{"todos":[{"id":1,"text":"a"}]}"#);

        c.initialize().await;

        let state = c.state();
        assert_eq!(state.connection, ConnectionStatus::Connected);
        assert_eq!(state.todos.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_health_rechecks_on_interval() {
        let c = controller();
        c.transport
            .on(HttpMethod::Get, "/health", 200, "")
            .fail(HttpMethod::Get, "/health")
            .on(HttpMethod::Get, "/health", 200, "");

        let _ = tokio::time::timeout(Duration::from_millis(250), c.poll_health(Duration::from_millis(100))).await;

        assert_eq!(c.transport.count(HttpMethod::Get, "/health"), 3);
        assert_eq!(c.state().connection, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn unsubscribed_observer_is_not_called() {
        let c = controller();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let id = c.subscribe(move |_| counter.set(counter.get() + 1));

        c.set_todo_draft("a");
        assert!(c.unsubscribe(id));
        c.set_todo_draft("b");

        assert_eq!(calls.get(), 1);
        assert!(!c.unsubscribe(id));
        assert_eq!(c.state().todo_draft, "b");
    }

    #[test]
    fn observer_can_unsubscribe_itself() {
        let c = Rc::new(controller());
        let calls = Rc::new(Cell::new(0));
        let own_id = Rc::new(Cell::new(None));

        let weak: Weak<SyncController<ScriptedTransport>> = Rc::downgrade(&c);
        let (counter, slot) = (calls.clone(), own_id.clone());
        let id = c.subscribe(move |_| {
            counter.set(counter.get() + 1);
            if let (Some(c), Some(id)) = (weak.upgrade(), slot.get()) {
                assert!(c.unsubscribe(id));
            }
        });
        own_id.set(Some(id));

        c.set_todo_draft("a");
        c.set_todo_draft("b");

        assert_eq!(calls.get(), 1);
        assert!(!c.unsubscribe(id));
        assert_eq!(c.state().todo_draft, "b");
    }

    #[test]
    fn observer_can_mutate_state() {
        let c = Rc::new(controller());
        let weak: Weak<SyncController<ScriptedTransport>> = Rc::downgrade(&c);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        c.subscribe(move |state| {
            sink.borrow_mut().push(state.todo_draft.clone());
            if state.todo_draft == "typed" {
                if let Some(c) = weak.upgrade() {
                    c.set_todo_draft("normalized");
                }
            }
        });

        c.set_todo_draft("typed");

        assert_eq!(c.state().todo_draft, "normalized");
        assert_eq!(*seen.borrow(), vec!["typed".to_string(), "normalized".to_string()]);
    }

    #[test]
    fn observer_added_during_notification_sees_later_changes() {
        let c = Rc::new(controller());
        let weak: Weak<SyncController<ScriptedTransport>> = Rc::downgrade(&c);
        let late_calls = Rc::new(Cell::new(0));
        let added = Rc::new(Cell::new(false));

        let (counter, flag) = (late_calls.clone(), added.clone());
        c.subscribe(move |_| {
            if flag.get() {
                return;
            }
            flag.set(true);
            if let Some(c) = weak.upgrade() {
                let counter = counter.clone();
                c.subscribe(move |_| counter.set(counter.get() + 1));
            }
        });

        c.set_message_draft("a");
        assert_eq!(late_calls.get(), 0);
        c.set_message_draft("b");
        assert_eq!(late_calls.get(), 1);
    }
}
