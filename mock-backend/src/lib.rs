//! In-memory backend implementing the message/todo REST contract.
//!
//! Serves the same routes and JSON shapes the sync client expects, so the
//! client can be exercised end-to-end without the production service.

pub mod error;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
}

impl Todo {
    fn new(text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed: false,
            created_at: Local::now().to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub message: String,
    pub timestamp: String,
    pub response: String,
}

#[derive(Deserialize)]
pub struct MessageInput {
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct TodoInput {
    #[serde(default)]
    pub text: String,
}

#[derive(Default)]
pub struct Store {
    pub todos: Vec<Todo>,
    pub messages: Vec<Message>,
}

impl Store {
    pub fn with_sample_todos() -> Self {
        let todos: Vec<Todo> = [
            "Learn the sync controller",
            "Set up local development environment",
            "Deploy the backend",
        ]
        .into_iter()
        .map(Todo::new)
        .collect();
        info!("Initialized with {} sample todos", todos.len());
        Self {
            todos,
            messages: Vec::new(),
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Router with an empty store.
pub fn app() -> Router {
    router(Store::default())
}

/// Router pre-populated with sample todos, as the binary serves it.
pub fn app_with_sample_data() -> Router {
    router(Store::with_sample_todos())
}

fn router(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/message", post(send_message))
        .route("/api/messages", get(list_messages))
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/api/todos/{id}", delete(delete_todo))
        .fallback(unknown_endpoint)
        .with_state(db)
}

pub async fn run(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Mock Backend API - Local Development",
        "status": "running",
        "environment": "development",
        "endpoints": {
            "POST /api/message": "Send a message",
            "GET /api/todos": "Get all todos",
            "POST /api/todos": "Create a todo",
            "DELETE /api/todos/<id>": "Delete a todo",
            "GET /api/messages": "Get all messages",
            "GET /health": "Health check"
        }
    }))
}

async fn health(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    Json(json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
        "todos_count": store.todos.len(),
        "messages_count": store.messages.len(),
    }))
}

async fn send_message(
    State(db): State<Db>,
    payload: Result<Json<MessageInput>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(input) = payload.map_err(|_| AppError::MalformedPayload)?;
    if input.message.is_empty() {
        return Err(AppError::MissingField("Message"));
    }

    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let record = Message {
        id: Uuid::new_v4().to_string(),
        message: input.message.clone(),
        timestamp: now.to_rfc3339(),
        response: format!("Echo: {}", input.message),
    };
    let message_id = record.id.clone();
    db.write().await.messages.push(record);

    info!("[{time}] Received message: {}", input.message);
    Ok(Json(json!({
        "response": format!("Hello! You said: '{}'. Message received at {time}", input.message),
        "message_id": message_id,
        "timestamp": time,
    })))
}

async fn list_messages(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    Json(json!({
        "messages": store.messages,
        "count": store.messages.len(),
    }))
}

async fn list_todos(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    info!("Fetching {} todos", store.todos.len());
    Json(json!({
        "todos": store.todos,
        "count": store.todos.len(),
    }))
}

async fn create_todo(
    State(db): State<Db>,
    payload: Result<Json<TodoInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(input) = payload.map_err(|_| AppError::MalformedPayload)?;
    let text = input.text.trim();
    if text.is_empty() {
        return Err(AppError::MissingField("Todo text"));
    }

    let todo = Todo::new(text);
    db.write().await.todos.push(todo.clone());
    info!("Created todo: {text}");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Todo created successfully",
            "todo": todo,
        })),
    ))
}

async fn delete_todo(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut store = db.write().await;
    let before = store.todos.len();
    store.todos.retain(|todo| todo.id != id);
    if store.todos.len() == before {
        return Err(AppError::TodoNotFound);
    }

    info!("Deleted todo with id: {id}");
    Ok(Json(json!({
        "message": "Todo deleted successfully",
        "remaining_todos": store.todos.len(),
    })))
}

async fn unknown_endpoint() -> AppError {
    AppError::UnknownEndpoint
}
