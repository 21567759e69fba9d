//! Wire DTOs for the backend REST contract.
//!
//! # Design
//! These types are defined independently of the `mock-backend` crate. Only
//! the fields the client relies on are required; anything else the backend
//! sends (`completed`, `created_at`, `count`, ...) is either optional or
//! ignored. Integration tests catch schema drift between the two crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-assigned todo identifier.
///
/// The client never inspects or generates ids; it only echoes them back in
/// `DELETE /api/todos/{id}`. Backends may use strings (UUIDs) or integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TodoId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoId::Number(n) => write!(f, "{n}"),
            TodoId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TodoId {
    fn from(n: i64) -> Self {
        TodoId::Number(n)
    }
}

impl From<&str> for TodoId {
    fn from(s: &str) -> Self {
        TodoId::Text(s.to_string())
    }
}

impl From<String> for TodoId {
    fn from(s: String) -> Self {
        TodoId::Text(s)
    }
}

/// A single todo as listed by `GET /api/todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Todo {
    pub fn new(id: impl Into<TodoId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: None,
            created_at: None,
        }
    }
}

/// Envelope returned by `GET /api/todos`. A missing `todos` field means an
/// empty list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoList {
    #[serde(default)]
    pub todos: Vec<Todo>,
}

/// Request payload for `POST /api/todos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodo {
    pub text: String,
}

/// Request payload for `POST /api/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub message: String,
}

/// Success body of `POST /api/message`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageReply {
    pub response: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Error body the backend attaches to non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// One entry of the backend's message history (`GET /api/messages`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

/// Envelope returned by `GET /api/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHistory {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}
