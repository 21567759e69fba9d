//! Stateless HTTP request builder and response parser for the backend API.
//!
//! # Design
//! `ApiClient` holds only a `base_url`. Each endpoint is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method that
//! consumes an `HttpResponse`. A `Transport` executes the round-trip in
//! between, so everything here is deterministic.
//!
//! Any 2xx status counts as success. Non-2xx bodies are probed for an
//! `{"error": "..."}` object to produce `BackendRejected`; anything else
//! degrades to `BackendRejectedNoReason`.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CreateTodo, ErrorBody, MessageHistory, MessageRecord, MessageReply, SendMessage, Todo, TodoId,
    TodoList,
};

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_health(&self) -> HttpRequest {
        self.get("/health")
    }

    pub fn build_list_todos(&self) -> HttpRequest {
        self.get("/api/todos")
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        self.post_json("/api/todos", input)
    }

    /// The id is percent-encoded as a single path segment.
    pub fn build_delete_todo(&self, id: &TodoId) -> HttpRequest {
        let segment = urlencoding::encode(&id.to_string()).into_owned();
        HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}/api/todos/{segment}", self.base_url),
            headers: accept_json(),
            body: None,
        }
    }

    pub fn build_send_message(&self, input: &SendMessage) -> Result<HttpRequest, ApiError> {
        self.post_json("/api/message", input)
    }

    pub fn build_list_messages(&self) -> HttpRequest {
        self.get("/api/messages")
    }

    /// The health body is ignored; only the status matters.
    pub fn parse_health(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response)?;
        let list: TodoList = decode(&response.body)?;
        Ok(list.todos)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    /// Returns the backend's `response` text.
    pub fn parse_send_message(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response)?;
        let reply: MessageReply = decode(&response.body)?;
        Ok(reply.response)
    }

    pub fn parse_list_messages(
        &self,
        response: HttpResponse,
    ) -> Result<Vec<MessageRecord>, ApiError> {
        check_status(&response)?;
        let history: MessageHistory = decode(&response.body)?;
        Ok(history.messages)
    }

    fn get(&self, path: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{path}", self.base_url),
            headers: accept_json(),
            body: None,
        }
    }

    fn post_json<T: serde::Serialize>(&self, path: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        headers.extend(accept_json());
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}{path}", self.base_url),
            headers,
            body: Some(body),
        })
    }
}

fn accept_json() -> Vec<(String, String)> {
    vec![("accept".to_string(), "application/json".to_string())]
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}

/// Map non-2xx status codes to a rejection, pulling the reason out of the
/// body when the backend supplied one.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(ErrorBody { error }) if !error.is_empty() => Err(ApiError::BackendRejected {
            status: response.status,
            reason: error,
        }),
        _ => Err(ApiError::BackendRejectedNoReason {
            status: response.status,
        }),
    }
}
