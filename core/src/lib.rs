//! Client-side sync controller for the demo message/todo backend.
//!
//! # Overview
//! `SyncController` owns the state a single-page client renders (connection
//! status, drafts, last message response, todo list, loading flag) and is the
//! only thing that talks to the backend. Views subscribe to state changes and
//! call controller operations; they never touch HTTP.
//!
//! # Design
//! - `ApiClient` is stateless: `build_*` produces an `HttpRequest`, `parse_*`
//!   consumes an `HttpResponse`. All status and body rules live there.
//! - `Transport` executes requests. `UreqTransport` is the real one; tests
//!   plug in scripted transports.
//! - The todo list is never edited locally. Adds and deletes are followed by
//!   a full re-fetch.
//! - DTOs are defined independently from the `mock-backend` crate;
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use controller::{ConnectionStatus, Incoming, SubscriptionId, SyncController, SyncState};
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{CreateTodo, MessageRecord, SendMessage, Todo, TodoId};
