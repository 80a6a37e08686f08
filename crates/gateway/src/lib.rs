//! Gateway: the HTTP API of the internal assistant.
//!
//! Lifecycle:
//! 1. Load config and connect the optional backends (memory, documents, RAG)
//! 2. Restore saved Microsoft logins for Planner and To-Do
//! 3. Serve the axum router with CORS for the configured origins
//!
//! Domain logic lives in the other crates; handlers here only translate
//! between HTTP and those services.

pub mod chat;
pub mod documents;
pub mod error;
pub mod memory;
pub mod pages;
pub mod project;
pub mod server;
pub mod state;
pub mod todo;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    error::ApiError,
    server::{build_gateway_app, start_gateway},
    state::{GatewayState, SESSION_USER, Services},
};
