//! Voice Agent API Library Crate
//!
//! This library contains the web-facing half of the voice agent: configuration,
//! the shared application state, REST handlers, WebSocket relays, and routing.
//! The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
