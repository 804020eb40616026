//! HTTP/WS API
//!
//! Thin boundary over the settlement engine: handlers validate and
//! convert, the coordinator and ledger do the work. The browser client is
//! a passive renderer of these responses and the live subscriptions.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{ApiServer, AppState};
