//! WebSocket support for real-time updates
//!
//! Two subscriptions back the client UI:
//! - the public live-bet feed, fanned out from the settlement broadcast
//! - per-account balance pushes from the ledger's watch channel, the
//!   single source of truth the UI renders

use super::{models::FeedEntryResponse, server::AppState};
use crate::ledger::Ledger;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::debug;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    /// A wager settled somewhere on the platform
    #[serde(rename = "feed_entry")]
    FeedEntry { entry: FeedEntryResponse },

    /// The subscribed account's authoritative balance changed
    #[serde(rename = "balance")]
    Balance { account_id: String, balance: f64 },

    /// Heartbeat to keep the connection alive
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: i64 },

    /// Error event
    #[serde(rename = "error")]
    Error { message: String },
}

impl WsEvent {
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self).ok().map(Message::Text)
    }
}

/// GET /ws/feed
pub async fn feed_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| feed_stream(socket, state))
}

async fn feed_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let mut feed_rx = state.coordinator.feed().subscribe();
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);

    // Current snapshot first, so the client renders immediately.
    for entry in state.coordinator.feed().snapshot() {
        let event = WsEvent::FeedEntry {
            entry: FeedEntryResponse::from_entry(entry),
        };
        if let Some(msg) = event.to_message() {
            if sink.send(msg).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            entry = feed_rx.recv() => {
                match entry {
                    Ok(entry) => {
                        let event = WsEvent::FeedEntry {
                            entry: FeedEntryResponse::from_entry(entry),
                        };
                        if let Some(msg) = event.to_message() {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    // Lagged receivers resync from the next entry.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "feed subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                let event = WsEvent::Heartbeat { timestamp: Utc::now().timestamp() };
                if let Some(msg) = event.to_message() {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Pings are answered by axum; other client messages are ignored.
                    _ => {}
                }
            }
        }
    }
    debug!("feed websocket closed");
}

/// Balance subscription authentication
#[derive(Debug, Deserialize)]
pub struct BalanceWsQuery {
    pub token: String,
}

/// GET /ws/balance?token={session}
pub async fn balance_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<BalanceWsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| balance_stream(socket, state, query.token))
}

async fn balance_stream(socket: WebSocket, state: Arc<AppState>, token: String) {
    let (mut sink, mut stream) = socket.split();

    let session = match state.identity.authenticate(&token) {
        Some(session) => session,
        None => {
            let event = WsEvent::Error {
                message: "unknown or expired session".to_string(),
            };
            if let Some(msg) = event.to_message() {
                let _ = sink.send(msg).await;
            }
            return;
        }
    };

    let mut balance_rx = match state.ledger.subscribe_balance(&session.account_id) {
        Some(rx) => rx,
        None => {
            let event = WsEvent::Error {
                message: "no balance stream for account".to_string(),
            };
            if let Some(msg) = event.to_message() {
                let _ = sink.send(msg).await;
            }
            return;
        }
    };

    // Initial balance, then push on every ledger commit that touches it.
    let initial = *balance_rx.borrow();
    let event = WsEvent::Balance {
        account_id: session.account_id.clone(),
        balance: super::models::micros_to_credits(initial),
    };
    if let Some(msg) = event.to_message() {
        if sink.send(msg).await.is_err() {
            return;
        }
    }

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            changed = balance_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let balance = *balance_rx.borrow();
                let event = WsEvent::Balance {
                    account_id: session.account_id.clone(),
                    balance: super::models::micros_to_credits(balance),
                };
                if let Some(msg) = event.to_message() {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                let event = WsEvent::Heartbeat { timestamp: Utc::now().timestamp() };
                if let Some(msg) = event.to_message() {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
    debug!(account = %session.account_id, "balance websocket closed");
}
