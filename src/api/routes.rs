//! Route definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{
    handlers::*,
    server::AppState,
    websocket::{balance_websocket_handler, feed_websocket_handler},
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Operational endpoints
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        // Accounts and sessions
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/session/verify", post(verify_session_handler))
        .route("/api/balance", get(balance_handler))
        // Single-shot wagers
        .route("/api/bet/dice", post(dice_bet_handler))
        .route("/api/bet/keno", post(keno_bet_handler))
        .route("/api/bet/limbo", post(limbo_bet_handler))
        .route("/api/bet/wheel", post(wheel_bet_handler))
        // Mines rounds
        .route("/api/mines", get(mines_state_handler))
        .route("/api/mines/start", post(mines_start_handler))
        .route("/api/mines/reveal", post(mines_reveal_handler))
        .route("/api/mines/cashout", post(mines_cashout_handler))
        // Wallet
        .route("/api/transfer", post(transfer_handler))
        .route("/api/withdraw", post(withdraw_handler))
        .route("/api/deposit/invoice", post(deposit_invoice_handler))
        .route("/api/deposit/webhook", post(deposit_webhook_handler))
        // History and feed
        .route("/api/wagers", get(wager_history_handler))
        .route("/api/transfers", get(transfer_history_handler))
        .route("/api/feed", get(feed_handler))
        // Provably-fair verification
        .route("/api/verify/vrf", post(verify_proof_handler))
        .route("/api/verify/wager/:id", get(verify_wager_handler))
        // WebSocket subscriptions
        .route("/ws/feed", get(feed_websocket_handler))
        .route("/ws/balance", get(balance_websocket_handler))
        // Attach shared state
        .with_state(state)
}
