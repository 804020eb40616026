//! Request handlers
//!
//! Handlers authenticate, convert wire amounts, call the engine, and map
//! errors. Money-moving endpoints require a verified session; the webhook
//! is the only unauthenticated mutation and is provider-signed upstream.

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
    server::AppState,
};
use crate::errors::EngineError;
use crate::games::{BetParams, BP_PER_X};
use crate::identity::Session;
use crate::ledger::{Ledger, Role};
use crate::payment::PaymentGateway;
use crate::rng::DrawProof;
use crate::settlement::{self, rounds::MinesReveal};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
    })
}

/// Engine status
/// GET /status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        engine_id: state.engine_id.clone(),
        network: state.network.clone(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        games: settlement::SettlementCoordinator::supported_games().to_vec(),
        vrf_public_key: state.coordinator_public_key.clone(),
    })
}

/// Prometheus exposition
/// GET /metrics
pub async fn metrics_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<String, ApiError> {
    if !state.enable_metrics {
        return Err(ApiError::not_found(
            request_id.0,
            "metrics collection is disabled".to_string(),
        ));
    }
    state
        .metrics
        .export()
        .map_err(|e| ApiError::internal_error(request_id.0, format!("metrics export: {}", e)))
}

/// Register a new account
/// POST /api/register
pub async fn register_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let role = request.role.unwrap_or(Role::Player);
    if matches!(role, Role::Admin | Role::Support) {
        return Err(ApiError::forbidden(
            request_id.0,
            "admin and support accounts are provisioned out of band".to_string(),
        ));
    }

    let (profile, session) = state
        .identity
        .register(&request.display_name, role)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    Ok(Json(SessionResponse {
        account_id: profile.id,
        token: session.token,
        role: session.role,
        state: session.state,
        balance: micros_to_credits(profile.balance),
    }))
}

/// Issue a session for an existing account
/// POST /api/login
pub async fn login_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .identity
        .login(&request.account_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    let profile = state
        .ledger
        .account(&session.account_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?;

    Ok(Json(SessionResponse {
        account_id: profile.id,
        token: session.token,
        role: session.role,
        state: session.state,
        balance: micros_to_credits(profile.balance),
    }))
}

/// Promote a pending session after out-of-band verification
/// POST /api/session/verify
pub async fn verify_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized(request_id.0.clone(), "missing bearer token".to_string()))?;
    let session = state
        .identity
        .verify(&token)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    let profile = state
        .ledger
        .account(&session.account_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?;

    Ok(Json(SessionResponse {
        account_id: profile.id,
        token: session.token,
        role: session.role,
        state: session.state,
        balance: micros_to_credits(profile.balance),
    }))
}

/// Authoritative balance read
/// GET /api/balance
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError> {
    let session = require_session(&state, &headers, &request_id)?;
    let profile = state
        .ledger
        .account(&session.account_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?;

    Ok(Json(BalanceResponse {
        account_id: profile.id,
        balance: micros_to_credits(profile.balance),
        total_wagered: micros_to_credits(profile.total_wagered),
    }))
}

/// POST /api/bet/dice
pub async fn dice_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DiceBetRequest>,
) -> Result<Json<WagerResponse>, ApiError> {
    let params = BetParams::Dice {
        threshold: request.threshold,
        direction: request.direction,
    };
    settle_single_shot(&state, &headers, &request_id, request.stake, params).await
}

/// POST /api/bet/keno
pub async fn keno_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<KenoBetRequest>,
) -> Result<Json<WagerResponse>, ApiError> {
    let params = BetParams::Keno {
        picks: request.picks,
        tier: request.tier,
    };
    settle_single_shot(&state, &headers, &request_id, request.stake, params).await
}

/// POST /api/bet/limbo
pub async fn limbo_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LimboBetRequest>,
) -> Result<Json<WagerResponse>, ApiError> {
    if !request.target.is_finite() || request.target <= 0.0 {
        return Err(ApiError::bad_request(
            request_id.0,
            format!("target must be a positive number, got {}", request.target),
        ));
    }
    let target_bp = (request.target * BP_PER_X as f64).round() as u64;
    let params = BetParams::Limbo { target_bp };
    settle_single_shot(&state, &headers, &request_id, request.stake, params).await
}

/// POST /api/bet/wheel
pub async fn wheel_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<WheelBetRequest>,
) -> Result<Json<WagerResponse>, ApiError> {
    let params = BetParams::Wheel { tier: request.tier };
    settle_single_shot(&state, &headers, &request_id, request.stake, params).await
}

async fn settle_single_shot(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    request_id: &RequestId,
    stake_credits: f64,
    params: BetParams,
) -> Result<Json<WagerResponse>, ApiError> {
    let session = require_verified(state, headers, request_id)?;
    let stake = credits_to_micros(stake_credits)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e))?;

    let record = state
        .coordinator
        .place_bet(&session.account_id, stake, params)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    let balance = account_balance(state, &session.account_id, request_id).await?;

    Ok(Json(WagerResponse::from_record(record, balance)))
}

/// POST /api/mines/start
pub async fn mines_start_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<MinesStartRequest>,
) -> Result<Json<MinesRoundResponse>, ApiError> {
    let session = require_verified(&state, &headers, &request_id)?;
    let stake = credits_to_micros(request.stake)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e))?;

    let view = state
        .coordinator
        .mines_start(&session.account_id, stake, request.mines)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    Ok(Json(MinesRoundResponse::from_view(view)))
}

/// POST /api/mines/reveal
pub async fn mines_reveal_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<MinesRevealRequest>,
) -> Result<Json<MinesRevealResponse>, ApiError> {
    let session = require_verified(&state, &headers, &request_id)?;

    let reveal = state
        .coordinator
        .mines_reveal(&session.account_id, request.cell)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    match reveal {
        MinesReveal::Safe {
            multiplier_bp,
            revealed,
            can_reveal,
        } => Ok(Json(MinesRevealResponse::Safe {
            multiplier: bp_to_multiplier(multiplier_bp),
            revealed,
            can_reveal,
        })),
        MinesReveal::Mine { record } => {
            let balance = account_balance(&state, &session.account_id, &request_id).await?;
            Ok(Json(MinesRevealResponse::Mine {
                wager: Box::new(WagerResponse::from_record(record, balance)),
            }))
        }
    }
}

/// POST /api/mines/cashout
pub async fn mines_cashout_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WagerResponse>, ApiError> {
    let session = require_verified(&state, &headers, &request_id)?;

    let record = state
        .coordinator
        .mines_cashout(&session.account_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    let balance = account_balance(&state, &session.account_id, &request_id).await?;

    Ok(Json(WagerResponse::from_record(record, balance)))
}

/// GET /api/mines
pub async fn mines_state_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Option<MinesRoundResponse>>, ApiError> {
    let session = require_session(&state, &headers, &request_id)?;
    let view = state
        .coordinator
        .mines_state(&session.account_id)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(view.map(MinesRoundResponse::from_view)))
}

/// Agent cash-in to a player account
/// POST /api/transfer
pub async fn transfer_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let session = require_verified(&state, &headers, &request_id)?;
    let amount = credits_to_micros(request.amount)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e))?;

    let record = state
        .coordinator
        .agent_transfer(&session.account_id, &request.recipient_id, amount)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    Ok(Json(TransferResponse::from_record(record)))
}

/// POST /api/withdraw
pub async fn withdraw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let session = require_verified(&state, &headers, &request_id)?;
    let amount = credits_to_micros(request.amount)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e))?;

    let record = state
        .coordinator
        .withdraw(&session.account_id, amount)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    Ok(Json(TransferResponse::from_record(record)))
}

/// Create a payment-provider invoice for a deposit
/// POST /api/deposit/invoice
pub async fn deposit_invoice_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DepositInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let session = require_session(&state, &headers, &request_id)?;

    let invoice = state
        .gateway
        .create_invoice(&session.account_id, &request.currency)
        .await
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e.to_string()))?;

    Ok(Json(InvoiceResponse::from_invoice(invoice)))
}

/// Payment provider confirmation callback
/// POST /api/deposit/webhook
pub async fn deposit_webhook_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositWebhookRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let amount = credits_to_micros(request.amount)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e))?;

    info!(
        invoice = %request.invoice_id,
        account = %request.account_id,
        currency = %request.currency,
        "deposit confirmation received"
    );
    let record = state
        .coordinator
        .deposit(&request.account_id, amount)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;

    Ok(Json(TransferResponse::from_record(record)))
}

/// Per-account wager history, newest first
/// GET /api/wagers?limit={n}
pub async fn wager_history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WagerResponse>>, ApiError> {
    let session = require_session(&state, &headers, &request_id)?;
    let limit = query.limit.min(100);

    let records = state
        .ledger
        .wagers_for(&session.account_id, limit)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?;
    let balance = account_balance(&state, &session.account_id, &request_id).await?;

    Ok(Json(
        records
            .into_iter()
            .map(|r| WagerResponse::from_record(r, balance))
            .collect(),
    ))
}

/// Per-account transfer history, newest first
/// GET /api/transfers?limit={n}
pub async fn transfer_history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TransferResponse>>, ApiError> {
    let session = require_session(&state, &headers, &request_id)?;
    let limit = query.limit.min(100);

    let records = state
        .ledger
        .transfers_for(&session.account_id, limit)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?;

    Ok(Json(
        records.into_iter().map(TransferResponse::from_record).collect(),
    ))
}

/// Public live-bet feed snapshot
/// GET /api/feed
pub async fn feed_handler(State(state): State<Arc<AppState>>) -> Json<FeedResponse> {
    Json(FeedResponse {
        entries: state
            .coordinator
            .feed()
            .snapshot()
            .into_iter()
            .map(FeedEntryResponse::from_entry)
            .collect(),
    })
}

/// Verify a raw VRF proof bundle
/// POST /api/verify/vrf
pub async fn verify_proof_handler(
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<VerifyProofRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let proof = DrawProof {
        vrf_output: request.vrf_output,
        vrf_proof: request.vrf_proof,
        public_key: request.public_key,
        input_message: request.input_message.clone(),
    };

    match crate::rng::VrfOutcomeSource::verify_proof(&proof, &request.input_message) {
        Ok(is_valid) => Ok(Json(VerifyResponse {
            is_valid,
            error: if is_valid {
                None
            } else {
                Some("VRF verification failed".to_string())
            },
            explanation: None,
        })),
        Err(e) => Err(ApiError::bad_request(request_id.0, e.to_string())),
    }
}

/// Verify a persisted wager end-to-end
/// GET /api/verify/wager/:id
pub async fn verify_wager_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(wager_id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let record = state
        .ledger
        .wager(&wager_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))?
        .ok_or_else(|| {
            ApiError::from_engine(request_id.0.clone(), EngineError::WagerNotFound(wager_id))
        })?;

    match settlement::verify_wager_record(&record) {
        Ok(true) => Ok(Json(VerifyResponse {
            is_valid: true,
            error: None,
            explanation: Some(
                "VRF proof verified and outcome recomputed from the published output".to_string(),
            ),
        })),
        Ok(false) => Ok(Json(VerifyResponse {
            is_valid: false,
            error: Some("proof or outcome does not match the recorded wager".to_string()),
            explanation: None,
        })),
        Err(e) => Err(ApiError::from_engine(request_id.0, e)),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

pub(crate) fn require_session(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    request_id: &RequestId,
) -> Result<Session, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| {
        ApiError::unauthorized(request_id.0.clone(), "missing bearer token".to_string())
    })?;
    state.identity.authenticate(&token).ok_or_else(|| {
        ApiError::unauthorized(request_id.0.clone(), "unknown or expired session".to_string())
    })
}

fn require_verified(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    request_id: &RequestId,
) -> Result<Session, ApiError> {
    let session = require_session(state, headers, request_id)?;
    if !session.is_verified() {
        return Err(ApiError::forbidden(
            request_id.0.clone(),
            "session is pending verification".to_string(),
        ));
    }
    Ok(session)
}

async fn account_balance(
    state: &Arc<AppState>,
    account_id: &str,
    request_id: &RequestId,
) -> Result<crate::games::Amount, ApiError> {
    state
        .ledger
        .account(account_id)
        .await
        .map(|p| p.balance)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e.into()))
}
