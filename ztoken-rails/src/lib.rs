//! ztoken-rails library
//!
//! Axum-based HTTP service in front of a [`TokenLedger`].
//!
//! # Endpoints
//! - `GET  /health`
//! - `GET  /ledger/state`: committed root, supply and pending count
//! - `GET  /ledger/actions/pending`: the batch the next reduction settles
//! - `POST /ledger/mint`, `POST /ledger/transfer`: synchronous, witnessed
//! - `POST /ledger/dispatch/mint`, `POST /ledger/dispatch/transfer`: deferred
//! - `POST /ledger/reduce`: settle the next batch with caller evidence
//!
//! Transfers are authorized by an ed25519 signature from the sender over a
//! message carrying a strictly increasing per-sender nonce; see [`signing`].

pub mod error;
pub mod signing;

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use ztoken_common::{Balance, Digest, PublicIdentity};
use ztoken_ledger::{
    ActionId, EvidenceTable, LedgerConfig, LedgerError, MintRequest, PendingAction,
    ReductionReceipt, SenderAuthorization, TokenLedger, TransferRequest, TransitionReceipt,
    VerifiedSender,
};

pub use error::{ApiError, RailError};
pub use signing::{dispatch_message, transfer_message, NonceGuard, SignatureAuthorization};

/// Application state
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<TokenLedger>,
    nonces: Arc<NonceGuard>,
}

impl AppState {
    pub fn new(ledger: TokenLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
            nonces: Arc::new(NonceGuard::new()),
        }
    }

    /// Ledger configured from `ZTOKEN_*` environment variables.
    pub fn from_env() -> Result<Self, LedgerError> {
        Ok(Self::new(TokenLedger::from_config(LedgerConfig::from_env())?))
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }
}

/// Build the router.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ledger/state", get(ledger_state))
        .route("/ledger/actions/pending", get(pending_actions))
        .route("/ledger/mint", post(mint))
        .route("/ledger/transfer", post(transfer))
        .route("/ledger/dispatch/mint", post(dispatch_mint))
        .route("/ledger/dispatch/transfer", post(dispatch_transfer))
        .route("/ledger/reduce", post(reduce))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerStateResponse {
    pub total_supply: Balance,
    pub balances_root: Digest,
    pub pending_actions: usize,
}

async fn ledger_state(State(state): State<AppState>) -> Result<Json<LedgerStateResponse>, ApiError> {
    let committed = state.ledger.state()?;
    Ok(Json(LedgerStateResponse {
        total_supply: committed.total_supply,
        balances_root: committed.balances_root,
        pending_actions: state.ledger.pending_len(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingActionsResponse {
    /// Next batch, oldest first.
    pub actions: Vec<PendingAction>,
    pub total_pending: usize,
}

async fn pending_actions(State(state): State<AppState>) -> Json<PendingActionsResponse> {
    Json(PendingActionsResponse {
        actions: state.ledger.pending_actions(),
        total_pending: state.ledger.pending_len(),
    })
}

async fn mint(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<TransitionReceipt>, ApiError> {
    Ok(Json(state.ledger.mint(&req)?))
}

/// Synchronous transfer, signed over [`transfer_message`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedTransferRequest {
    #[serde(flatten)]
    pub request: TransferRequest,
    /// Must exceed every nonce previously accepted from `from`.
    pub nonce: u64,
    /// Hex ed25519 signature by `from`.
    pub signature: String,
}

async fn transfer(
    State(state): State<AppState>,
    Json(req): Json<SignedTransferRequest>,
) -> Result<Json<TransitionReceipt>, ApiError> {
    let r = &req.request;
    let auth = SignatureAuthorization::new(
        transfer_message(req.nonce, &r.expected_root, &r.from, &r.to, r.amount),
        signing::parse_signature(&req.signature)?,
    );
    let sender = verify_sender(&auth, r.from)?;

    let receipt = state.nonces.consume(&r.from, req.nonce, || {
        state.ledger.transfer(&sender, r).map_err(RailError::from)
    })?;
    Ok(Json(receipt))
}

/// Check the signature once at the edge; the ledger then sees a confirmed sender.
fn verify_sender(
    auth: &SignatureAuthorization,
    from: PublicIdentity,
) -> Result<VerifiedSender, RailError> {
    if !auth.verified_sender_authorization(&from) {
        return Err(LedgerError::UnauthorizedSender(from).into());
    }
    Ok(VerifiedSender(from))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchMintRequest {
    pub to: PublicIdentity,
    pub amount: Balance,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub action_id: ActionId,
}

async fn dispatch_mint(
    State(state): State<AppState>,
    Json(req): Json<DispatchMintRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let action_id = state.ledger.dispatch_mint(req.to, req.amount)?;
    Ok(Json(DispatchResponse { action_id }))
}

/// Deferred transfer, signed over [`dispatch_message`].
#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchTransferRequest {
    pub from: PublicIdentity,
    pub to: PublicIdentity,
    pub amount: Balance,
    /// Must exceed every nonce previously accepted from `from`.
    pub nonce: u64,
    pub signature: String,
}

async fn dispatch_transfer(
    State(state): State<AppState>,
    Json(req): Json<DispatchTransferRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let auth = SignatureAuthorization::new(
        dispatch_message(req.nonce, &req.from, &req.to, req.amount),
        signing::parse_signature(&req.signature)?,
    );
    let sender = verify_sender(&auth, req.from)?;

    let action_id = state.nonces.consume(&req.from, req.nonce, || {
        state
            .ledger
            .dispatch_transfer(&sender, req.from, req.to, req.amount)
            .map_err(RailError::from)
    })?;
    Ok(Json(DispatchResponse { action_id }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReduceRequest {
    pub expected_root: Digest,
    pub evidence: EvidenceTable,
}

async fn reduce(
    State(state): State<AppState>,
    Json(req): Json<ReduceRequest>,
) -> Result<Json<ReductionReceipt>, ApiError> {
    Ok(Json(state.ledger.reduce(req.expected_root, &req.evidence)?))
}

