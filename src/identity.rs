//! Sessions and account identity
//!
//! The upstream auth provider is a collaborator; this module owns the
//! engine-side session object it hands down. A session is explicit state
//! (pending-verification or verified) attached to a bearer token, never a
//! flag read from ambient storage. Money-moving operations require a
//! verified session; everything rejects without one.

use crate::errors::{EngineError, EngineResult};
use crate::games::Amount;
use crate::ledger::{AccountProfile, Ledger, LedgerOp, LedgerTransaction, Role};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Explicit session lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    PendingVerification,
    Verified,
}

/// One authenticated session scoped to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub account_id: String,
    pub role: Role,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_verified(&self) -> bool {
        self.state == SessionState::Verified
    }
}

/// Registration and session issuance backed by the ledger's account store
pub struct IdentityService {
    ledger: Arc<dyn Ledger>,
    sessions: DashMap<String, Session>,
    /// Issue sessions already verified (development mode)
    auto_verify: bool,
    /// Balance granted to new accounts
    starting_balance: Amount,
}

impl IdentityService {
    pub fn new(ledger: Arc<dyn Ledger>, auto_verify: bool, starting_balance: Amount) -> Self {
        Self {
            ledger,
            sessions: DashMap::new(),
            auto_verify,
            starting_balance,
        }
    }

    /// Create a ledger account and an initial session for it.
    pub async fn register(
        &self,
        display_name: &str,
        role: Role,
    ) -> EngineResult<(AccountProfile, Session)> {
        let name = display_name.trim();
        if name.is_empty() || name.len() > 32 {
            return Err(EngineError::Validation(
                "display name must be 1-32 characters".to_string(),
            ));
        }

        let profile = AccountProfile {
            id: Uuid::new_v4().to_string(),
            display_name: name.to_string(),
            role,
            verified: self.auto_verify,
            ghost_mode: false,
            balance: self.starting_balance,
            total_wagered: 0,
            created_at: Utc::now(),
        };
        self.ledger.create_account(profile.clone()).await?;
        info!(account = %profile.id, role = ?role, "account registered");

        let session = self.issue(&profile);
        Ok((profile, session))
    }

    /// Issue a fresh session for an existing account. Upstream
    /// authentication has already happened by the time this is called.
    pub async fn login(&self, account_id: &str) -> EngineResult<Session> {
        let profile = self.ledger.account(account_id).await?;
        Ok(self.issue(&profile))
    }

    /// Resolve a bearer token; `None` means unauthenticated.
    pub fn authenticate(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    /// Promote a pending session after out-of-band verification, and
    /// persist the account's verified flag.
    pub async fn verify(&self, token: &str) -> EngineResult<Session> {
        let session = {
            let mut entry = self
                .sessions
                .get_mut(token)
                .ok_or(EngineError::Unauthenticated)?;
            entry.state = SessionState::Verified;
            entry.clone()
        };
        self.ledger
            .commit(LedgerTransaction::new(vec![LedgerOp::SetVerified {
                account: session.account_id.clone(),
                verified: true,
            }]))
            .await?;
        Ok(session)
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn issue(&self, profile: &AccountProfile) -> Session {
        let state = if self.auto_verify || profile.verified {
            SessionState::Verified
        } else {
            SessionState::PendingVerification
        };
        let session = Session {
            token: Uuid::new_v4().to_string(),
            account_id: profile.id.clone(),
            role: profile.role,
            state,
            created_at: Utc::now(),
        };
        self.sessions
            .insert(session.token.clone(), session.clone());
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryLedger;

    fn service(auto_verify: bool) -> IdentityService {
        IdentityService::new(Arc::new(InMemoryLedger::new()), auto_verify, 1_000_000)
    }

    #[tokio::test]
    async fn test_register_creates_account_and_session() {
        let identity = service(true);
        let (profile, session) = identity.register("alice", Role::Player).await.unwrap();

        assert_eq!(profile.balance, 1_000_000);
        assert_eq!(session.account_id, profile.id);
        assert!(session.is_verified());

        let resolved = identity.authenticate(&session.token).expect("session resolves");
        assert_eq!(resolved.account_id, profile.id);
    }

    #[tokio::test]
    async fn test_pending_sessions_promote_on_verify() {
        let identity = service(false);
        let (_, session) = identity.register("bob", Role::Player).await.unwrap();
        assert_eq!(session.state, SessionState::PendingVerification);

        let verified = identity.verify(&session.token).await.unwrap();
        assert!(verified.is_verified());
        assert!(identity.authenticate(&session.token).unwrap().is_verified());
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let identity = service(true);
        assert!(identity.authenticate("nope").is_none());
        assert!(matches!(
            identity.verify("nope").await.unwrap_err(),
            EngineError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_stops_resolving() {
        let identity = service(true);
        let (_, session) = identity.register("carol", Role::Agent).await.unwrap();
        identity.revoke(&session.token);
        assert!(identity.authenticate(&session.token).is_none());
    }

    #[tokio::test]
    async fn test_display_name_validation() {
        let identity = service(true);
        assert!(identity.register("", Role::Player).await.is_err());
        assert!(identity
            .register(&"x".repeat(40), Role::Player)
            .await
            .is_err());
    }
}
