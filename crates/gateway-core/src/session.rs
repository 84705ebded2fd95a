//! Session tracking for multi-turn Warp conversations.
//!
//! Warp's protocol is conversation-scoped: the first turn creates a
//! conversation ID server-side (inside the Warp backend), and every
//! subsequent turn must replay it so Warp can thread context. This module
//! tracks the mapping from a client-visible [`crate::ids::SessionId`] to the
//! Warp conversation ID, along with the credential pinned to that session —
//! once a session starts on one Warp account it must stay on that account
//! for its lifetime, since Warp's conversation state lives with the account.

use serde::{Deserialize, Serialize};

use crate::ids::{CredentialId, SessionId};

/// A tracked multi-turn session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Client-visible session identifier.
    pub id: SessionId,
    /// The Warp-side conversation ID, once the first turn has established it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp_conversation_id: Option<String>,
    /// The credential this session is pinned to.
    pub credential_id: CredentialId,
    /// Turn count so far.
    pub turn_count: u32,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last activity time (RFC 3339), used to expire idle sessions.
    pub last_active_at: String,
}

impl Session {
    /// Create a new session pinned to a credential, with no Warp conversation yet.
    #[must_use]
    pub fn new(credential_id: CredentialId) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: SessionId::new(),
            warp_conversation_id: None,
            credential_id,
            turn_count: 0,
            created_at: now.clone(),
            last_active_at: now,
        }
    }

    /// Record a completed turn, bumping the turn count and activity timestamp.
    pub fn record_turn(&mut self) {
        self.turn_count += 1;
        self.last_active_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_no_conversation_yet() {
        let session = Session::new(CredentialId::new());
        assert!(session.warp_conversation_id.is_none());
        assert_eq!(session.turn_count, 0);
    }

    #[test]
    fn record_turn_increments_count() {
        let mut session = Session::new(CredentialId::new());
        session.record_turn();
        session.record_turn();
        assert_eq!(session.turn_count, 2);
    }

    #[test]
    fn session_serde_roundtrip() {
        let session = Session::new(CredentialId::new());
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(session, back);
    }
}
