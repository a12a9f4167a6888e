//! Server-side session authority
//!
//! Owns every session the gateway knows about. Clients only ever hold the
//! opaque [`SessionToken`]; all state transitions go through
//! [`SessionAuthority`].
//!
//! ## Lifecycle
//!
//! ```text
//! create_pending ──> Anonymous ──attach_verifier──> PendingLogin
//!                                                      │ consume_verifier (one-shot)
//!                                                      │ authenticate
//!                                                      v
//!                                                Authenticated
//! ```
//!
//! Every operation runs inside a single map-entry critical section, so the
//! expiry check and the mutation for one token cannot interleave with
//! another operation (or the background sweep) on that same token.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::{mapref::entry::Entry, DashMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::error::AuthError;
use super::pkce::PkceVerifier;

/// Default lifetime of a session that never finished logging in.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(10 * 60);

/// Default lifetime of an authenticated session, counted from login.
pub const DEFAULT_AUTHENTICATED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// Types
// =============================================================================

/// Opaque session token handed to the client in an http-only cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// 32 bytes from the thread-local CSPRNG, base64url encoded (43 chars).
    fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Wrap a value presented by a client. Unknown values simply never match.
    pub fn from_client(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

/// Normalized identity claims attached to an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email: None,
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Data bound to a session between login start and callback.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub verifier: PkceVerifier,
    /// OAuth `state` value the callback must echo back.
    pub csrf_state: String,
}

/// What callers are allowed to observe about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    PendingLogin,
    Authenticated(Arc<Identity>),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLifetimes {
    pub pending: Duration,
    pub authenticated: Duration,
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            pending: DEFAULT_PENDING_TTL,
            authenticated: DEFAULT_AUTHENTICATED_TTL,
        }
    }
}

#[derive(Debug)]
enum SessionPhase {
    Anonymous,
    /// `None` once the verifier has been consumed by a callback.
    PendingLogin(Option<PendingLogin>),
    Authenticated(Arc<Identity>),
}

#[derive(Debug)]
struct SessionRecord {
    phase: SessionPhase,
    created_at: Instant,
    expires_at: Instant,
}

impl SessionRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Authority
// =============================================================================

pub struct SessionAuthority {
    sessions: DashMap<SessionToken, SessionRecord>,
    lifetimes: SessionLifetimes,
}

impl SessionAuthority {
    pub fn new(lifetimes: SessionLifetimes) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> SessionLifetimes {
        self.lifetimes
    }

    /// Allocate a new anonymous session that may start a login.
    pub fn create_pending(&self) -> SessionToken {
        let now = Instant::now();
        loop {
            let token = SessionToken::generate();
            if let Entry::Vacant(vacant) = self.sessions.entry(token.clone()) {
                vacant.insert(SessionRecord {
                    phase: SessionPhase::Anonymous,
                    created_at: now,
                    expires_at: now + self.lifetimes.pending,
                });
                tracing::debug!(event = "session_created", "Pending session allocated");
                return token;
            }
        }
    }

    /// Bind a login attempt to an anonymous session.
    pub fn attach_verifier(&self, token: &SessionToken, login: PendingLogin) -> Result<(), AuthError> {
        self.with_live(token, |record| {
            if !matches!(record.phase, SessionPhase::Anonymous) {
                return Err(AuthError::InvalidSession);
            }
            record.phase = SessionPhase::PendingLogin(Some(login));
            Ok(())
        })
        .unwrap_or(Err(AuthError::InvalidSession))
    }

    /// Take the pending login data. Succeeds at most once per login attempt.
    pub fn consume_verifier(&self, token: &SessionToken) -> Result<PendingLogin, AuthError> {
        self.with_live(token, |record| match &mut record.phase {
            SessionPhase::PendingLogin(pending) => pending.take().ok_or(AuthError::NoPendingLogin),
            _ => Err(AuthError::NoPendingLogin),
        })
        .unwrap_or(Err(AuthError::NoPendingLogin))
    }

    /// Mark a pending session as logged in. Expiry restarts from now.
    pub fn authenticate(
        &self,
        token: &SessionToken,
        identity: Identity,
    ) -> Result<Arc<Identity>, AuthError> {
        let authenticated_ttl = self.lifetimes.authenticated;
        self.with_live(token, |record| {
            if !matches!(record.phase, SessionPhase::PendingLogin(_)) {
                return Err(AuthError::NoPendingLogin);
            }
            let identity = Arc::new(identity);
            record.phase = SessionPhase::Authenticated(identity.clone());
            record.expires_at = Instant::now() + authenticated_ttl;
            tracing::debug!(
                event = "session_authenticated",
                login_duration_ms = record.created_at.elapsed().as_millis() as u64,
                "Session authenticated"
            );
            Ok(identity)
        })
        .unwrap_or(Err(AuthError::InvalidSession))
    }

    /// Read a session. Unknown and expired tokens both read as `Anonymous`.
    pub fn lookup(&self, token: &SessionToken) -> SessionState {
        self.with_live(token, |record| match &record.phase {
            SessionPhase::Anonymous => SessionState::Anonymous,
            SessionPhase::PendingLogin(_) => SessionState::PendingLogin,
            SessionPhase::Authenticated(identity) => SessionState::Authenticated(identity.clone()),
        })
        .unwrap_or(SessionState::Anonymous)
    }

    /// Remove a session. Removing an absent session is not an error.
    pub fn destroy(&self, token: &SessionToken) {
        if self.sessions.remove(token).is_some() {
            tracing::debug!(event = "session_destroyed", "Session removed");
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    /// Number of stored sessions, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run `f` on a live session, reclaiming it instead if it has expired.
    ///
    /// Returns `None` for unknown or expired tokens.
    fn with_live<R>(&self, token: &SessionToken, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R> {
        let now = Instant::now();
        match self.sessions.entry(token.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.remove();
                    tracing::debug!(event = "session_expired", "Expired session reclaimed on access");
                    None
                } else {
                    Some(f(occupied.get_mut()))
                }
            }
            Entry::Vacant(_) => None,
        }
    }
}

impl Default for SessionAuthority {
    fn default() -> Self {
        Self::new(SessionLifetimes::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_login(verifier: &str) -> PendingLogin {
        PendingLogin {
            verifier: PkceVerifier::new(verifier),
            csrf_state: "state-1".to_string(),
        }
    }

    fn alice() -> Identity {
        Identity::new("Alice").with_groups(["ops"])
    }

    #[test]
    fn test_token_entropy_and_uniqueness() {
        let authority = SessionAuthority::default();
        let t1 = authority.create_pending();
        let t2 = authority.create_pending();
        assert_eq!(t1.as_str().len(), 43);
        assert_ne!(t1, t2);
        assert_eq!(authority.len(), 2);
    }

    #[test]
    fn test_new_session_is_anonymous() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        assert_eq!(authority.lookup(&token), SessionState::Anonymous);
    }

    #[test]
    fn test_attach_moves_to_pending_login() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        assert_eq!(authority.lookup(&token), SessionState::PendingLogin);
    }

    #[test]
    fn test_attach_unknown_token_is_invalid_session() {
        let authority = SessionAuthority::default();
        let err = authority
            .attach_verifier(&SessionToken::from_client("forged"), pending_login("v"))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession));
    }

    #[test]
    fn test_attach_on_authenticated_session_fails() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        authority.consume_verifier(&token).unwrap();
        authority.authenticate(&token, alice()).unwrap();

        let err = authority.attach_verifier(&token, pending_login("v2")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession));
    }

    #[test]
    fn test_consume_verifier_is_one_shot() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("the-verifier")).unwrap();

        let first = authority.consume_verifier(&token).unwrap();
        assert_eq!(first.verifier.secret(), "the-verifier");
        assert_eq!(first.csrf_state, "state-1");

        let second = authority.consume_verifier(&token).unwrap_err();
        assert!(matches!(second, AuthError::NoPendingLogin));
    }

    #[test]
    fn test_consume_without_start_is_no_pending_login() {
        let authority = SessionAuthority::default();
        let anonymous = authority.create_pending();
        assert!(matches!(
            authority.consume_verifier(&anonymous),
            Err(AuthError::NoPendingLogin)
        ));
        assert!(matches!(
            authority.consume_verifier(&SessionToken::from_client("never-issued")),
            Err(AuthError::NoPendingLogin)
        ));
    }

    #[test]
    fn test_authenticate_after_consume() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        authority.consume_verifier(&token).unwrap();

        let identity = authority.authenticate(&token, alice()).unwrap();
        assert_eq!(identity.display_name, "Alice");

        let state = authority.lookup(&token);
        assert_eq!(state.identity().map(|i| i.display_name.as_str()), Some("Alice"));
        assert!(state.is_authenticated());
    }

    #[test]
    fn test_authenticate_requires_pending_login() {
        let authority = SessionAuthority::default();

        let anonymous = authority.create_pending();
        assert!(authority.authenticate(&anonymous, alice()).is_err());
        assert_eq!(authority.lookup(&anonymous), SessionState::Anonymous);

        let unknown = SessionToken::from_client("unknown");
        assert!(matches!(
            authority.authenticate(&unknown, alice()),
            Err(AuthError::InvalidSession)
        ));

        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        authority.authenticate(&token, alice()).unwrap();
        // Already authenticated: a second authenticate is rejected.
        assert!(matches!(
            authority.authenticate(&token, Identity::new("Mallory")),
            Err(AuthError::NoPendingLogin)
        ));
    }

    #[test]
    fn test_lookup_after_destroy_is_anonymous() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        authority.authenticate(&token, alice()).unwrap();

        authority.destroy(&token);
        assert_eq!(authority.lookup(&token), SessionState::Anonymous);
        // Idempotent
        authority.destroy(&token);
        assert!(authority.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_session_expires_after_pending_ttl() {
        let authority = SessionAuthority::new(SessionLifetimes {
            pending: Duration::from_secs(600),
            authenticated: Duration::from_secs(86_400),
        });
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(authority.lookup(&token), SessionState::PendingLogin);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(authority.lookup(&token), SessionState::Anonymous);
        assert!(matches!(
            authority.consume_verifier(&token),
            Err(AuthError::NoPendingLogin)
        ));
        assert!(authority.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_expiry_counts_from_login() {
        let authority = SessionAuthority::new(SessionLifetimes {
            pending: Duration::from_secs(600),
            authenticated: Duration::from_secs(3_600),
        });
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();

        // Log in late in the pending window; lifetime must restart at login.
        tokio::time::advance(Duration::from_secs(500)).await;
        authority.consume_verifier(&token).unwrap();
        authority.authenticate(&token, alice()).unwrap();

        tokio::time::advance(Duration::from_secs(3_000)).await;
        assert!(authority.lookup(&token).is_authenticated());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(authority.lookup(&token), SessionState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let authority = SessionAuthority::new(SessionLifetimes {
            pending: Duration::from_secs(60),
            authenticated: Duration::from_secs(3_600),
        });
        let abandoned = authority.create_pending();
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();
        authority.authenticate(&token, alice()).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(authority.sweep_expired(), 1);
        assert_eq!(authority.len(), 1);
        assert_eq!(authority.lookup(&abandoned), SessionState::Anonymous);
        assert!(authority.lookup(&token).is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_consume_yields_single_winner() {
        let authority = Arc::new(SessionAuthority::default());
        let token = authority.create_pending();
        authority.attach_verifier(&token, pending_login("v")).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let authority = authority.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                authority.consume_verifier(&token).is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let authority = SessionAuthority::default();
        let token = authority.create_pending();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
