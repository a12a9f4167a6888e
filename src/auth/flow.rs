//! Login flow orchestration
//!
//! ```text
//! Start ──> Redirected ──> Callback ──> Authenticated
//!                                  └──> Failed (restart from Start)
//! ```
//!
//! Nothing here is retried. A failed callback has already burned the
//! pending verifier, so the client must go through `start` again and gets a
//! new session and a new PKCE pair.

use std::sync::Arc;

use oauth2::CsrfToken;
use serde::Deserialize;
use url::Url;

use super::error::AuthError;
use super::pkce::PkcePair;
use super::provider::{AuthorizationRequest, ProviderSlot};
use super::session::{Identity, PendingLogin, SessionAuthority, SessionToken};
use crate::services::{build_group_set, filter_catalog, Section};

/// Query parameters the identity provider appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of starting a login: the new session and where to send the browser.
#[derive(Debug)]
pub struct LoginRedirect {
    pub token: SessionToken,
    pub url: Url,
}

pub struct AuthFlow {
    sessions: Arc<SessionAuthority>,
    provider: Arc<ProviderSlot>,
    scope: String,
    catalog: Arc<Vec<Section>>,
}

impl AuthFlow {
    pub fn new(
        sessions: Arc<SessionAuthority>,
        provider: Arc<ProviderSlot>,
        scope: impl Into<String>,
        catalog: Arc<Vec<Section>>,
    ) -> Self {
        Self {
            sessions,
            provider,
            scope: scope.into(),
            catalog,
        }
    }

    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    pub fn provider(&self) -> &ProviderSlot {
        &self.provider
    }

    /// Begin a login attempt.
    ///
    /// Any session the client already holds is discarded, so every attempt
    /// gets a fresh token.
    pub async fn start(&self, previous: Option<&SessionToken>) -> Result<LoginRedirect, AuthError> {
        let provider = self.provider.get().await?;

        if let Some(previous) = previous {
            self.sessions.destroy(previous);
        }

        let token = self.sessions.create_pending();
        let pkce = PkcePair::generate();
        let csrf_state = CsrfToken::new_random().secret().clone();

        let url = match provider.authorization_url(&AuthorizationRequest {
            challenge: &pkce.challenge,
            method: pkce.method,
            scope: &self.scope,
            state: &csrf_state,
        }) {
            Ok(url) => url,
            Err(e) => {
                self.sessions.destroy(&token);
                return Err(e);
            }
        };

        self.sessions.attach_verifier(
            &token,
            PendingLogin {
                verifier: pkce.verifier,
                csrf_state,
            },
        )?;

        tracing::info!(
            event = "login_started",
            replaced_session = previous.is_some(),
            "Redirecting to identity provider"
        );

        Ok(LoginRedirect { token, url })
    }

    /// Finish a login attempt from the provider callback.
    ///
    /// The verifier is consumed before anything else is checked, so each
    /// pending login gets exactly one callback.
    pub async fn complete(
        &self,
        token: Option<&SessionToken>,
        params: CallbackParams,
    ) -> Result<Arc<Identity>, AuthError> {
        let provider = self.provider.get().await?;

        let Some(token) = token else {
            tracing::warn!(event = "callback_without_session", "Callback without session cookie");
            return Err(AuthError::InvalidSession);
        };

        let pending = self.sessions.consume_verifier(token).map_err(|e| {
            tracing::warn!(event = "callback_without_pending_login", error = %e, "Callback rejected");
            e
        })?;

        if let Some(error) = params.error {
            tracing::warn!(
                event = "provider_error",
                error = %error,
                description = ?params.error_description,
                "Identity provider reported an authorization error"
            );
            return Err(AuthError::ExchangeFailed(error));
        }

        if params.state.as_deref() != Some(pending.csrf_state.as_str()) {
            tracing::warn!(event = "callback_state_mismatch", "CSRF validation failed: state mismatch");
            return Err(AuthError::ExchangeFailed("state mismatch".to_string()));
        }

        let Some(code) = params.code else {
            tracing::warn!(event = "callback_missing_code", "No authorization code received");
            return Err(AuthError::ExchangeFailed(
                "missing authorization code".to_string(),
            ));
        };

        let grant = provider
            .exchange_code(&code, &pending.verifier)
            .await
            .map_err(|e| {
                tracing::error!(event = "code_exchange_failed", error = %e, "Failed to exchange code");
                e
            })?;

        let identity = provider.fetch_user_info(&grant).await.map_err(|e| {
            tracing::error!(event = "userinfo_failed", error = %e, "Failed to fetch user info");
            e
        })?;

        let identity = self.sessions.authenticate(token, identity)?;

        tracing::info!(
            event = "login_succeeded",
            user = %identity.display_name,
            groups = ?identity.groups,
            "Authentication successful"
        );

        Ok(identity)
    }

    /// End the session. Always succeeds.
    pub fn logout(&self, token: Option<&SessionToken>) {
        if let Some(token) = token {
            self.sessions.destroy(token);
        }
        tracing::info!(event = "logout", had_session = token.is_some(), "Session ended");
    }

    /// Identity of an authenticated session, `None` for anything else.
    pub fn current_identity(&self, token: Option<&SessionToken>) -> Option<Arc<Identity>> {
        token.and_then(|t| self.sessions.lookup(t).identity().cloned())
    }

    /// The catalog as seen by this identity. Recomputed on every call.
    pub fn visible_services(&self, identity: &Identity) -> Vec<Section> {
        let groups = build_group_set(&identity.groups);
        let visible = filter_catalog(&self.catalog, &groups);

        tracing::debug!(
            user = %identity.display_name,
            groups = ?identity.groups,
            total_sections = self.catalog.len(),
            visible_sections = visible.len(),
            "Filtered catalog for user"
        );

        visible
    }
}
