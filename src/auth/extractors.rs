use crate::auth::error::AuthError;
use crate::auth::helpers::extract_cookie;
use crate::auth::session::{Identity, SessionToken};
use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::sync::Arc;

/// Session token from the cookie, if the client sent one.
///
/// Never rejects. Whether the token means anything is up to the session
/// authority.
pub struct SessionCookie(pub Option<SessionToken>);

impl FromRequestParts<Arc<AppState>> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_cookie(&parts.headers, &state.config.session_cookie_name)
            .filter(|v| !v.is_empty())
            .map(SessionToken::from_client);
        Ok(SessionCookie(token))
    }
}

/// Authenticated session extractor
///
/// Rejects with [`AuthError::Unauthenticated`] unless the cookie names a live,
/// authenticated session.
///
/// Usage:
/// ```rust,ignore
/// async fn handler(AuthenticatedSession { identity, .. }: AuthenticatedSession) {
///     println!("User: {}, Groups: {:?}", identity.display_name, identity.groups);
/// }
/// ```
pub struct AuthenticatedSession {
    pub identity: Arc<Identity>,
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let SessionCookie(token) = match SessionCookie::from_request_parts(parts, state).await {
            Ok(cookie) => cookie,
            Err(never) => match never {},
        };

        let Some(token) = token else {
            tracing::debug!(path = %parts.uri.path(), "Request without session cookie");
            return Err(AuthError::Unauthenticated);
        };

        let identity = state.flow.current_identity(Some(&token)).ok_or_else(|| {
            tracing::debug!(path = %parts.uri.path(), "Session is not authenticated");
            AuthError::Unauthenticated
        })?;

        if identity.groups.is_empty() {
            tracing::debug!(
                user = %identity.display_name,
                "User has no groups - only unrestricted services will be visible"
            );
        }

        Ok(AuthenticatedSession { identity })
    }
}
