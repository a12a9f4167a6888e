use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors raised by the login flow and by protected endpoints.
///
/// None of these are retried by the gateway. A failed login must be
/// restarted from `/auth/login`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Session token unknown, expired, or in the wrong state for the operation.
    #[error("invalid session")]
    InvalidSession,

    /// Callback arrived without a matching login start (or the verifier was already used).
    #[error("no pending login for this session")]
    NoPendingLogin,

    /// The identity provider rejected the authorization code.
    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The identity provider could not return user info for the granted token.
    #[error("user info unavailable: {0}")]
    UserInfoUnavailable(String),

    /// Identity provider client not initialized (discovery has not succeeded yet).
    #[error("identity provider not configured")]
    ConfigurationMissing,

    /// Protected endpoint requested without an authenticated session.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error ends a login attempt and should read as a generic failure.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidSession
                | AuthError::NoPendingLogin
                | AuthError::ExchangeFailed(_)
                | AuthError::UserInfoUnavailable(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Login failures share one body so clients learn nothing about token validity.
        if self.is_login_failure() {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication failed" })),
            )
                .into_response();
        }

        match self {
            AuthError::ConfigurationMissing => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "OIDC not configured" })),
            )
                .into_response(),

            AuthError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not authenticated" })),
            )
                .into_response(),

            _ => {
                tracing::error!(error = %self, "Internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_failures_share_generic_status() {
        for err in [
            AuthError::InvalidSession,
            AuthError::NoPendingLogin,
            AuthError::ExchangeFailed("invalid_grant".to_string()),
            AuthError::UserInfoUnavailable("timeout".to_string()),
        ] {
            assert!(err.is_login_failure());
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_configuration_missing_is_service_unavailable() {
        let response = AuthError::ConfigurationMissing.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unauthenticated_is_401() {
        assert!(!AuthError::Unauthenticated.is_login_failure());
        let response = AuthError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_is_500() {
        let response = AuthError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
