use crate::{
    auth::extractors::{AuthenticatedSession, SessionCookie},
    auth::helpers::is_secure_transport,
    config::WifiSettings,
    services::Section,
    AppState,
};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Liveness probe - always returns OK if the process is running
pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - checks if the service is ready to handle logins
///
/// Returns 200 OK once provider discovery has succeeded, 503 before that.
pub async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.flow.provider().is_ready().await {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!("Readiness check failed: identity provider not initialized");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready: identity provider not initialized",
        )
    }
}

/// Public page bootstrap data
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub wifi: WifiSettings,
    pub is_authenticated: bool,
    pub is_https: bool,
}

pub async fn config_handler(
    State(state): State<Arc<AppState>>,
    SessionCookie(token): SessionCookie,
    uri: Uri,
    headers: HeaderMap,
) -> Json<PageConfig> {
    Json(PageConfig {
        wifi: state.config.wifi.clone(),
        is_authenticated: state.flow.current_identity(token.as_ref()).is_some(),
        is_https: is_secure_transport(&uri, &headers),
    })
}

pub async fn user_handler(AuthenticatedSession { identity, .. }: AuthenticatedSession) -> Response {
    Json(identity.as_ref()).into_response()
}

pub async fn services_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedSession { identity, .. }: AuthenticatedSession,
) -> Json<Vec<Section>> {
    Json(state.flow.visible_services(&identity))
}
