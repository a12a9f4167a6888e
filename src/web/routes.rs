use super::handlers::{
    config_handler, healthz_handler, readyz_handler, services_handler, user_handler,
};
use crate::{
    auth::{callback_handler, login_handler, logout_handler},
    AppState,
};
use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_dir = Path::new(&state.config.public_dir);
    // Unknown paths get the landing page so client-side routes survive a reload
    let static_files =
        ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/api/config", get(config_handler))
        .route("/api/user", get(user_handler))
        .route("/api/services", get(services_handler))
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", get(logout_handler).post(logout_handler))
        .fallback_service(static_files)
        .with_state(state)
}
