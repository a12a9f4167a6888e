//! Authentication handlers for login, callback, and logout flows
//!
//! Thin HTTP wrappers around [`AuthFlow`](super::flow::AuthFlow):
//! - `login_handler`: starts the authorization code flow with PKCE
//! - `callback_handler`: finishes it and upgrades the session
//! - `logout_handler`: destroys the session and expires the cookie

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, Uri},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::error::AuthError;
use super::extractors::SessionCookie;
use super::flow::CallbackParams;
use super::helpers::{clear_session_cookie, header_value, is_secure_transport, session_cookie};
use crate::AppState;

/// Redirect with the given `Set-Cookie` value attached.
fn redirect_with_cookie(location: &str, cookie: &str) -> Result<Response, AuthError> {
    let mut response = Redirect::to(location).into_response();
    response
        .headers_mut()
        .insert(SET_COOKIE, header_value(cookie)?);
    Ok(response)
}

/// Login handler - initiates the authorization code flow
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    SessionCookie(previous): SessionCookie,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    tracing::info!("Login requested");

    let redirect = state.flow.start(previous.as_ref()).await?;

    let secure = is_secure_transport(&uri, &headers);
    let cookie = session_cookie(
        &state.config.session_cookie_name,
        redirect.token.as_str(),
        state.flow.sessions().lifetimes().pending.as_secs(),
        secure,
    );

    redirect_with_cookie(redirect.url.as_str(), &cookie)
}

/// Callback handler - exchanges the code and authenticates the session
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    SessionCookie(token): SessionCookie,
    Query(params): Query<CallbackParams>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    tracing::info!(
        has_session = token.is_some(),
        has_code = params.code.is_some(),
        "OAuth callback received"
    );

    state.flow.complete(token.as_ref(), params).await?;

    // complete() only succeeds with a token present
    let token = token.ok_or(AuthError::InvalidSession)?;

    let secure = is_secure_transport(&uri, &headers);
    let cookie = session_cookie(
        &state.config.session_cookie_name,
        token.as_str(),
        state.flow.sessions().lifetimes().authenticated.as_secs(),
        secure,
    );

    redirect_with_cookie("/", &cookie)
}

/// Logout handler - GET and POST both end the session
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    SessionCookie(token): SessionCookie,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    state.flow.logout(token.as_ref());

    let secure = is_secure_transport(&uri, &headers);
    redirect_with_cookie(
        "/",
        &clear_session_cookie(&state.config.session_cookie_name, secure),
    )
}
