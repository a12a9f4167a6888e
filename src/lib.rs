//! Authenticating gateway library
//!
//! OIDC login with PKCE, server-side sessions and a group-filtered service
//! catalog for the landing page.

#![deny(dead_code)]

pub mod auth;
pub mod config;
pub mod services;
pub mod web;

use auth::flow::AuthFlow;
use config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Sessions, provider slot and catalog behind the login flow
    pub flow: Arc<AuthFlow>,
}
