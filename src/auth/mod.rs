//! Authentication module
//!
//! OIDC authorization code flow with PKCE and server-side sessions.
//!
//! ## Structure
//!
//! - `pkce`: verifier/challenge generation (S256)
//! - `session`: the session authority and its state machine
//! - `provider`: identity provider trait, OIDC discovery implementation
//! - `flow`: login orchestration over sessions and provider
//! - `extractors`: Axum extractors for the session cookie
//! - `helpers`: Pure helper functions (cookies, transport detection, HTTP client)
//! - `handlers`: HTTP handlers for login, callback, and logout
//! - `error`: error taxonomy and its HTTP mapping
//!
//! ## Authentication Flow
//!
//! 1. User visits `/auth/login` → pending session cookie, redirect to the provider
//! 2. Provider authenticates → redirect to `/auth/callback?code&state`
//! 3. Gateway exchanges code + verifier, fetches userinfo → session authenticated → redirect to `/`
//! 4. User visits `/auth/logout` → session destroyed, cookie expired → redirect to `/`

pub mod error;
pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod helpers;
pub mod pkce;
pub mod provider;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AuthError;
pub use flow::{AuthFlow, CallbackParams, LoginRedirect};
pub use handlers::{callback_handler, login_handler, logout_handler};
pub use provider::{IdentityProvider, OidcProvider, ProviderSlot};
pub use session::{Identity, SessionAuthority, SessionState, SessionToken};
