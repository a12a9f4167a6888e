//! Identity provider adapter
//!
//! The login flow depends only on [`IdentityProvider`]: build an
//! authorization URL, exchange a code, fetch user info. [`OidcProvider`] is
//! the concrete implementation backed by OIDC discovery, the `oauth2` crate
//! and `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AccessToken, AuthUrl, AuthorizationCode, ClientId, ClientSecret,
    CsrfToken, EndpointNotSet, EndpointSet, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
    TokenUrl,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use super::error::AuthError;
use super::helpers::create_http_client;
use super::pkce::PkceVerifier;
use super::session::Identity;
use crate::config::OidcSettings;

// =============================================================================
// Capability interface
// =============================================================================

/// Inputs for the provider's authorization redirect.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub challenge: &'a str,
    pub method: &'a str,
    pub scope: &'a str,
    pub state: &'a str,
}

/// Credential returned by a successful code exchange.
///
/// The gateway only hands it back to the provider for the user-info call.
#[derive(Debug, Clone)]
pub struct ProviderGrant {
    access_token: AccessToken,
}

impl ProviderGrant {
    pub fn new(access_token: AccessToken) -> Self {
        Self { access_token }
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start the login.
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<Url, AuthError>;

    /// Trade an authorization code plus PKCE verifier for a grant.
    /// Fails with [`AuthError::ExchangeFailed`].
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<ProviderGrant, AuthError>;

    /// Fetch normalized claims for a grant.
    /// Fails with [`AuthError::UserInfoUnavailable`].
    async fn fetch_user_info(&self, grant: &ProviderGrant) -> Result<Identity, AuthError>;
}

// =============================================================================
// Provider slot
// =============================================================================

/// Holds the provider once discovery has succeeded.
///
/// Empty until then, and login attempts fail fast with
/// [`AuthError::ConfigurationMissing`].
#[derive(Default)]
pub struct ProviderSlot {
    inner: RwLock<Option<Arc<dyn IdentityProvider>>>,
}

impl ProviderSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            inner: RwLock::new(Some(provider)),
        }
    }

    pub async fn install(&self, provider: Arc<dyn IdentityProvider>) {
        *self.inner.write().await = Some(provider);
    }

    pub async fn get(&self) -> Result<Arc<dyn IdentityProvider>, AuthError> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or(AuthError::ConfigurationMissing)
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

// =============================================================================
// OIDC implementation
// =============================================================================

type ConfiguredOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Subset of the discovery document the gateway needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    /// Some providers send `null` instead of omitting the claim
    #[serde(default)]
    groups: Option<Vec<String>>,
}

impl UserInfoClaims {
    fn into_identity(self) -> Result<Identity, AuthError> {
        let display_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or(self.preferred_username.filter(|n| !n.trim().is_empty()))
            .or(self.sub)
            .ok_or_else(|| {
                AuthError::UserInfoUnavailable("user info carries no usable name".to_string())
            })?;

        let identity = Identity::new(display_name).with_groups(self.groups.unwrap_or_default());
        Ok(match self.email {
            Some(email) => identity.with_email(email),
            None => identity,
        })
    }
}

/// Discovery document location for an issuer URL.
pub fn discovery_url(issuer: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )
}

pub struct OidcProvider {
    client: ConfiguredOAuthClient,
    userinfo_endpoint: Url,
    http: reqwest::Client,
}

impl OidcProvider {
    /// Fetch the discovery document and build the client from it.
    pub async fn discover(settings: &OidcSettings) -> anyhow::Result<Self> {
        let http = create_http_client(
            settings.http_connect_timeout_secs,
            settings.http_request_timeout_secs,
        )?;

        let url = discovery_url(&settings.issuer);
        tracing::info!(url = %url, "Fetching OIDC discovery document");

        let metadata: ProviderMetadata = http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(
            issuer = %metadata.issuer,
            authorization_endpoint = %metadata.authorization_endpoint,
            "OIDC discovery succeeded"
        );

        Self::from_metadata(settings, &metadata, http)
    }

    pub fn from_metadata(
        settings: &OidcSettings,
        metadata: &ProviderMetadata,
        http: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let auth_url = AuthUrl::new(metadata.authorization_endpoint.clone())
            .map_err(|e| anyhow::anyhow!("Invalid authorization endpoint: {}", e))?;
        let token_url = TokenUrl::new(metadata.token_endpoint.clone())
            .map_err(|e| anyhow::anyhow!("Invalid token endpoint: {}", e))?;
        let redirect_url = RedirectUrl::new(settings.redirect_uri.clone())
            .map_err(|e| anyhow::anyhow!("Invalid redirect URL: {}", e))?;
        let userinfo_endpoint = Url::parse(&metadata.userinfo_endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid userinfo endpoint: {}", e))?;

        let client = BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // Public client unless a secret is configured.
        let client = match &settings.client_secret {
            Some(secret) => client.set_client_secret(ClientSecret::new(secret.clone())),
            None => client,
        };

        Ok(Self {
            client,
            userinfo_endpoint,
            http,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<Url, AuthError> {
        let state = CsrfToken::new(request.state.to_string());
        let mut builder = self
            .client
            .authorize_url(move || state)
            .add_extra_param("code_challenge", request.challenge)
            .add_extra_param("code_challenge_method", request.method);

        for scope in request.scope.split_whitespace() {
            builder = builder.add_scope(Scope::new(scope.to_string()));
        }

        let (url, _) = builder.url();
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<ProviderGrant, AuthError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier.secret().to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        Ok(ProviderGrant::new(token.access_token().clone()))
    }

    async fn fetch_user_info(&self, grant: &ProviderGrant) -> Result<Identity, AuthError> {
        let claims: UserInfoClaims = self
            .http
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(grant.access_token().secret())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::UserInfoUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::UserInfoUnavailable(e.to_string()))?;

        claims.into_identity()
    }
}
