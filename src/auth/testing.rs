//! In-process identity provider for flow and router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use oauth2::AccessToken;
use url::Url;

use super::error::AuthError;
use super::flow::CallbackParams;
use super::pkce::{challenge_for, PkceVerifier};
use super::provider::{AuthorizationRequest, IdentityProvider, ProviderGrant};
use super::session::Identity;
use crate::services::{Section, ServiceEntry};

pub const VALID_CODE: &str = "valid-code";

enum Behavior {
    Accept(Identity),
    NoUserInfo,
    Hang,
}

/// Accepts [`VALID_CODE`] as long as the verifier matches a challenge it
/// handed out earlier, like a real authorization server would.
pub struct FakeProvider {
    behavior: Behavior,
    challenges: Mutex<HashMap<String, String>>,
}

impl FakeProvider {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            challenges: Mutex::new(HashMap::new()),
        }
    }

    pub fn accepting(identity: Identity) -> Self {
        Self::with_behavior(Behavior::Accept(identity))
    }

    pub fn without_user_info() -> Self {
        Self::with_behavior(Behavior::NoUserInfo)
    }

    /// Token exchange never completes.
    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Result<Url, AuthError> {
        self.challenges
            .lock()
            .unwrap()
            .insert(request.state.to_string(), request.challenge.to_string());

        let mut url = Url::parse("https://idp.example.test/authorize").unwrap();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", "gateway")
            .append_pair("scope", request.scope)
            .append_pair("state", request.state)
            .append_pair("code_challenge", request.challenge)
            .append_pair("code_challenge_method", request.method);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<ProviderGrant, AuthError> {
        if matches!(self.behavior, Behavior::Hang) {
            std::future::pending::<()>().await;
        }
        if code != VALID_CODE {
            return Err(AuthError::ExchangeFailed("invalid_grant".to_string()));
        }

        let challenge = challenge_for(verifier.secret());
        let known = self
            .challenges
            .lock()
            .unwrap()
            .values()
            .any(|c| *c == challenge);
        if !known {
            return Err(AuthError::ExchangeFailed(
                "PKCE verification failed".to_string(),
            ));
        }

        Ok(ProviderGrant::new(AccessToken::new(
            "fake-access-token".to_string(),
        )))
    }

    async fn fetch_user_info(&self, grant: &ProviderGrant) -> Result<Identity, AuthError> {
        assert_eq!(grant.access_token().secret(), "fake-access-token");
        match &self.behavior {
            Behavior::Accept(identity) => Ok(identity.clone()),
            _ => Err(AuthError::UserInfoUnavailable("503 from userinfo".to_string())),
        }
    }
}

/// Callback parameters the provider would send back for this redirect.
pub fn callback_for(redirect: &Url, code: &str) -> CallbackParams {
    let state = redirect
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned());

    CallbackParams {
        code: Some(code.to_string()),
        state,
        ..Default::default()
    }
}

fn service(title: &str, groups: &[&str]) -> ServiceEntry {
    ServiceEntry {
        title: title.to_string(),
        url: format!("https://{}.example.test", title.to_lowercase()),
        icon: "fas fa-link".to_string(),
        description: None,
        tags: vec![],
        required_groups: groups.iter().map(|g| g.to_string()).collect(),
    }
}

pub fn sample_catalog() -> Vec<Section> {
    vec![
        Section {
            name: "Infrastructure".to_string(),
            icon: "fas fa-server".to_string(),
            description: None,
            services: vec![service("Grafana", &["ops"]), service("Wiki", &[])],
        },
        Section {
            name: "Admin".to_string(),
            icon: "fas fa-lock".to_string(),
            description: None,
            services: vec![service("Authentik", &["admins"])],
        },
    ]
}
