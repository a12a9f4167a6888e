use std::env;
use std::time::Duration;

use crate::auth::session::SessionLifetimes;

/// Upper bound for session lifetimes (one year)
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Where the service catalog comes from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Catalog provided as JSON string via SERVICES_CONFIG env var
    Json(String),
    /// Catalog loaded from file path via SERVICES_CONFIG_PATH env var
    File(String),
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// `None` means an empty catalog
    pub source: Option<CatalogSource>,
}

/// Identity provider settings
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    /// Absent for public clients
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
    /// Delay between discovery attempts while the provider is unreachable
    pub discovery_retry_secs: u64,
}

/// WiFi details surfaced verbatim to the landing page
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WifiSettings {
    pub enabled: bool,
    pub ssid: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    /// Directory holding the landing page assets
    pub public_dir: String,

    pub oidc: OidcSettings,

    // Session configuration
    pub session_cookie_name: String,
    pub session_ttl_secs: u64,
    pub pending_login_ttl_secs: u64,
    pub session_sweep_interval_secs: u64,

    pub catalog: CatalogConfig,
    pub wifi: WifiSettings,
}

impl Config {
    /// Load configuration from environment variables using std::env::var
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| {
            optional(key)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let environment = match optional("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let oidc = OidcSettings {
            issuer: required("OIDC_ISSUER")?,
            client_id: required("OIDC_CLIENT_ID")?,
            client_secret: optional("OIDC_CLIENT_SECRET"),
            redirect_uri: required("OIDC_REDIRECT_URI")?,
            scope: optional("OIDC_SCOPE")
                .unwrap_or_else(|| "openid profile email groups".to_string()),
            http_connect_timeout_secs: number("HTTP_CONNECT_TIMEOUT_SECS", 10),
            http_request_timeout_secs: number("HTTP_REQUEST_TIMEOUT_SECS", 30),
            discovery_retry_secs: number("OIDC_DISCOVERY_RETRY_SECS", 30).max(1),
        };

        let server_host = optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        // PORT wins over SERVER_PORT; container platforms usually set PORT
        let server_port = optional("PORT")
            .or_else(|| optional("SERVER_PORT"))
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);

        // Catalog: JSON env var first, file path second, otherwise empty
        let catalog_source = if let Some(json) = optional("SERVICES_CONFIG") {
            Some(CatalogSource::Json(json))
        } else {
            optional("SERVICES_CONFIG_PATH").map(CatalogSource::File)
        };

        let wifi = WifiSettings {
            enabled: optional("WIFI_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ssid: optional("WIFI_SSID").unwrap_or_default(),
        };

        Ok(Config {
            environment,
            server_host,
            server_port,
            public_dir: optional("PUBLIC_DIR").unwrap_or_else(|| "public".to_string()),
            oidc,
            session_cookie_name: optional("SESSION_COOKIE_NAME")
                .unwrap_or_else(|| "gateway_session".to_string()),
            session_ttl_secs: number("SESSION_TTL_SECS", 24 * 60 * 60)
                .clamp(1, MAX_SESSION_TTL_SECS),
            pending_login_ttl_secs: number("PENDING_LOGIN_TTL_SECS", 10 * 60)
                .clamp(1, MAX_SESSION_TTL_SECS),
            session_sweep_interval_secs: number("SESSION_SWEEP_INTERVAL_SECS", 60).max(1),
            catalog: CatalogConfig {
                source: catalog_source,
            },
            wifi,
        })
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn session_lifetimes(&self) -> SessionLifetimes {
        SessionLifetimes {
            pending: Duration::from_secs(self.pending_login_ttl_secs),
            authenticated: Duration::from_secs(self.session_ttl_secs),
        }
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
