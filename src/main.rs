use anyhow::Result;
use auth_gateway::{
    auth::{AuthFlow, OidcProvider, ProviderSlot, SessionAuthority},
    config::{Config, OidcSettings},
    services, web, AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting auth gateway");

    // Load configuration from environment
    let config = Config::load()?;
    tracing::info!(
        environment = ?config.environment,
        issuer = %config.oidc.issuer,
        client_id = %config.oidc.client_id,
        public_dir = %config.public_dir,
        "Configuration loaded"
    );

    // Load and validate catalog (logs summary internally)
    let catalog = services::load_catalog(&config.catalog)?;

    let sessions = Arc::new(SessionAuthority::new(config.session_lifetimes()));
    let provider = Arc::new(ProviderSlot::empty());

    // Logins answer 503 until discovery succeeds; the process stays up meanwhile
    spawn_provider_discovery(config.oidc.clone(), provider.clone());
    spawn_session_sweeper(
        sessions.clone(),
        Duration::from_secs(config.session_sweep_interval_secs),
    );

    let flow = Arc::new(AuthFlow::new(
        sessions,
        provider,
        config.oidc.scope.clone(),
        Arc::new(catalog),
    ));

    let bind_address = config.bind_address();
    let state = Arc::new(AppState {
        config: Arc::new(config),
        flow,
    });

    let app = web::create_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Auth gateway listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Auth gateway stopped");
    Ok(())
}

/// Discover the provider in the background, retrying at a fixed interval.
fn spawn_provider_discovery(settings: OidcSettings, slot: Arc<ProviderSlot>) {
    tokio::spawn(async move {
        let mut retry = tokio::time::interval(Duration::from_secs(settings.discovery_retry_secs));
        let mut attempt: u32 = 0;
        loop {
            retry.tick().await;
            attempt += 1;
            match OidcProvider::discover(&settings).await {
                Ok(provider) => {
                    slot.install(Arc::new(provider)).await;
                    tracing::info!(
                        event = "provider_ready",
                        issuer = %settings.issuer,
                        attempt,
                        "Identity provider discovered - readiness check will pass"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        event = "provider_discovery_failed",
                        issuer = %settings.issuer,
                        attempt,
                        retry_in_secs = settings.discovery_retry_secs,
                        error = %e,
                        "OIDC discovery failed"
                    );
                }
            }
        }
    });
}

/// Periodically drop expired sessions so abandoned logins don't accumulate.
fn spawn_session_sweeper(sessions: Arc<SessionAuthority>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sessions.sweep_expired();
            if removed > 0 {
                tracing::debug!(
                    event = "sessions_swept",
                    removed,
                    remaining = sessions.len(),
                    "Expired sessions removed"
                );
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
