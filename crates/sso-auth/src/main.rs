//! SSO Authentication Service
//!
//! Entry point for the portal's bearer-token authentication service.
//! Verifies IdP-issued tokens and resolves them to portal identities.

use sso_auth::auth::{HttpJwksFetcher, JwksCache, SystemClock, TokenValidator};
use sso_auth::config::Config;
use sso_auth::directory::{DirectoryError, InMemoryUserDirectory, UserDirectory};
use sso_auth::gate::AuthGate;
use sso_auth::middleware::AuthState;
use sso_auth::observability::metrics::init_metrics_recorder;
use sso_auth::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DRAIN_SECONDS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sso_auth=info,sso=info,common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SSO Authentication Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        issuer = %config.expected_issuer,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl.as_secs(),
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder (before any metrics are recorded)
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Key cache: constructed once, warmed up best-effort, lazily populated otherwise
    let clock = Arc::new(SystemClock);
    let jwks = Arc::new(JwksCache::with_ttl(
        Arc::new(HttpJwksFetcher::new(config.jwks_url.clone())),
        clock.clone(),
        config.jwks_cache_ttl,
    ));
    if jwks.warm_up().await.is_err() {
        warn!("Starting without cached signing keys; /ready reports not_ready until a fetch succeeds");
    }

    let validator = Arc::new(TokenValidator::new(
        Arc::clone(&jwks),
        clock,
        config.expected_issuer.clone(),
        config.expected_audience.clone(),
        config.jwt_clock_skew,
    ));

    let directory = load_directory(&config)?;

    let auth_state = Arc::new(AuthState {
        gate: Arc::new(AuthGate::new(validator, directory)),
    });

    let state = Arc::new(AppState { jwks });

    let app = routes::build_routes(state, auth_state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("SSO Authentication Service listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("SSO Authentication Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain = drain_period();
    if !drain.is_zero() {
        warn!(drain_seconds = drain.as_secs(), "Draining connections before shutdown");
        tokio::time::sleep(drain).await;
        info!("Drain period complete");
    }
}

/// Build the user directory from `USER_DIRECTORY_PATH`, or an empty one.
fn load_directory(config: &Config) -> Result<Arc<dyn UserDirectory>, DirectoryError> {
    let Some(path) = &config.user_directory_path else {
        warn!("USER_DIRECTORY_PATH not set; every authenticated user will be rejected as unknown");
        return Ok(Arc::new(InMemoryUserDirectory::default()));
    };

    let directory = InMemoryUserDirectory::from_json_file(path).map_err(|e| {
        error!("Failed to load user directory: {}", e);
        e
    })?;
    info!(users = directory.len(), path = %path.display(), "User directory loaded");
    Ok(Arc::new(directory))
}

/// Time to keep serving after a shutdown signal, so the load balancer can
/// observe the instance going away (`SSO_DRAIN_SECONDS`, default 5).
fn drain_period() -> Duration {
    let seconds = std::env::var("SSO_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_DRAIN_SECONDS);
    Duration::from_secs(seconds)
}
