//! Guildgate - Discord guild-gated loan request portal
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Front (Axum)                       │
//! │  - /auth/*  Discord OAuth + guild gate                       │
//! │  - /api/*   session accessors, loan relay                    │
//! │  - /*       static portal assets                             │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                  │
//! ┌───────────────────────────┐      ┌───────────────────────────┐
//! │  Discord REST API          │      │  Webhook sink              │
//! │  token, profile, guilds    │      │  loan notifications        │
//! └───────────────────────────┘      └───────────────────────────┘
//! ```
//!
//! Sessions live entirely in an HMAC-signed cookie; the server keeps
//! no per-user state between requests.
//!
//! # Modules
//!
//! - `api`: JSON endpoints and metrics
//! - `auth`: Discord OAuth, guild gate, sessions
//! - `relay`: loan form and webhook delivery
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything in here is immutable after start-up.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Discord identity client
    pub discord: Arc<auth::DiscordClient>,

    /// Loan request webhook
    pub webhook: Arc<relay::WebhookNotifier>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Guildgate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let http_client = Arc::new(http_client);

        let discord = auth::DiscordClient::new(http_client.clone(), &config);
        let webhook = relay::WebhookNotifier::new(http_client.clone(), config.relay.webhook_url());

        if !webhook.is_configured() {
            tracing::warn!("relay.webhook_url is not set; loan submissions will be rejected");
        }

        tracing::info!(
            guild_id = %config.discord.guild_id,
            membership_mode = ?config.discord.membership_mode,
            webhook_configured = webhook.is_configured(),
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            discord: Arc::new(discord),
            webhook: Arc::new(webhook),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use axum::routing::{get, post};
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);
    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .merge(auth::auth_router())
        .nest("/api", api::api_router())
        .route("/submit-loan", post(api::submit_loan))
        .merge(api::metrics_router())
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let allowed_origin = server.base_url();
    if !allowed_origin.starts_with("https://") {
        return CorsLayer::permissive();
    }

    let origin = allowed_origin.trim_end_matches('/');
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from public URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods([Method::GET, Method::POST])
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
