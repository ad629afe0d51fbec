//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (GUILDGATE__*)
//! 4. Plain deployment variables (APP_URL, PORT, CLIENT_ID, ...)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub discord: DiscordConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Public base URL (e.g., "https://loans.example.com")
    ///
    /// Falls back to `http://localhost:{port}` when unset.
    pub public_url: Option<String>,
    /// Directory served for unmatched GET requests
    pub static_dir: PathBuf,
    /// Honor `X-Forwarded-Proto` from a reverse proxy
    #[serde(default)]
    pub trust_proxy: bool,
}

impl ServerConfig {
    /// Get the public base URL without a trailing slash
    pub fn base_url(&self) -> String {
        match self.public_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.port),
        }
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 86400 = 24 hours)
    pub session_max_age: i64,
}

/// How guild membership is verified after login
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipMode {
    /// List the user's own guilds with their access token
    #[default]
    UserGuilds,
    /// Look the user up in the guild member list with a bot token
    BotLookup,
}

impl MembershipMode {
    /// OAuth scope requested at login
    pub fn scope(self) -> &'static str {
        match self {
            MembershipMode::UserGuilds => "identify guilds",
            MembershipMode::BotLookup => "identify",
        }
    }
}

/// Discord OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth callback URL
    ///
    /// Defaults to `{public_url}/auth/discord/callback`.
    pub redirect_uri: Option<String>,
    /// Guild the user must belong to
    pub guild_id: String,
    /// Bot token, required for `bot_lookup`
    pub bot_token: Option<String>,
    #[serde(default)]
    pub membership_mode: MembershipMode,
    /// REST API base (e.g., "https://discord.com/api")
    pub api_base: String,
    /// Browser-facing authorization endpoint
    pub authorize_url: String,
}

/// Webhook relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Destination for loan request notifications
    pub webhook_url: Option<String>,
    /// Largest amount accepted; no ceiling when unset
    pub max_amount: Option<f64>,
}

impl RelayConfig {
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("guildgate={},tower_http=debug", self.level.trim())
    }
}

/// Plain environment variables understood in addition to `GUILDGATE__*`
const DEPLOYMENT_ENV_KEYS: &[(&str, &str)] = &[
    ("APP_URL", "server.public_url"),
    ("PORT", "server.port"),
    ("TRUST_PROXY", "server.trust_proxy"),
    ("SESSION_SECRET", "auth.session_secret"),
    ("CLIENT_ID", "discord.client_id"),
    ("CLIENT_SECRET", "discord.client_secret"),
    ("REDIRECT_URI", "discord.redirect_uri"),
    ("GUILD_ID", "discord.guild_id"),
    ("RGWO_GUILD_ID", "discord.guild_id"),
    ("DISCORD_BOT_TOKEN", "discord.bot_token"),
    ("WEBHOOK_URL", "relay.webhook_url"),
    ("DISCORD_WEBHOOK_URL", "relay.webhook_url"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (GUILDGATE__*)
    /// 5. Deployment variables (APP_URL, PORT, ...)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.static_dir", "public")?
            .set_default("server.trust_proxy", false)?
            .set_default("auth.session_max_age", 86400)?
            .set_default("discord.membership_mode", "user_guilds")?
            .set_default("discord.api_base", "https://discord.com/api")?
            .set_default(
                "discord.authorize_url",
                "https://discord.com/api/oauth2/authorize",
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("GUILDGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        for (env_key, config_key) in DEPLOYMENT_ENV_KEYS {
            let value = std::env::var(env_key).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*config_key, value)?;
        }

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// OAuth callback URL registered with the provider
    pub fn redirect_uri(&self) -> String {
        match self.discord.redirect_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => uri.to_string(),
            _ => format!("{}/auth/discord/callback", self.server.base_url()),
        }
    }

    /// Whether session cookies carry the `Secure` attribute
    ///
    /// `forwarded_proto` is the request's `X-Forwarded-Proto`, which is
    /// only consulted when `server.trust_proxy` is set.
    pub fn should_use_secure_cookies(&self, forwarded_proto: Option<&str>) -> bool {
        if self.server.base_url().starts_with("https://") {
            return true;
        }

        self.server.trust_proxy
            && forwarded_proto.is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.server.base_url()).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "server.public_url is not a valid URL: {}",
                self.server.base_url()
            )));
        }

        if self.discord.membership_mode == MembershipMode::BotLookup
            && self
                .discord
                .bot_token
                .as_deref()
                .is_none_or(|token| token.trim().is_empty())
        {
            return Err(crate::error::AppError::Config(
                "discord.bot_token is required when discord.membership_mode=bot_lookup"
                    .to_string(),
            ));
        }

        if let Some(max_amount) = self.relay.max_amount {
            if !(max_amount > 0.0) {
                return Err(crate::error::AppError::Config(
                    "relay.max_amount must be greater than 0".to_string(),
                ));
            }
        }

        let format = self.logging.format.trim();
        if !format.eq_ignore_ascii_case("json") && !format.eq_ignore_ascii_case("pretty") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}
