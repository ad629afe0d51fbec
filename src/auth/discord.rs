//! Discord identity client
//!
//! Three sequential calls against the Discord REST API:
//! code exchange, profile fetch, guild membership check.

use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{AppConfig, MembershipMode};
use crate::error::AppError;

/// Failure of a single provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    /// Request never produced a response
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Response body did not match the expected shape
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    /// Upstream status, if the provider answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why a membership check did not confirm the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipFailure {
    /// The user is not in the guild
    NotMember,
    /// Our credentials or guild settings are wrong
    ConfigError,
    /// Anything else; reported as `auth_failed`
    Unknown,
}

/// Map a failed membership call to the outcome shown to the user
pub fn classify_membership_error(error: &ProviderError) -> MembershipFailure {
    match error.status() {
        Some(StatusCode::NOT_FOUND) => MembershipFailure::NotMember,
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => MembershipFailure::ConfigError,
        _ => MembershipFailure::Unknown,
    }
}

/// Proof that the guild membership check succeeded
///
/// Only `DiscordClient::verify_membership` hands these out.
#[derive(Debug)]
pub struct ConfirmedMembership {
    guild_id: String,
}

impl ConfirmedMembership {
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }
}

/// Result of a membership check that reached the provider
#[derive(Debug)]
pub enum Membership {
    Confirmed(ConfirmedMembership),
    NotMember,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// `GET /users/@me` response
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PartialGuild {
    id: String,
}

/// Discord REST client bound to one OAuth application and guild
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http_client: Arc<reqwest::Client>,
    api_base: String,
    authorize_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    guild_id: String,
    bot_token: Option<String>,
    mode: MembershipMode,
}

impl DiscordClient {
    pub fn new(http_client: Arc<reqwest::Client>, config: &AppConfig) -> Self {
        Self {
            http_client,
            api_base: config.discord.api_base.trim_end_matches('/').to_string(),
            authorize_url: config.discord.authorize_url.clone(),
            client_id: config.discord.client_id.clone(),
            client_secret: config.discord.client_secret.clone(),
            redirect_uri: config.redirect_uri(),
            guild_id: config.discord.guild_id.clone(),
            bot_token: config.discord.bot_token.clone(),
            mode: config.discord.membership_mode,
        }
    }

    /// Browser redirect target that starts the login
    pub fn authorization_url(&self) -> Result<url::Url, AppError> {
        url::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.mode.scope()),
            ],
        )
        .map_err(|e| AppError::Config(format!("discord.authorize_url is invalid: {}", e)))
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ProviderError> {
        let request = self
            .http_client
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ]);

        send_json("token exchange", request).await
    }

    /// Fetch the profile of the user the token belongs to
    pub async fn fetch_user(&self, access_token: &str) -> Result<DiscordUser, ProviderError> {
        let request = self
            .http_client
            .get(format!("{}/users/@me", self.api_base))
            .bearer_auth(access_token);

        send_json("user profile", request).await
    }

    /// Check that the user belongs to the configured guild
    ///
    /// A guild list without the guild yields `Membership::NotMember`;
    /// a member lookup answering 404 comes back as `Err` and is sorted
    /// out by `classify_membership_error`.
    pub async fn verify_membership(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Result<Membership, ProviderError> {
        match self.mode {
            MembershipMode::UserGuilds => {
                let request = self
                    .http_client
                    .get(format!("{}/users/@me/guilds", self.api_base))
                    .bearer_auth(access_token);
                let guilds: Vec<PartialGuild> = send_json("user guilds", request).await?;

                if guilds.iter().any(|guild| guild.id == self.guild_id) {
                    Ok(self.confirmed())
                } else {
                    Ok(Membership::NotMember)
                }
            }
            MembershipMode::BotLookup => {
                let request = self
                    .http_client
                    .get(format!(
                        "{}/guilds/{}/members/{}",
                        self.api_base, self.guild_id, user_id
                    ))
                    .header(
                        reqwest::header::AUTHORIZATION,
                        format!("Bot {}", self.bot_token.as_deref().unwrap_or_default()),
                    );
                let _member: serde_json::Value = send_json("guild member", request).await?;

                Ok(self.confirmed())
            }
        }
    }

    fn confirmed(&self) -> Membership {
        Membership::Confirmed(ConfirmedMembership {
            guild_id: self.guild_id.clone(),
        })
    }
}

/// Upstream bodies are logged, so keep them short
const MAX_ERROR_BODY_CHARS: usize = 512;

async fn send_json<T: DeserializeOwned>(
    endpoint: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { endpoint, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            endpoint,
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|source| ProviderError::Decode { endpoint, source })
}
