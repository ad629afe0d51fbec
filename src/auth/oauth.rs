//! Discord OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Discord,
//! gated on membership of a single guild.

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use thiserror::Error;

use super::discord::{Membership, MembershipFailure, ProviderError, classify_membership_error};
use super::session::{Session, create_session_token, removal_cookie, session_cookie};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::AUTH_ATTEMPTS_TOTAL;

/// Create authentication router
///
/// Routes:
/// - GET /auth/discord/login (alias /auth/login) - Redirect to Discord
/// - GET /auth/discord/callback (alias /auth/callback) - OAuth callback
/// - GET /logout - Clear session and go home
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/discord/login", get(discord_redirect))
        .route("/auth/login", get(discord_redirect))
        .route("/auth/discord/callback", get(discord_callback))
        .route("/auth/callback", get(discord_callback))
        .route("/logout", get(logout_redirect))
}

/// Whether responses to this request may set `Secure` cookies
pub(crate) fn secure_cookies(state: &AppState, headers: &HeaderMap) -> bool {
    let forwarded_proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok());
    state.config.should_use_secure_cookies(forwarded_proto)
}

// =============================================================================
// Login
// =============================================================================

/// GET /auth/discord/login
///
/// Redirects user to the Discord authorization page.
async fn discord_redirect(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state.discord.authorization_url()?;
    Ok(Redirect::to(url.as_str()))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from Discord callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// Reasons a login attempt ends without a session
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("authorization code missing from callback")]
    MissingAuthorizationCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(#[source] ProviderError),

    #[error("profile fetch failed: {0}")]
    ProfileFetch(#[source] ProviderError),

    #[error("user is not a member of the guild")]
    NotMember,

    #[error("membership check failed: {0}")]
    MembershipCheck(#[source] ProviderError),

    #[error("session could not be issued: {0}")]
    Session(#[source] AppError),
}

impl AuthFailure {
    /// Tag appended to the landing page redirect as `?error=`
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthFailure::MissingAuthorizationCode => "no_code",
            AuthFailure::NotMember => "not_member",
            AuthFailure::TokenExchange(error) | AuthFailure::ProfileFetch(error) => {
                if error.status() == Some(StatusCode::UNAUTHORIZED) {
                    "server_config"
                } else {
                    "auth_failed"
                }
            }
            AuthFailure::MembershipCheck(error) => match classify_membership_error(error) {
                MembershipFailure::NotMember => "not_member",
                MembershipFailure::ConfigError => "server_config",
                MembershipFailure::Unknown => "auth_failed",
            },
            AuthFailure::Session(_) => "auth_failed",
        }
    }
}

/// GET /auth/discord/callback
///
/// # Steps
/// 1. Exchange code for access token
/// 2. Fetch user info from Discord
/// 3. Verify guild membership
/// 4. Create session and set cookie
/// 5. Redirect to home
///
/// Every failure turns into a redirect to `/?error=<tag>`.
async fn discord_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    match complete_login(&state, query.code.as_deref()).await {
        Ok((session, token)) => {
            AUTH_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!(
                user_id = %session.user.external_user_id,
                username = %session.user.display_name,
                "User logged in"
            );

            let cookie = session_cookie(
                token,
                state.config.auth.session_max_age,
                secure_cookies(&state, &headers),
            );
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Err(failure) => {
            let code = failure.error_code();
            AUTH_ATTEMPTS_TOTAL.with_label_values(&[code]).inc();
            match &failure {
                AuthFailure::MissingAuthorizationCode | AuthFailure::NotMember => {
                    tracing::info!(error = %failure, "Login rejected");
                }
                _ => tracing::error!(error = %failure, code, "Login failed"),
            }

            Redirect::to(&format!("/?error={}", code)).into_response()
        }
    }
}

async fn complete_login(
    state: &AppState,
    code: Option<&str>,
) -> Result<(Session, String), AuthFailure> {
    let code = code
        .filter(|code| !code.is_empty())
        .ok_or(AuthFailure::MissingAuthorizationCode)?;

    let token = state
        .discord
        .exchange_code(code)
        .await
        .map_err(AuthFailure::TokenExchange)?;

    let user = state
        .discord
        .fetch_user(&token.access_token)
        .await
        .map_err(AuthFailure::ProfileFetch)?;

    let membership = match state
        .discord
        .verify_membership(&token.access_token, &user.id)
        .await
        .map_err(AuthFailure::MembershipCheck)?
    {
        Membership::Confirmed(membership) => membership,
        Membership::NotMember => return Err(AuthFailure::NotMember),
    };
    tracing::debug!(guild_id = %membership.guild_id(), user_id = %user.id, "Membership confirmed");

    let session = Session::for_member(&user, &membership, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)
        .map_err(AuthFailure::Session)?;

    Ok((session, token))
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears session cookie and redirects to the landing page.
async fn logout_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(secure_cookies(&state, &headers)));
    (jar, Redirect::to("/"))
}
