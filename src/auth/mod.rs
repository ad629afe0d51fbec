//! Discord OAuth authentication
//!
//! Handles:
//! - Discord OAuth flow with guild membership gate
//! - Session management
//! - Session extractors

pub mod discord;
mod middleware;
mod oauth;
pub mod session;

pub use discord::{DiscordClient, MembershipFailure, ProviderError, classify_membership_error};
pub use middleware::{CurrentUser, MaybeUser};
pub use oauth::{AuthFailure, auth_router};
pub(crate) use oauth::secure_cookies;
pub use session::{Session, SessionUser, create_session_token, verify_session_token};
