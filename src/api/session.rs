//! Session accessor endpoints

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::auth::session::removal_cookie;
use crate::auth::{CurrentUser, SessionUser, secure_cookies};

/// GET /api/me
///
/// Returns the logged-in user, or 401 `{"error": "Not logged in"}`.
pub(super) async fn me(CurrentUser(session): CurrentUser) -> Json<SessionUser> {
    Json(session.user)
}

/// POST /api/logout
///
/// Always succeeds, whether or not a session existed.
pub(super) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(secure_cookies(&state, &headers)));
    (jar, Json(serde_json::json!({ "success": true })))
}
