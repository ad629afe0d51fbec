//! API layer
//!
//! HTTP handlers for:
//! - Session accessors (/api/me, /api/logout)
//! - Loan request relay (/api/loan)
//! - Metrics (Prometheus)

mod loan;
pub mod metrics;
mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub(crate) use loan::submit_loan;
pub use metrics::metrics_router;

/// Create JSON API router, nested under `/api`
///
/// Routes:
/// - GET /me - Current session user
/// - POST /logout - Clear session
/// - POST /loan - Relay loan request to webhook
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(session::me))
        .route("/logout", post(session::logout))
        .route("/loan", post(submit_loan))
}
