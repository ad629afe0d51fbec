//! Loan request endpoint

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::MaybeUser;
use crate::error::AppError;
use crate::relay::{LoanRequest, build_notification, check_amount};

/// Relay failures keep the `{success: false}` shape the portal expects
pub(crate) struct RelayError(AppError);

impl From<AppError> for RelayError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.0.record();
        let body = Json(json!({
            "success": false,
            "error": self.0.public_message(),
        }));
        (self.0.status(), body).into_response()
    }
}

/// POST /api/loan
///
/// Validates the form, then relays it to the webhook exactly once.
pub(crate) async fn submit_loan(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    payload: Result<Json<LoanRequest>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let Json(request) =
        payload.map_err(|rejection| RelayError(AppError::Validation(rejection.body_text())))?;

    check_amount(&request, state.config.relay.max_amount)?;

    if !state.webhook.is_configured() {
        tracing::error!("Loan request received but relay.webhook_url is not set");
        return Err(AppError::WebhookMisconfigured.into());
    }

    let submitter = session.as_ref().map(|session| &session.user);
    let notification = build_notification(&request, submitter);

    if let Err(error) = state.webhook.send(&notification).await {
        tracing::error!(%error, "Failed to relay loan request");
        return Err(error.into());
    }

    tracing::info!(
        user_id = submitter.map(|user| user.external_user_id.as_str()),
        amount = %request.amount.raw(),
        "Loan request relayed"
    );

    Ok(Json(json!({ "success": true })))
}
