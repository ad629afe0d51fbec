//! Loan request form and its notification payload

use std::fmt::Display;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::auth::SessionUser;
use crate::error::AppError;

/// Embed accent color (Discord blurple)
const EMBED_COLOR: u32 = 0x5865F2;

/// Discord rejects embed fields with empty values
const EMPTY_FIELD: &str = "N/A";

/// Numeric form value that remembers what the user typed
///
/// Accepts JSON numbers and numeric strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced<T> {
    raw: String,
    value: T,
}

impl<T: Copy> Coerced<T> {
    pub fn value(&self) -> T {
        self.value
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl<'de, T> Deserialize<'de> for Coerced<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrText {
            Number(serde_json::Number),
            Text(String),
        }

        let raw = match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(number) => number.to_string(),
            NumberOrText::Text(text) => text.trim().to_string(),
        };
        let value = raw
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {raw:?}: {e}")))?;

        Ok(Self { raw, value })
    }
}

/// Loan request submitted from the portal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    #[serde(alias = "name")]
    pub full_name: String,
    #[serde(alias = "department")]
    pub badge: String,
    pub reason: String,
    pub amount: Coerced<f64>,
    #[serde(alias = "term")]
    pub term_months: Coerced<u32>,
}

/// Reject amounts that are not a finite, non-negative number or that
/// exceed the configured ceiling
///
/// An amount equal to the ceiling is allowed.
pub fn check_amount(request: &LoanRequest, max_amount: Option<f64>) -> Result<(), AppError> {
    let amount = request.amount.value();

    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!(
            "Loan amount {} is not a valid amount",
            request.amount.raw()
        )));
    }

    match max_amount {
        Some(max) if amount > max => Err(AppError::Validation(format!(
            "Loan amount {} exceeds the maximum of {}",
            request.amount.raw(),
            max
        ))),
        _ => Ok(()),
    }
}

fn field(name: &str, value: &str, inline: bool) -> Value {
    let value = if value.trim().is_empty() {
        EMPTY_FIELD
    } else {
        value
    };
    json!({ "name": name, "value": value, "inline": inline })
}

/// Webhook payload for a loan request
///
/// `submitter` adds an attribution footer when the user is logged in.
pub fn build_notification(request: &LoanRequest, submitter: Option<&SessionUser>) -> Value {
    let mut embed = json!({
        "title": "New Loan Request",
        "color": EMBED_COLOR,
        "fields": [
            field("Full Name", &request.full_name, true),
            field("Badge / Department", &request.badge, true),
            field("Amount", request.amount.raw(), true),
            field("Term (months)", request.term_months.raw(), true),
            field("Reason", &request.reason, false),
        ],
        "timestamp": Utc::now().to_rfc3339(),
    });

    if let Some(user) = submitter {
        embed["footer"] = json!({
            "text": format!("Submitted by {} ({})", user.display_name, user.external_user_id),
        });
    }

    json!({
        "username": "Loan Requests",
        "embeds": [embed],
    })
}
