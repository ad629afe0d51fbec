//! Loan request relay
//!
//! Turns a submitted loan form into a Discord webhook message.

mod loan;
mod webhook;

pub use loan::{Coerced, LoanRequest, build_notification, check_amount};
pub use webhook::WebhookNotifier;
