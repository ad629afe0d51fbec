//! E2E tests for the loan request relay

mod common;

use common::{TestServer, USER_ID, USERNAME};
use serde_json::{Value, json};

fn loan_form() -> Value {
    json!({
        "fullName": "Jane Doe",
        "badge": "B-1024",
        "reason": "Replacement radio",
        "amount": "2500.75",
        "termMonths": 18,
    })
}

fn embed_field_values(body: &Value) -> Vec<String> {
    body["embeds"][0]["fields"]
        .as_array()
        .expect("embed fields")
        .iter()
        .map(|field| field["value"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_loan_is_relayed_once_with_all_fields() {
    let server = TestServer::new().await;
    server.mock_webhook(204, 1).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let requests = server.webhook_requests().await;
    assert_eq!(requests.len(), 1);
    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let values = embed_field_values(&payload);
    for expected in ["Jane Doe", "B-1024", "Replacement radio", "2500.75", "18"] {
        assert!(values.iter().any(|v| v == expected), "missing {expected}");
    }
    assert!(payload["embeds"][0].get("footer").is_none());
}

#[tokio::test]
async fn test_legacy_route_relays_with_session_footer() {
    let server = TestServer::new().await;
    let cookie = server.login().await;
    server.mock_webhook(204, 1).await;

    let response = server
        .client
        .post(server.url("/submit-loan"))
        .header("Cookie", cookie)
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let requests = server.webhook_requests().await;
    assert_eq!(requests.len(), 1);
    let payload: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        payload["embeds"][0]["footer"]["text"],
        format!("Submitted by {USERNAME} ({USER_ID})")
    );
}

#[tokio::test]
async fn test_missing_webhook_makes_no_outbound_call() {
    let server = TestServer::with_config(|config| config.relay.webhook_url = None).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Webhook URL not configured");

    let received = server.upstream.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_webhook_rejection_returns_500() {
    let server = TestServer::new().await;
    server.mock_webhook(400, 1).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().contains("webhook-token"));
}

#[tokio::test]
async fn test_amount_above_ceiling_is_rejected_without_relay() {
    let server =
        TestServer::with_config(|config| config.relay.max_amount = Some(2500.0)).await;
    server.mock_webhook(204, 0).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
    assert!(server.webhook_requests().await.is_empty());
}

#[tokio::test]
async fn test_amount_at_ceiling_is_relayed() {
    let server =
        TestServer::with_config(|config| config.relay.max_amount = Some(2500.75)).await;
    server.mock_webhook(204, 1).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_malformed_form_is_rejected_without_relay() {
    let server = TestServer::new().await;
    server.mock_webhook(204, 0).await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&json!({ "fullName": "Jane Doe", "amount": "plenty" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(server.webhook_requests().await.is_empty());
}

#[tokio::test]
async fn test_non_finite_or_negative_amount_is_rejected_without_relay() {
    let server =
        TestServer::with_config(|config| config.relay.max_amount = Some(5000.0)).await;
    server.mock_webhook(204, 0).await;

    for amount in ["NaN", "-inf", "inf", "-5000"] {
        let mut form = loan_form();
        form["amount"] = json!(amount);

        let response = server
            .client
            .post(server.url("/api/loan"))
            .json(&form)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400, "{amount}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    assert!(server.webhook_requests().await.is_empty());
}

#[tokio::test]
async fn test_nan_amount_is_rejected_without_ceiling() {
    let server = TestServer::new().await;
    server.mock_webhook(204, 0).await;

    let mut form = loan_form();
    form["amount"] = json!("NaN");

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(server.webhook_requests().await.is_empty());
}

#[tokio::test]
async fn test_amount_is_validated_before_webhook_guard() {
    let server = TestServer::with_config(|config| {
        config.relay.webhook_url = None;
        config.relay.max_amount = Some(2500.0);
    })
    .await;

    let response = server
        .client
        .post(server.url("/api/loan"))
        .json(&loan_form())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let received = server.upstream.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}
