//! Common test utilities for E2E tests
//!
//! Each `TestServer` runs the real router on a random port. Discord and
//! the loan webhook are both served by one wiremock `MockServer`.

#![allow(dead_code)]

use std::path::PathBuf;

use guildgate::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GUILD_ID: &str = "613425648685547541";
pub const USER_ID: &str = "80351110224678912";
pub const USERNAME: &str = "nelly";
pub const ACCESS_TOKEN: &str = "6qrZcUqja7812RVdnEKjpzOL4CvHBFG";
pub const WEBHOOK_PATH: &str = "/webhooks/1234/webhook-token";
pub const INDEX_HTML: &str = "<h1>Loan Portal</h1>";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    /// Stands in for the Discord API and the webhook sink
    pub upstream: MockServer,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
    pub _static_dir: TempDir,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig)) -> Self {
        let upstream = MockServer::start().await;

        let static_dir = TempDir::new().unwrap();
        std::fs::write(static_dir.path().join("index.html"), INDEX_HTML).unwrap();

        let mut config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_url: Some("http://localhost:3000".to_string()),
                static_dir: PathBuf::from(static_dir.path()),
                trust_proxy: false,
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 86_400,
            },
            discord: config::DiscordConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: None,
                guild_id: GUILD_ID.to_string(),
                bot_token: None,
                membership_mode: config::MembershipMode::UserGuilds,
                api_base: upstream.uri(),
                authorize_url: "https://discord.com/api/oauth2/authorize".to_string(),
            },
            relay: config::RelayConfig {
                webhook_url: Some(format!("{}{}", upstream.uri(), WEBHOOK_PATH)),
                max_amount: None,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };
        customize(&mut config);

        let state = AppState::new(config).unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = guildgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            upstream,
            client,
            _static_dir: static_dir,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Token endpoint answers with `status`
    pub async fn mock_token_exchange(&self, status: u16) {
        let response = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 604800,
                "refresh_token": "D43f5y0ahjqew82jZ4NViEr2YafMKhue",
                "scope": "identify guilds",
            }))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({ "error": "invalid_grant" }))
        };

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(response)
            .mount(&self.upstream)
            .await;
    }

    /// Profile endpoint returns the test user
    pub async fn mock_profile(&self) {
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": USER_ID,
                "username": USERNAME,
                "avatar": "8342729096ea3675442027381ff50dfe",
                "discriminator": "1337",
                "global_name": "Nelly",
            })))
            .mount(&self.upstream)
            .await;
    }

    /// Guild list endpoint returns guilds with these ids
    pub async fn mock_user_guilds(&self, guild_ids: &[&str]) {
        let guilds: Vec<Value> = guild_ids
            .iter()
            .map(|id| json!({ "id": id, "name": format!("guild {id}") }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/users/@me/guilds"))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(guilds))
            .mount(&self.upstream)
            .await;
    }

    /// Guild member lookup answers with `status`
    pub async fn mock_member_lookup(&self, status: u16) {
        let response = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": USER_ID, "username": USERNAME },
                "roles": [],
            }))
        } else {
            ResponseTemplate::new(status)
                .set_body_json(json!({ "message": "Unknown Member", "code": 10007 }))
        };

        Mock::given(method("GET"))
            .and(path(format!("/guilds/{GUILD_ID}/members/{USER_ID}")))
            .respond_with(response)
            .mount(&self.upstream)
            .await;
    }

    /// Webhook answers with `status`; `expected` calls are verified on drop
    pub async fn mock_webhook(&self, status: u16, expected: u64) {
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(expected)
            .mount(&self.upstream)
            .await;
    }

    /// Requests the webhook received so far
    pub async fn webhook_requests(&self) -> Vec<wiremock::Request> {
        self.upstream
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == WEBHOOK_PATH)
            .collect()
    }

    /// Run the callback against successful upstream mocks
    ///
    /// Returns a `Cookie` header value carrying the new session.
    pub async fn login(&self) -> String {
        self.mock_token_exchange(200).await;
        self.mock_profile().await;
        self.mock_user_guilds(&[GUILD_ID]).await;

        let response = self
            .client
            .get(self.url("/auth/discord/callback?code=valid-code"))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        session_cookie(&response).expect("login sets a session cookie")
    }
}

/// `name=value` of the session cookie set by a response, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with("session="))
        .and_then(|cookie| cookie.split(';').next().map(ToString::to_string))
}

/// All `Set-Cookie` header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
