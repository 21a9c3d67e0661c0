#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use feedback_board::app::auth::hash_password;
use feedback_board::config::{AppConfig, SessionBackend};
use feedback_board::domain::account::{Account, NewAccount};
use feedback_board::domain::feedback::{Feedback, FeedbackPatch, NewFeedback};
use feedback_board::infra::sessions::MemorySessionStore;
use feedback_board::infra::store::{
    AccountStore, FeedbackStore, MemoryAccountStore, MemoryFeedbackStore,
};
use feedback_board::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// Test-only signing key (32 bytes).
const TEST_SECRET_KEY: &str = "test-secret-key-0123456789abcdef";
pub const DEFAULT_PASSWORD: &str = "testpassword123";
pub const TEST_PAGE_SIZE: u32 = 5;

// ---------------------------------------------------------------------------
// TestApp: one isolated in-memory instance per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or("").to_string()
    }

    /// The `Set-Cookie` header for `name`, unparsed.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(&prefix))
            .map(str::to_string)
    }

    /// The value of the cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.set_cookie(name)?;
        let pair = raw.split(';').next()?;
        let (_, value) = pair.split_once('=')?;
        Some(value.to_string())
    }
}

/// Cookies and CSRF token a browser would carry for one admin.
#[derive(Clone)]
pub struct StaffSession {
    pub session_cookie: String,
    pub csrf_token: String,
}

impl StaffSession {
    pub fn cookie_header(&self) -> String {
        format!(
            "sessionid={}; csrftoken={}",
            self.session_cookie, self.csrf_token
        )
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        http_addr: "127.0.0.1:0".into(),
        app_mode: "api".into(),
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        db_connect_timeout_seconds: 1,
        db_idle_timeout_seconds: 1,
        db_max_lifetime_seconds: 1,
        db_connect_attempts: 1,
        session_backend: SessionBackend::Memory,
        redis_url: "redis://unused".into(),
        secret_key: TEST_SECRET_KEY.into(),
        session_ttl_seconds: 3600,
        allowed_hosts: vec!["localhost".into(), "127.0.0.1".into()],
        cors_allowed_origins: vec!["http://localhost:3000".into()],
        csrf_trusted_origins: vec!["http://localhost:3000".into()],
        session_cookie_secure: false,
        csrf_cookie_secure: false,
        page_size: TEST_PAGE_SIZE,
    }
}

pub fn app() -> TestApp {
    TestApp::with_config(test_config())
}

impl TestApp {
    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::new(
            &config,
            Arc::new(MemoryFeedbackStore::new()),
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemorySessionStore::new()),
        );
        let router = feedback_board::http::router(state.clone());
        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if !headers.iter().any(|(key, _)| key.eq_ignore_ascii_case("host")) {
            builder = builder.header("host", "localhost");
        }

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, session: Option<&StaffSession>) -> TestResponse {
        let cookie = session.map(StaffSession::cookie_header);
        let mut headers = vec![];
        if let Some(cookie) = cookie.as_deref() {
            headers.push(("cookie", cookie));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    /// Mutating request carrying the session cookie and a matching CSRF pair.
    pub async fn send_as(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        session: &StaffSession,
    ) -> TestResponse {
        let cookie = session.cookie_header();
        self.request(
            method,
            path,
            body,
            &[
                ("cookie", cookie.as_str()),
                ("x-csrftoken", session.csrf_token.as_str()),
            ],
        )
        .await
    }

    pub async fn patch_as(&self, path: &str, body: Value, session: &StaffSession) -> TestResponse {
        self.send_as(Method::PATCH, path, Some(body), session).await
    }

    /// Fetch a fresh CSRF token the way the front end does.
    pub async fn csrf_token(&self) -> String {
        let resp = self.get("/csrf-token", None).await;
        assert_eq!(resp.status, StatusCode::OK);
        resp.json()["csrfToken"]
            .as_str()
            .expect("csrfToken missing")
            .to_string()
    }

    /// POST /login with a valid CSRF pair.
    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        let csrf = self.csrf_token().await;
        let cookie = format!("csrftoken={}", csrf);
        self.request(
            Method::POST,
            "/login",
            Some(json!({ "username": username, "password": password })),
            &[("cookie", cookie.as_str()), ("x-csrftoken", csrf.as_str())],
        )
        .await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Insert an account directly into the identity store.
    pub async fn create_account(&self, username: &str, is_staff: bool, is_active: bool) -> Account {
        let password_hash = hash_password(DEFAULT_PASSWORD).expect("password hash failed");
        self.state
            .accounts
            .upsert(NewAccount {
                username: username.to_string(),
                password_hash,
                is_active,
                is_staff,
            })
            .await
            .expect("insert test account failed")
    }

    /// Flip flags on an existing account, keeping its password.
    pub async fn set_flags(&self, username: &str, is_staff: bool, is_active: bool) {
        let account = self
            .state
            .accounts
            .find_by_username(username)
            .await
            .unwrap()
            .expect("account exists");
        self.state
            .accounts
            .upsert(NewAccount {
                username: account.username,
                password_hash: account.password_hash,
                is_active,
                is_staff,
            })
            .await
            .expect("update test account failed");
    }

    /// Create a staff account and log it in through the API.
    pub async fn staff_session(&self, username: &str) -> StaffSession {
        self.create_account(username, true, true).await;
        let csrf = self.csrf_token().await;
        let cookie = format!("csrftoken={}", csrf);
        let resp = self
            .request(
                Method::POST,
                "/login",
                Some(json!({ "username": username, "password": DEFAULT_PASSWORD })),
                &[("cookie", cookie.as_str()), ("x-csrftoken", csrf.as_str())],
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "staff login failed: {}", resp.json());

        StaffSession {
            session_cookie: resp.cookie("sessionid").expect("session cookie set"),
            csrf_token: csrf,
        }
    }

    /// Insert feedback straight into the store.
    pub async fn create_feedback(&self, title: &str, content: &str) -> Feedback {
        self.state
            .feedback
            .insert(NewFeedback {
                title: title.to_string(),
                content: content.to_string(),
            })
            .await
            .expect("insert test feedback failed")
    }

    /// Insert feedback and approve it.
    pub async fn create_reviewed_feedback(&self, title: &str, content: &str) -> Feedback {
        let feedback = self.create_feedback(title, content).await;
        self.state
            .feedback
            .patch(
                feedback.id,
                &FeedbackPatch {
                    is_reviewed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .expect("approve test feedback failed")
            .expect("feedback exists")
    }
}
