pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::auth::AuthService;
use crate::app::feedback::FeedbackService;
use crate::app::tokens::TokenSigner;
use crate::config::AppConfig;
use crate::infra::sessions::SessionStore;
use crate::infra::store::{AccountStore, FeedbackStore};

#[derive(Clone)]
pub struct AppState {
    pub feedback: Arc<dyn FeedbackStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_signer: TokenSigner,
    pub csrf_signer: TokenSigner,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub csrf_cookie_secure: bool,
    pub allowed_hosts: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
    pub csrf_trusted_origins: Vec<String>,
    pub page_size: u32,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        feedback: Arc<dyn FeedbackStore>,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let secret = config.secret_key.as_bytes();
        Self {
            feedback,
            accounts,
            sessions,
            session_signer: TokenSigner::session(secret),
            csrf_signer: TokenSigner::csrf(secret),
            session_ttl_seconds: config.session_ttl_seconds,
            session_cookie_secure: config.session_cookie_secure,
            csrf_cookie_secure: config.csrf_cookie_secure,
            allowed_hosts: config.allowed_hosts.clone(),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            csrf_trusted_origins: config.csrf_trusted_origins.clone(),
            page_size: config.page_size,
        }
    }

    pub fn feedback_service(&self) -> FeedbackService {
        FeedbackService::new(self.feedback.clone())
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.accounts.clone(),
            self.sessions.clone(),
            self.session_ttl_seconds,
        )
    }
}
