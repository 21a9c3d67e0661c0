use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderName;
use axum_extra::extract::cookie::CookieJar;

use crate::app::tokens::constant_time_eq;
use crate::domain::account::Account;
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrftoken");

pub const ADMIN_REQUIRED: &str = "Admin access required.";
pub const CREDENTIALS_MISSING: &str = "Authentication credentials were not provided.";

/// The caller's session, if the cookie is signed and still live. Never
/// rejects for a missing or stale cookie; only a store failure rejects.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession {
    pub key: Option<String>,
    pub account: Option<Account>,
}

impl CurrentSession {
    pub fn staff(&self) -> Option<&Account> {
        self.account.as_ref().filter(|account| account.is_staff)
    }
}

/// Session key carried by the request cookie, signature checked.
pub fn session_key(jar: &CookieJar, state: &AppState) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE)?;
    state
        .session_signer
        .verify(cookie.value())
        .map(str::to_string)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(key) = session_key(&jar, state) else {
            return Ok(CurrentSession::default());
        };

        let account = state
            .auth_service()
            .current_account(&key)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to resolve session");
                AppError::internal("failed to resolve session")
            })?;

        Ok(CurrentSession {
            key: account.as_ref().map(|_| key),
            account,
        })
    }
}

/// A live session bound to an active staff account.
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub account: Account,
    pub session_key: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = CurrentSession::from_request_parts(parts, state).await?;
        match (session.key, session.account) {
            (Some(session_key), Some(account)) if account.is_staff => Ok(StaffUser {
                account,
                session_key,
            }),
            _ => Err(AppError::forbidden(ADMIN_REQUIRED)),
        }
    }
}

/// Double-submit CSRF check: the `X-CSRFToken` header must echo the signed
/// `csrftoken` cookie, and any `Origin` header must be trusted.
#[derive(Debug, Clone, Copy)]
pub struct CsrfVerified;

#[axum::async_trait]
impl FromRequestParts<AppState> for CsrfVerified {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(origin) = parts
            .headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
        {
            let host = parts
                .headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok());
            if !origin_is_trusted(origin, host, &state.csrf_trusted_origins) {
                tracing::warn!(origin, "rejected request from untrusted origin");
                return Err(AppError::forbidden(format!(
                    "CSRF Failed: Origin checking failed - {} does not match any trusted origins.",
                    origin
                )));
            }
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(CSRF_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| AppError::forbidden("CSRF Failed: CSRF cookie not set."))?;

        if state.csrf_signer.verify(&cookie).is_none() {
            tracing::warn!("rejected request with forged CSRF cookie");
            return Err(AppError::forbidden("CSRF Failed: CSRF cookie invalid."));
        }

        let provided = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("CSRF Failed: CSRF token missing."))?;

        if !constant_time_eq(provided, &cookie) {
            tracing::warn!("rejected request with mismatched CSRF token");
            return Err(AppError::forbidden("CSRF Failed: CSRF token incorrect."));
        }

        Ok(CsrfVerified)
    }
}

fn origin_is_trusted(origin: &str, host: Option<&str>, trusted: &[String]) -> bool {
    let Ok(parsed) = url::Url::parse(origin) else {
        return false;
    };
    let normalized = parsed.origin().ascii_serialization();
    if trusted.iter().any(|candidate| *candidate == normalized) {
        return true;
    }

    // Same-origin requests are always acceptable.
    let Some(host) = host else {
        return false;
    };
    let origin_host = match (parsed.host_str(), parsed.port()) {
        (Some(name), Some(port)) => format!("{}:{}", name, port),
        (Some(name), None) => name.to_string(),
        _ => return false,
    };
    origin_host.eq_ignore_ascii_case(host)
}
