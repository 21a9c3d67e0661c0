use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::app::auth::LoginOutcome;
use crate::domain::account::SessionUser;
use crate::domain::feedback::{
    validate_patch, validate_submission, AdminFeedback, FeedbackFilter, FieldErrors,
    PublicFeedback, BLANK, REQUIRED,
};
use crate::domain::page::{Page, PageRequest};
use crate::http::auth::{
    session_key, CsrfVerified, CurrentSession, StaffUser, ADMIN_REQUIRED, CREDENTIALS_MISSING,
    CSRF_COOKIE, SESSION_COOKIE,
};
use crate::http::{AppError, AppJson, AppPath};
use crate::AppState;

const CSRF_COOKIE_MAX_AGE_SECONDS: i64 = 31_449_600;

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn invalid_page() -> AppError {
    AppError::not_found("Invalid page.")
}

fn parse_page(raw: Option<&str>, page_size: u32) -> Result<PageRequest, AppError> {
    let page = match raw.map(str::trim) {
        None | Some("") => 1,
        Some(raw) => raw.parse::<u32>().map_err(|_| invalid_page())?,
    };
    if page == 0 {
        return Err(invalid_page());
    }
    Ok(PageRequest::new(page, page_size))
}

fn paginate<T, U>(page: Page<T>, request: PageRequest) -> Result<ListResponse<U>, AppError>
where
    U: From<T>,
{
    if !request.is_within(page.total) {
        return Err(invalid_page());
    }
    let next = request
        .has_next(page.total)
        .then(|| request.page + 1);
    let previous = (request.page > 1).then(|| request.page - 1);
    let total = page.total;
    let results = page.map(U::from).items;

    Ok(ListResponse {
        count: total,
        next,
        previous,
        results,
    })
}

pub async fn list_feedback(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<PublicFeedback>>, AppError> {
    let request = parse_page(query.page.as_deref(), state.page_size)?;
    let page = state
        .feedback_service()
        .list_reviewed(request)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list feedback");
            AppError::internal("failed to list feedback")
        })?;

    Ok(Json(paginate(page, request)?))
}

#[derive(Deserialize)]
pub struct SubmitFeedbackRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<PublicFeedback>), AppError> {
    let new = validate_submission(payload.title.as_deref(), payload.content.as_deref())?;

    let feedback = state
        .feedback_service()
        .submit(new)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to submit feedback");
            AppError::internal("failed to submit feedback")
        })?;

    tracing::info!(feedback_id = feedback.id, "feedback submitted");
    Ok((StatusCode::CREATED, Json(feedback.into())))
}

#[derive(Deserialize)]
pub struct AdminListQuery {
    pub page: Option<String>,
    pub is_reviewed: Option<String>,
    pub search: Option<String>,
}

fn parse_reviewed(raw: Option<&str>) -> Result<Option<bool>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some("true") | Some("True") | Some("1") => Ok(Some(true)),
        Some("false") | Some("False") | Some("0") => Ok(Some(false)),
        Some(_) => {
            let mut errors = FieldErrors::new();
            errors.add("is_reviewed", "Must be a valid boolean.");
            Err(AppError::validation(errors))
        }
    }
}

pub async fn admin_list_feedback(
    staff: StaffUser,
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ListResponse<AdminFeedback>>, AppError> {
    let filter = FeedbackFilter {
        is_reviewed: parse_reviewed(query.is_reviewed.as_deref())?,
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string),
    };
    let request = parse_page(query.page.as_deref(), state.page_size)?;

    let page = state
        .feedback_service()
        .list_all(&filter, request)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, staff_id = staff.account.id, "failed to list all feedback");
            AppError::internal("failed to list feedback")
        })?;

    Ok(Json(paginate(page, request)?))
}

#[derive(Deserialize)]
pub struct UpdateFeedbackRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_reviewed: Option<bool>,
}

pub async fn admin_update_feedback(
    staff: StaffUser,
    _csrf: CsrfVerified,
    AppPath(id): AppPath<i64>,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateFeedbackRequest>,
) -> Result<Json<AdminFeedback>, AppError> {
    let patch = validate_patch(
        payload.title.as_deref(),
        payload.content.as_deref(),
        payload.is_reviewed,
    )?;

    let feedback = state
        .feedback_service()
        .update(id, &patch)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, feedback_id = id, "failed to update feedback");
            AppError::internal("failed to update feedback")
        })?;

    match feedback {
        Some(feedback) => {
            tracing::info!(
                feedback_id = id,
                staff_id = staff.account.id,
                is_reviewed = feedback.is_reviewed,
                "feedback updated"
            );
            Ok(Json(feedback.into()))
        }
        None => Err(AppError::not_found("Not found.")),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: SessionUser,
}

fn required_field(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    match value {
        None => errors.add(field, REQUIRED),
        Some(value) if value.trim().is_empty() => errors.add(field, BLANK),
        Some(_) => {}
    }
}

pub async fn login(
    _csrf: CsrfVerified,
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let mut errors = FieldErrors::new();
    required_field(&mut errors, "username", payload.username.as_deref());
    required_field(&mut errors, "password", payload.password.as_deref());
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let service = state.auth_service();
    let outcome = service.login(&username, &password).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to login");
        AppError::internal("failed to login")
    })?;

    let (key, user) = match outcome {
        LoginOutcome::Authenticated { session_key, user } => (session_key, user),
        LoginOutcome::InvalidCredentials => {
            tracing::warn!(username = %username, "login rejected: invalid credentials");
            return Err(AppError::bad_request("Invalid credentials."));
        }
        LoginOutcome::Disabled => {
            tracing::warn!(username = %username, "login rejected: account disabled");
            return Err(AppError::bad_request("Account is disabled."));
        }
        LoginOutcome::NotStaff => {
            tracing::warn!(username = %username, "login rejected: not staff");
            return Err(AppError::bad_request("Not authorized: staff access required."));
        }
    };

    // A previous session on this client is replaced, not kept alongside.
    if let Some(previous) = session_key(&jar, &state) {
        if let Err(err) = service.logout(&previous).await {
            tracing::warn!(error = ?err, "failed to drop previous session");
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, state.session_signer.sign(&key)))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.session_cookie_secure)
        .max_age(time::Duration::seconds(state.session_ttl_seconds as i64))
        .build();

    tracing::info!(user_id = user.id, username = %user.username, "staff login");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful.",
            user,
        }),
    ))
}

pub async fn logout(
    session: CurrentSession,
    _csrf: CsrfVerified,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let (Some(key), Some(account)) = (session.key, session.account) else {
        return Err(AppError::forbidden(CREDENTIALS_MISSING));
    };
    if !account.is_staff {
        return Err(AppError::forbidden(ADMIN_REQUIRED));
    }

    state.auth_service().logout(&key).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = account.id, "failed to logout");
        AppError::internal("failed to logout")
    })?;

    tracing::info!(user_id = account.id, "staff logout");
    let removal = Cookie::build(SESSION_COOKIE).path("/").build();
    Ok((
        jar.remove(removal),
        Json(MessageResponse {
            message: "Logout successful.",
        }),
    ))
}

#[derive(Serialize)]
pub struct CheckAuthResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

pub async fn check_auth(session: Option<CurrentSession>) -> Json<CheckAuthResponse> {
    let user = session
        .as_ref()
        .and_then(CurrentSession::staff)
        .map(SessionUser::from);

    Json(CheckAuthResponse {
        authenticated: user.is_some(),
        user,
    })
}

#[derive(Serialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Issues the double-submit token, reusing a still-valid cookie.
pub async fn csrf_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<CsrfTokenResponse>) {
    let token = jar
        .get(CSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| state.csrf_signer.verify(value).is_some())
        .unwrap_or_else(|| state.csrf_signer.issue());

    let cookie = Cookie::build((CSRF_COOKIE, token.clone()))
        .http_only(false)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.csrf_cookie_secure)
        .max_age(time::Duration::seconds(CSRF_COOKIE_MAX_AGE_SECONDS))
        .build();

    (jar.add(cookie), Json(CsrfTokenResponse { csrf_token: token }))
}
