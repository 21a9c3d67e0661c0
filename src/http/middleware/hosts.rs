use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::AppError;
use crate::AppState;

/// Rejects requests whose `Host` is not in the configured allow-list.
pub async fn allowed_hosts_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
        .map(|host| strip_port(host).to_string());

    match host {
        Some(host) if host_allowed(&host, &state.allowed_hosts) => Ok(next.run(request).await),
        other => {
            tracing::warn!(host = ?other, "rejected request for disallowed host");
            Err(AppError::bad_request("Invalid HTTP_HOST header."))
        }
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal, e.g. `[::1]:8000`.
        return rest.split(']').next().unwrap_or(rest);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

/// `*` allows everything; `.example.com` allows the domain and its subdomains.
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            return true;
        }
        match pattern.strip_prefix('.') {
            Some(domain) => host == domain || host.ends_with(&pattern),
            None => host == pattern,
        }
    })
}
