//! Authentication middleware
//!
//! `protect` gates a route on a valid token whose user still exists and
//! has not changed their password since issuance. `maybe_user` is the
//! best-effort variant for rendered pages. `require_role` layers role
//! gating on top of `protect`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::tokens::TOKEN_COOKIE;
use crate::domain::{Role, User};
use crate::error::{Error, Result};
use crate::state::AppState;

/// The authenticated user, injected into request extensions by `protect`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Pull a token from the bearer header, falling back to the cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let prefix = format!("{TOKEN_COOKIE}=");
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(raw) = cookie_header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some(value) = pair.trim().strip_prefix(&prefix) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Resolve the request's headers to a live, current user.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = token_from_headers(headers).ok_or_else(|| {
        Error::Unauthorized("You are not logged in. Please log in to get access".to_string())
    })?;
    let claims = state.tokens().verify(&token)?;
    let user_id = claims.user_id()?;

    let user = state
        .users()
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| {
            Error::Unauthorized("The user belonging to this token no longer exists".to_string())
        })?;

    if user.changed_password_after(claims.issued_at()) {
        return Err(Error::Unauthorized(
            "User recently changed password. Please log in again".to_string(),
        ));
    }

    Ok(user)
}

/// Reject the request unless it carries a valid token for a live user.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Attach the current user when the token checks out; never reject.
/// Rendered pages use this to vary on login state.
pub async fn maybe_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(user) = authenticate(&state, request.headers()).await {
        request.extensions_mut().insert(CurrentUser(user));
    }
    next.run(request).await
}

/// Role gate, layered after `protect`.
pub async fn require_role(
    roles: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| Error::Unauthorized("You are not logged in".to_string()))?;
    if !roles.contains(&current.0.role) {
        return Err(Error::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
