//! Account flows: sign-up, login, logout, password recovery
//!
//! Successful authentication answers with the token in the body and in an
//! http-only cookie; logout clears the cookie. Password recovery stores
//! only a BLAKE3 hash of the reset token and mails the plaintext once.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use base64::Engine;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::auth::extract::CurrentUser;
use crate::auth::tokens::TOKEN_COOKIE;
use crate::domain::{CreateUser, User, UserResponse};
use crate::error::{Error, Result};
use crate::query::FilterCondition;
use crate::repository::Entity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// POST /api/v1/users/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<Response> {
    check_password_confirmation(
        payload.password.as_deref(),
        payload.password_confirm.as_deref(),
    )?;

    let user = state.users().create(User::from_create(payload)).await?;

    let profile_url = format!("{}/me", state.config().service.base_url);
    let message = state.composer().welcome(&user, &profile_url)?;
    state.mailer().send(&message).await?;

    send_token(&state, user, StatusCode::OK)
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(Error::BadRequest(
            "Please provide your email and password".to_string(),
        ));
    };

    let user = state
        .users()
        .find_one(&[FilterCondition::eq("email", email.to_lowercase())])
        .await?;
    let Some(user) = user else {
        return Err(incorrect_credentials());
    };
    if !state.hasher().verify(&password, &user.password)? {
        return Err(incorrect_credentials());
    }

    send_token(&state, user, StatusCode::OK)
}

/// POST /api/v1/users/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = format!(
        "{TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        secure_suffix(&state)
    );
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({"status": "success"})),
    )
        .into_response()
}

/// POST /api/v1/users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = payload
        .email
        .ok_or_else(|| Error::BadRequest("Please provide your email".to_string()))?;
    let user = state
        .users()
        .find_one(&[FilterCondition::eq("email", email.to_lowercase())])
        .await?
        .ok_or_else(|| {
            Error::NotFound("There is no user with this email address".to_string())
        })?;

    let reset_token = new_reset_token();
    let expires = Utc::now() + Duration::minutes(state.config().auth.reset_token_ttl_minutes);
    let patch = json!({
        "password_reset_token": hash_reset_token(&reset_token),
        "password_reset_expires": expires,
    });
    state
        .users()
        .update(&user.id, patch.as_object().cloned().unwrap_or_default())
        .await?;

    let reset_url = format!(
        "{}/api/v1/users/reset-password/{reset_token}",
        state.config().service.base_url
    );
    let message = state.composer().password_reset(&user, &reset_url)?;
    if let Err(err) = state.mailer().send(&message).await {
        // Roll the token back so a half-issued reset cannot linger.
        let clear = json!({
            "password_reset_token": null,
            "password_reset_expires": null,
        });
        state
            .users()
            .update(&user.id, clear.as_object().cloned().unwrap_or_default())
            .await?;
        tracing::error!("password reset mail failed: {err}");
        return Err(Error::Mail("password reset delivery failed".to_string()));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email",
    })))
}

/// PATCH /api/v1/users/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response> {
    check_password_confirmation(
        payload.password.as_deref(),
        payload.password_confirm.as_deref(),
    )?;

    let hashed = hash_reset_token(&token);
    let user = state
        .users()
        .find_one(&[FilterCondition::eq("password_reset_token", hashed)])
        .await?;
    let valid = user
        .as_ref()
        .and_then(|u| u.password_reset_expires)
        .is_some_and(|expires| expires > Utc::now());
    let Some(user) = user.filter(|_| valid) else {
        return Err(Error::BadRequest(
            "Token is invalid or has expired".to_string(),
        ));
    };

    let patch = json!({
        "password": payload.password,
        "password_reset_token": null,
        "password_reset_expires": null,
    });
    let user = state
        .users()
        .update(&user.id, patch.as_object().cloned().unwrap_or_default())
        .await?
        .ok_or_else(|| Error::Unauthorized("Please log in again".to_string()))?;

    send_token(&state, user, StatusCode::OK)
}

/// PATCH /api/v1/users/update-password (protected)
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response> {
    let current = payload.password_current.ok_or_else(|| {
        Error::BadRequest("Please provide your current password".to_string())
    })?;
    if !state.hasher().verify(&current, &user.password)? {
        return Err(Error::Unauthorized(
            "Your current password is wrong".to_string(),
        ));
    }
    check_password_confirmation(
        payload.password.as_deref(),
        payload.password_confirm.as_deref(),
    )?;

    let patch = json!({"password": payload.password});
    let user = state
        .users()
        .update(&user.id, patch.as_object().cloned().unwrap_or_default())
        .await?
        .ok_or_else(|| Error::Unauthorized("Please log in again".to_string()))?;

    send_token(&state, user, StatusCode::OK)
}

/// Issue a token and answer with it in the body and the cookie.
fn send_token(state: &AppState, user: User, status: StatusCode) -> Result<Response> {
    let token = state.tokens().sign(&user.id)?;
    let max_age = state.config().auth.cookie_ttl_days * 24 * 60 * 60;
    let cookie = format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{}",
        secure_suffix(state)
    );

    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": UserResponse::from(user) },
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn secure_suffix(state: &AppState) -> &'static str {
    if state.config().service.secure_cookies() {
        "; Secure"
    } else {
        ""
    }
}

fn incorrect_credentials() -> Error {
    Error::Unauthorized("Incorrect email or password".to_string())
}

fn check_password_confirmation(
    password: Option<&str>,
    confirm: Option<&str>,
) -> Result<()> {
    match (password, confirm) {
        (Some(password), Some(confirm)) if password == confirm => Ok(()),
        (None, _) => Err(Error::Validation(
            "Please provide a password".to_string(),
        )),
        _ => Err(Error::Validation(
            "Please confirm your password correctly".to_string(),
        )),
    }
}

/// Mint a fresh plaintext reset token
fn new_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Only the hash of a reset token is ever stored
pub fn hash_reset_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
