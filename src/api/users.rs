//! User routes: account flows, the `me` surface, and admin management

use axum::{
    extract::{Multipart, State},
    middleware,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde_json::Value;

use crate::auth::{self, protect, require_role, CurrentUser};
use crate::domain::{Role, User};
use crate::error::{Error, Result};
use crate::handlers::{delete_one, get_all, get_one, Envelope, NoContent};
use crate::state::AppState;
use crate::store::Document;
use crate::uploads::{ensure_supported, image_filename, USER_IMAGES};

pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", patch(auth::reset_password));

    let me = Router::new()
        .route("/update-password", patch(auth::update_password))
        .route("/me", get(get_me))
        .route("/update-me", patch(update_me))
        .route("/delete-me", delete(delete_me))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    let admin = Router::new()
        .route("/", get(get_all::<User>))
        .route("/{user_id}", get(get_one::<User>).delete(delete_one::<User>))
        .route_layer(middleware::from_fn(|req: axum::extract::Request, next: axum::middleware::Next| {
            require_role(&[Role::Admin], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    public.merge(me).merge(admin)
}

/// GET /me — the authenticated user's own record
async fn get_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Envelope<Document>>> {
    let doc = state.users().find_doc_by_id(&user.id).await?;
    Ok(Json(Envelope::item(doc)))
}

/// PATCH /update-me — name, email, and photo only; password changes must
/// go through /update-password.
async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<Document>>> {
    let mut patch = Document::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "password" | "password_confirm" => {
                return Err(Error::BadRequest(
                    "This route is not for password updates. Please use /update-password"
                        .to_string(),
                ));
            }
            "name" | "email" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::BadRequest(format!("malformed upload: {e}")))?;
                let value = if name == "email" { text.to_lowercase() } else { text };
                patch.insert(name, Value::String(value));
            }
            "photo" => {
                ensure_supported(field.content_type())?;
                let original = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::BadRequest(format!("malformed upload: {e}")))?;
                if bytes.len() > state.config().uploads.max_image_bytes {
                    return Err(Error::BadRequest("Image too large".to_string()));
                }
                let filename =
                    image_filename(&format!("user-{}", user.id), original.as_deref(), None);
                state.images().store(USER_IMAGES, &filename, &bytes).await?;
                patch.insert("photo".to_string(), Value::String(filename));
            }
            // Anything else is not updatable through this route
            _ => {}
        }
    }
    if patch.is_empty() {
        return Err(Error::BadRequest("No updatable fields provided".to_string()));
    }

    let updated = state
        .users()
        .update(&user.id, patch)
        .await?
        .ok_or_else(|| Error::Unauthorized("Please log in again".to_string()))?;
    let doc = state
        .users()
        .find_doc_by_id(&updated.id)
        .await?
        .ok_or_else(|| Error::Unauthorized("Please log in again".to_string()))?;
    Ok(Json(Envelope::item(Some(doc))))
}

/// DELETE /delete-me — deactivate the account; reads stop resolving it
async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<NoContent> {
    let patch = serde_json::json!({"active": false});
    state
        .users()
        .update(&user.id, patch.as_object().cloned().unwrap_or_default())
        .await?
        .ok_or_else(|| {
            Error::Unauthorized("Cannot delete the current user, please log in again".to_string())
        })?;
    Ok(NoContent)
}
