//! Standalone review routes; the nested variant lives under tours

use axum::{extract::State, middleware, routing::get, Extension, Json, Router};

use crate::auth::{protect, require_role, CurrentUser};
use crate::domain::{CreateReview, Review, Role};
use crate::error::Result;
use crate::handlers::{delete_one, get_all, get_one, Created, Envelope};
use crate::repository::{to_outbound_document, Entity};
use crate::state::AppState;
use crate::store::Document;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_all::<Review>).post(create_review))
        .route("/{review_id}", get(get_one::<Review>).delete(delete_one::<Review>))
        .route_layer(middleware::from_fn(|req: axum::extract::Request, next: axum::middleware::Next| {
            require_role(&[Role::User, Role::Admin], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// The author always defaults from the authenticated user; the tour must
/// come in the body on this route.
async fn create_review(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(mut payload): Json<CreateReview>,
) -> Result<Created<Document>> {
    payload.user.get_or_insert(user.id);
    let review = state.reviews().create(Review::from_create(payload)).await?;
    Ok(Created(Envelope::item(Some(to_outbound_document(&review)?))))
}
