//! Booking routes: checkout sessions, the settlement webhook, and
//! admin-side CRUD

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::auth::{protect, require_role, CurrentUser};
use crate::domain::{Booking, CreateBooking, Role};
use crate::error::{Error, Result};
use crate::handlers::{crud_router, parse_id};
use crate::payments::SIGNATURE_HEADER;
use crate::repository::Entity;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    let session = Router::new()
        .route("/checkout-session/{tour_id}", get(checkout_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    let admin = crud_router::<Booking>()
        .route_layer(middleware::from_fn(|req: axum::extract::Request, next: axum::middleware::Next| {
            require_role(&[Role::Admin, Role::LeadGuide], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), protect));

    session.merge(admin)
}

/// GET /checkout-session/{tour_id} — ask the gateway for a session the
/// client can complete
async fn checkout_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
) -> Result<Json<Value>> {
    let tour_id = parse_id(&tour_id)?;
    let tour = state
        .tours()
        .find_by_id(&tour_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No Tour found with id {tour_id}")))?;

    let session = state.payments().create_checkout_session(&tour, &user).await?;
    Ok(Json(json!({
        "status": "success",
        "session": session,
    })))
}

/// POST /webhook-checkout — signature-verified settlement notification;
/// creates the booking. Mounted outside the versioned API prefix.
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::BadRequest("missing webhook signature".to_string()))?;

    let event = state.payments().verify_webhook(&body, signature)?;
    let booking = Booking::from_create(CreateBooking {
        tour: Some(event.tour),
        user: Some(event.user),
        price: Some(event.price),
        paid: Some(true),
    });
    state.bookings().create(booking).await?;

    Ok(Json(json!({"received": true})))
}
