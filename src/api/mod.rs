//! Router assembly
//!
//! Versioned JSON API under `/api/v1`, page routes at the root, and the
//! payment webhook outside the versioned prefix (its body must arrive
//! unconsumed for signature verification). Rate limiting applies to the
//! API boundary only; error rendering and the tower-http stack wrap
//! everything.

mod bookings;
mod reviews;
mod tours;
mod users;

use axum::{http::Uri, middleware, routing::post, Router};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::error::Error;
use crate::state::AppState;
use crate::{middleware as layers, views};

/// The complete application router
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/tours", tours::router(&state))
        .nest("/users", users::router(&state))
        .nest("/reviews", reviews::router(&state))
        .nest("/bookings", bookings::router(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layers::rate_limit,
        ));

    Router::new()
        .merge(views::router(&state))
        .nest("/api/v1", api)
        .route("/webhook-checkout", post(bookings::webhook_checkout))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layers::render_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(
            state.config().service.body_limit_kb * 1024,
        ))
        .with_state(state)
}

async fn not_found(uri: Uri) -> Error {
    Error::NotFound(format!("Can't find {} on this server", uri.path()))
}
