//! Centralized error rendering
//!
//! Handlers never shape failure responses themselves; they surface an
//! [`crate::error::Error`], which attaches an [`ErrorContext`] to the
//! response. This layer — constructed with the configured [`ReportMode`] —
//! rewrites that response: JSON envelopes for `/api` and webhook paths,
//! a rendered error view for page paths, full diagnostic detail only in
//! verbose mode.

use askama::Template;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::error::{ErrorBody, ErrorContext, ReportMode};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    title: String,
    message: String,
}

/// Rewrite failure responses according to path kind and report mode.
pub async fn render_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let api_path = is_api_path(request.uri().path());
    let response = next.run(request).await;

    let Some(context) = response.extensions().get::<ErrorContext>().cloned() else {
        return response;
    };
    let mode = state.config().service.error_detail;

    if api_path {
        render_api(&context, mode)
    } else {
        render_page(&context, mode)
    }
}

fn is_api_path(path: &str) -> bool {
    path.starts_with("/api") || path.starts_with("/webhook")
}

fn render_api(context: &ErrorContext, mode: ReportMode) -> Response {
    let mut body = ErrorBody::new(&context.public_message, context.code);
    if mode == ReportMode::Verbose {
        body = ErrorBody::new(&context.detail, context.code).with_detail(&context.detail);
    }
    (context.status, Json(body)).into_response()
}

fn render_page(context: &ErrorContext, mode: ReportMode) -> Response {
    let message = match mode {
        ReportMode::Verbose => context.detail.clone(),
        ReportMode::Restricted if context.operational => context.public_message.clone(),
        ReportMode::Restricted => "Please try again later".to_string(),
    };
    let page = ErrorTemplate {
        title: "Something went wrong".to_string(),
        message,
    };
    match page.render() {
        Ok(html) => (context.status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!("error page failed to render: {err}");
            (
                context.status,
                [(header::CONTENT_TYPE, "text/plain")],
                "Something went wrong".to_string(),
            )
                .into_response()
        }
    }
}
