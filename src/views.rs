//! Server-rendered pages
//!
//! Overview, tour detail, login, sign-up, and profile. Every page route
//! runs behind `maybe_user`, so templates can vary on login state without
//! gating the page itself; the profile redirects anonymous visitors.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};

use crate::auth::{maybe_user, CurrentUser};
use crate::domain::{tour_scope, Review, Tour, UserResponse};
use crate::error::{Error, Result};
use crate::query::{FilterCondition, QuerySpec};
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/tour/{slug}", get(tour_page))
        .route("/login", get(login_page))
        .route("/sign-up", get(signup_page))
        .route("/me", get(profile_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), maybe_user))
}

#[derive(Template, WebTemplate)]
#[template(path = "overview.html")]
struct OverviewPage {
    user: Option<UserResponse>,
    tours: Vec<Tour>,
}

#[derive(Template, WebTemplate)]
#[template(path = "tour.html")]
struct TourPage {
    user: Option<UserResponse>,
    tour: Tour,
    reviews: Vec<Review>,
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
struct LoginPage {
    user: Option<UserResponse>,
}

#[derive(Template, WebTemplate)]
#[template(path = "signup.html")]
struct SignupPage {
    user: Option<UserResponse>,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
struct ProfilePage {
    user: Option<UserResponse>,
    profile: UserResponse,
}

fn visitor(current: Option<Extension<CurrentUser>>) -> Option<UserResponse> {
    current.map(|Extension(CurrentUser(user))| UserResponse::from(user))
}

async fn overview(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<OverviewPage> {
    Ok(OverviewPage {
        user: visitor(current),
        tours: state.tours().all().await?,
    })
}

async fn tour_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    current: Option<Extension<CurrentUser>>,
) -> Result<TourPage> {
    let tour = state
        .tours()
        .find_one(&[FilterCondition::eq("slug", slug)])
        .await?
        .ok_or_else(|| Error::NotFound("There is no tour with that name".to_string()))?;
    let reviews = state
        .reviews()
        .find_entities(&QuerySpec::default().with_scope(tour_scope(&tour.id)))
        .await?;
    Ok(TourPage {
        user: visitor(current),
        tour,
        reviews,
    })
}

async fn login_page(current: Option<Extension<CurrentUser>>) -> LoginPage {
    LoginPage {
        user: visitor(current),
    }
}

async fn signup_page(current: Option<Extension<CurrentUser>>) -> SignupPage {
    SignupPage {
        user: visitor(current),
    }
}

async fn profile_page(current: Option<Extension<CurrentUser>>) -> Response {
    match current {
        Some(Extension(CurrentUser(user))) => {
            let profile = UserResponse::from(user);
            ProfilePage {
                user: Some(profile.clone()),
                profile,
            }
            .into_response()
        }
        None => Redirect::to("/login").into_response(),
    }
}
