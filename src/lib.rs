//! # trailhead
//!
//! Tour-booking web backend: a REST API for tours, users, reviews, and
//! bookings over an embedded document store, with cookie/JWT
//! authentication, role-based authorization, payment-session creation,
//! image uploads, and server-rendered views.
//!
//! Two abstractions govern every list/detail/write endpoint:
//!
//! - [`query`]: translates raw query parameters into a fully-resolved
//!   read description (filter → sort → project → paginate).
//! - [`handlers`]: generic CRUD handlers parameterized over an entity
//!   type, sharing a uniform JSON envelope; every failure funnels into
//!   one error-normalization stage ([`error`] + `middleware`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use trailhead::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::new(config.clone())?;
//!     let app = trailhead::api::app(state);
//!
//!     Server::new(config).serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod observability;
pub mod payments;
pub mod query;
pub mod repository;
pub mod server;
pub mod state;
pub mod store;
pub mod uploads;
pub mod views;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ReportMode, Result};
    pub use crate::observability::init_tracing;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder, HasRepository};

    pub use crate::auth::{protect, require_role, Claims, CurrentUser, PasswordHasher, TokenKeys};
    pub use crate::domain::{Booking, Review, Role, Tour, User, UserResponse};
    pub use crate::handlers::{crud_router, Created, Envelope, NoContent};
    pub use crate::query::{
        FilterCondition, FilterOperator, FilterValue, Projection, QueryOptions, QuerySpec,
        SortKey, SortOrder,
    };
    pub use crate::repository::{
        Entity, Repository, RepositoryError, RepositoryResult, SaveHook,
    };
    pub use crate::store::{Collection, Document, DocumentStore};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post, put},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use anyhow;
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
