//! Expedition API Library
//!
//! Tracks shipments of electoral materiel between administrative sites: the
//! shipments themselves, their line items, the movement log and the
//! region/district/commune/voting-center hierarchy they travel through.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, put},
    Extension, Router,
};
use axum::response::Json;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned JSON API. Every route requires a bearer token.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{dashboard, expeditions, movements, users};

    let expedition_routes = Router::new()
        .route(
            "/expeditions",
            get(expeditions::list_expeditions).post(expeditions::create_expedition),
        )
        // static segment registered ahead of `:id`
        .route("/expeditions/stats", get(expeditions::expedition_stats))
        .route(
            "/expeditions/:id",
            get(expeditions::get_expedition)
                .put(expeditions::update_expedition)
                .delete(expeditions::delete_expedition),
        )
        .route(
            "/expeditions/:id/movements",
            get(expeditions::expedition_movements),
        )
        .route(
            "/expeditions/:id/manifest",
            get(expeditions::expedition_manifest),
        )
        .route("/materiels/:id", get(expeditions::get_materiel))
        .route("/movements", get(movements::list_movements));

    let user_routes = Router::new()
        .route("/me", get(users::get_me))
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            put(users::update_user).delete(users::delete_user),
        );

    Router::new()
        .route("/status", get(api_status))
        .route("/dashboard", get(dashboard::get_dashboard))
        .merge(expedition_routes)
        .merge(handlers::geography::geography_routes())
        .merge(handlers::materiel_types::materiel_type_routes())
        .merge(user_routes)
        .with_auth()
}

/// Form-action endpoints mounted under `/api`.
pub fn action_routes() -> Router<AppState> {
    handlers::actions::action_routes().with_auth()
}

/// Assembles the application router without the outer transport layers
/// (CORS, compression) that only the binary applies.
pub fn app_router(
    state: AppState,
    auth_service: Arc<AuthService>,
    health_state: Arc<health::HealthState>,
) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/api", action_routes())
        .with_state(state)
        .nest("/health", health::health_routes(health_state))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        // auth middleware reads the service from request extensions
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}

async fn api_status(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "expedition-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}
