use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::created;
use crate::{
    errors::ServiceError, models::materiel_type,
    services::materiel_types::MaterielTypeInput, ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterielTypeResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<materiel_type::Model> for MaterielTypeResponse {
    fn from(model: materiel_type::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            category: model.category,
            description: model.description,
            unit: model.unit,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub fn materiel_type_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/materiel-types",
            get(list_materiel_types).post(create_materiel_type),
        )
        .route(
            "/materiel-types/:id",
            put(update_materiel_type).delete(delete_materiel_type),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/materiel-types",
    responses(
        (status = 200, description = "Catalog ordered by name", body = ApiResponse<Vec<MaterielTypeResponse>>)
    ),
    tag = "materiel-types"
)]
pub async fn list_materiel_types(
    State(state): State<AppState>,
) -> ApiResult<Vec<MaterielTypeResponse>> {
    let types = state.services.materiel_types.list().await?;
    Ok(Json(ApiResponse::success(
        types.into_iter().map(MaterielTypeResponse::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/materiel-types",
    request_body = MaterielTypeInput,
    responses(
        (status = 201, description = "Catalog entry created", body = ApiResponse<MaterielTypeResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "materiel-types"
)]
pub async fn create_materiel_type(
    State(state): State<AppState>,
    Json(payload): Json<MaterielTypeInput>,
) -> Result<(StatusCode, Json<ApiResponse<MaterielTypeResponse>>), ServiceError> {
    let model = state.services.materiel_types.create(payload).await?;
    Ok(created(MaterielTypeResponse::from(model)))
}

#[utoipa::path(
    put,
    path = "/api/v1/materiel-types/:id",
    params(("id" = Uuid, Path, description = "Materiel type ID")),
    request_body = MaterielTypeInput,
    responses(
        (status = 200, description = "Catalog entry updated", body = ApiResponse<MaterielTypeResponse>),
        (status = 404, description = "Materiel type not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "materiel-types"
)]
pub async fn update_materiel_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MaterielTypeInput>,
) -> ApiResult<MaterielTypeResponse> {
    let model = state.services.materiel_types.update(id, payload).await?;
    Ok(Json(ApiResponse::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/materiel-types/:id",
    params(("id" = Uuid, Path, description = "Materiel type ID")),
    responses(
        (status = 204, description = "Catalog entry deleted and unlinked from line items"),
        (status = 404, description = "Materiel type not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materiel-types"
)]
pub async fn delete_materiel_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.materiel_types.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
