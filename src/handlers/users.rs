use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    models::{user, UserRole},
    services::users::UpdateUserInput,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "3f0c6a52-8f0e-4c69-9d4e-2b8a1c1f7a10",
    "email": "r.rakoto@ceni.mg",
    "name": "Rakoto Rabe",
    "role": "manager",
    "phone": "+261 34 00 000 00",
    "position": "Responsable logistique",
    "created_at": "2024-03-01T08:00:00Z",
    "updated_at": "2024-03-01T08:00:00Z"
}))]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            phone: model.phone,
            position: model.position,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Local record of the authenticated user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_me(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<UserResponse> {
    let me = state.services.users.get_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(me.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "Users ordered by name", body = ApiResponse<Vec<UserResponse>>)
    ),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserResponse>> {
    let users = state.services.users.list_users().await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/:id",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserInput>,
) -> ApiResult<UserResponse> {
    let updated = state.services.users.update_user(id, payload).await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/:id",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "User still owns expeditions or movements", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    if id == auth_user.user_id {
        return Err(ServiceError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    state.services.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
