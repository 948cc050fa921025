use axum::{http::StatusCode, response::Json};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{errors::ServiceError, models::user, ApiResponse};

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Short user reference embedded in other resources
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<user::Model> for UserRef {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

/// Parses a path id, mapping garbage to a validation error.
pub fn parse_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Invalid id '{}'", raw)))
}

/// Pagination totals shared by list endpoints.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}
