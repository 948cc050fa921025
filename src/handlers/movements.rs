use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    models::{ExpeditionStatus, MovementType},
    services::movements::JournalEntry,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JournalQuery {
    /// Matches number, designation, user name or email, notes and location
    pub search: Option<String>,
    /// Defaults to 200, capped at 1000
    pub limit: Option<u64>,
}

/// One row of the global movement journal
#[derive(Debug, Serialize, ToSchema)]
pub struct JournalEntryResponse {
    pub id: Uuid,
    pub expedition_id: Uuid,
    pub expedition_number: Option<String>,
    pub expedition_designation: Option<String>,
    pub movement_type: MovementType,
    pub status_before: Option<ExpeditionStatus>,
    pub status_after: ExpeditionStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl From<JournalEntry> for JournalEntryResponse {
    fn from(entry: JournalEntry) -> Self {
        let movement = entry.movement;
        let (expedition_number, expedition_designation) = match entry.expedition {
            Some(e) => (Some(e.number), Some(e.designation)),
            None => (None, None),
        };
        let (user_name, user_email) = match entry.user {
            Some(u) => (Some(u.name), Some(u.email)),
            None => (None, None),
        };
        Self {
            id: movement.id,
            expedition_id: movement.expedition_id,
            expedition_number,
            expedition_designation,
            movement_type: movement.movement_type,
            status_before: movement.status_before,
            status_after: movement.status_after,
            location: movement.location,
            notes: movement.notes,
            user_id: movement.user_id,
            user_name,
            user_email,
            occurred_at: movement.occurred_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(JournalQuery),
    responses(
        (status = 200, description = "Movements across all shipments, newest first", body = ApiResponse<Vec<JournalEntryResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<JournalQuery>,
) -> ApiResult<Vec<JournalEntryResponse>> {
    let entries = state
        .services
        .movements
        .journal(query.search.as_deref(), query.limit)
        .await?;
    Ok(Json(ApiResponse::success(
        entries.into_iter().map(JournalEntryResponse::from).collect(),
    )))
}
