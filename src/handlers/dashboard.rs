use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::ExpeditionStatus,
    services::dashboard::{Dashboard, DashboardTotals},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentExpedition {
    pub id: Uuid,
    pub number: String,
    pub designation: String,
    pub status: ExpeditionStatus,
    pub origin: String,
    pub destination: String,
    pub departure_date: Option<DateTime<Utc>>,
    pub owner_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub totals: DashboardTotals,
    pub recent: Vec<RecentExpedition>,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            totals: dashboard.totals,
            recent: dashboard
                .recent
                .into_iter()
                .map(|(e, owner)| RecentExpedition {
                    id: e.id,
                    number: e.number,
                    designation: e.designation,
                    status: e.status,
                    origin: e.origin,
                    destination: e.destination,
                    departure_date: e.departure_date,
                    owner_name: owner.map(|u| u.name),
                })
                .collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Totals and most recent departures", body = ApiResponse<DashboardResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<DashboardResponse> {
    let dashboard = state.services.dashboard.overview().await?;
    Ok(Json(ApiResponse::success(dashboard.into())))
}
