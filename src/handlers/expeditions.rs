use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{created, total_pages, UserRef};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    models::{expedition, ExpeditionStatus, MaterielStatus, MovementType},
    services::{
        expeditions::{
            ExpeditionDetail, ExpeditionFilter, ExpeditionForm, ExpeditionStats, MaterielDetail,
            MaterielLine,
        },
        manifest::{Manifest, ManifestFormat},
        movements::MovementEntry,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpeditionListQuery {
    /// Only shipments in this status
    pub status: Option<ExpeditionStatus>,
    /// Case-insensitive match on number, designation, origin or destination
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "designation": "Kits bureau de vote - Analamanga" }))]
pub struct CreateExpeditionRequest {
    #[validate(length(min = 1, max = 255))]
    pub designation: String,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// `mine` (default) or `all`
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ManifestQuery {
    /// `json` (default), `csv` or `tsv`
    pub format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterielTypeRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterielResponse {
    pub id: Uuid,
    pub expedition_id: Uuid,
    pub materiel_type: Option<MaterielTypeRef>,
    pub designation: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub quantity_received: Option<i32>,
    pub quantity_used: Option<i32>,
    pub status: MaterielStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MaterielLine> for MaterielResponse {
    fn from(line: MaterielLine) -> Self {
        let item = line.item;
        Self {
            id: item.id,
            expedition_id: item.expedition_id,
            materiel_type: line.materiel_type.map(|t| MaterielTypeRef {
                id: t.id,
                code: t.code,
                name: t.name,
            }),
            designation: item.designation,
            category: item.category,
            description: item.description,
            quantity: item.quantity,
            quantity_received: item.quantity_received,
            quantity_used: item.quantity_used,
            status: item.status,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "6a7e3c1d-2f4b-4e8a-9c0d-1b2a3c4d5e6f",
    "expedition_id": "550e8400-e29b-41d4-a716-446655440000",
    "movement_type": "status_change",
    "status_before": "draft",
    "status_after": "in_transit",
    "location": "Ivato",
    "notes": "Status change",
    "user": { "id": "3f0c6a52-8f0e-4c69-9d4e-2b8a1c1f7a10", "name": "Rakoto Rabe", "email": "r.rakoto@ceni.mg" },
    "occurred_at": "2024-05-02T08:00:00Z"
}))]
pub struct MovementResponse {
    pub id: Uuid,
    pub expedition_id: Uuid,
    pub movement_type: MovementType,
    pub status_before: Option<ExpeditionStatus>,
    pub status_after: ExpeditionStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub user: Option<UserRef>,
    pub occurred_at: DateTime<Utc>,
}

impl From<MovementEntry> for MovementResponse {
    fn from(entry: MovementEntry) -> Self {
        let movement = entry.movement;
        Self {
            id: movement.id,
            expedition_id: movement.expedition_id,
            movement_type: movement.movement_type,
            status_before: movement.status_before,
            status_after: movement.status_after,
            location: movement.location,
            notes: movement.notes,
            user: entry.user.map(UserRef::from),
            occurred_at: movement.occurred_at,
        }
    }
}

/// `{id, code, name}` of one level of the hierarchy
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct GeographyResponse {
    pub region: Option<PlaceRef>,
    pub district: Option<PlaceRef>,
    pub commune: Option<PlaceRef>,
    pub voting_center: Option<PlaceRef>,
}

fn place(id: Uuid, code: String, name: String) -> PlaceRef {
    PlaceRef { id, code, name }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "550e8400-e29b-41d4-a716-446655440000",
    "number": "EXP-2024-3FA9C1",
    "designation": "Kits bureau de vote - Analamanga",
    "origin": "Antananarivo",
    "departure_date": "2024-05-02T08:00:00Z",
    "destination": "Ambohidratrimo",
    "arrival_date": "2024-05-03T17:00:00Z",
    "status": "in_transit",
    "materiels": [],
    "movements": []
}))]
pub struct ExpeditionResponse {
    pub id: Uuid,
    /// `EXP-<year>-<6 uppercase hex>`
    pub number: String,
    pub designation: String,
    pub origin: String,
    pub departure_date: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub destination: String,
    pub arrival_date: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub receiver_address: Option<String>,
    pub status: ExpeditionStatus,
    pub notes: Option<String>,
    pub region_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub commune_id: Option<Uuid>,
    pub voting_center_id: Option<Uuid>,
    pub user_id: Uuid,
    pub owner: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<GeographyResponse>,
    pub materiels: Vec<MaterielResponse>,
    /// Newest first
    pub movements: Vec<MovementResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpeditionResponse {
    fn bare(model: expedition::Model) -> Self {
        Self {
            id: model.id,
            number: model.number,
            designation: model.designation,
            origin: model.origin,
            departure_date: model.departure_date,
            sender_name: model.sender_name,
            sender_address: model.sender_address,
            destination: model.destination,
            arrival_date: model.arrival_date,
            receiver_name: model.receiver_name,
            receiver_address: model.receiver_address,
            status: model.status,
            notes: model.notes,
            region_id: model.region_id,
            district_id: model.district_id,
            commune_id: model.commune_id,
            voting_center_id: model.voting_center_id,
            user_id: model.user_id,
            owner: None,
            geography: None,
            materiels: Vec::new(),
            movements: Vec::new(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<expedition::Model> for ExpeditionResponse {
    fn from(model: expedition::Model) -> Self {
        Self::bare(model)
    }
}

impl From<ExpeditionDetail> for ExpeditionResponse {
    fn from(detail: ExpeditionDetail) -> Self {
        let mut response = Self::bare(detail.expedition);
        response.owner = detail.owner.map(UserRef::from);
        response.geography = detail.geography.map(|links| GeographyResponse {
            region: links.region.map(|r| place(r.id, r.code, r.name)),
            district: links.district.map(|d| place(d.id, d.code, d.name)),
            commune: links.commune.map(|c| place(c.id, c.code, c.name)),
            voting_center: links.voting_center.map(|v| place(v.id, v.code, v.name)),
        });
        response.materiels = detail
            .materiels
            .into_iter()
            .map(MaterielResponse::from)
            .collect();
        response.movements = detail
            .movements
            .into_iter()
            .map(MovementResponse::from)
            .collect();
        response
    }
}

/// A line item with the shipment it belongs to
#[derive(Debug, Serialize, ToSchema)]
pub struct MaterielDetailResponse {
    #[serde(flatten)]
    pub item: MaterielResponse,
    pub expedition: ExpeditionResponse,
}

impl From<MaterielDetail> for MaterielDetailResponse {
    fn from(detail: MaterielDetail) -> Self {
        Self {
            item: MaterielLine {
                item: detail.item,
                materiel_type: detail.materiel_type,
            }
            .into(),
            expedition: detail.expedition.into(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/expeditions",
    params(ExpeditionListQuery),
    responses(
        (status = 200, description = "Shipments of the authenticated user, newest first", body = ApiResponse<PaginatedResponse<ExpeditionResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn list_expeditions(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ExpeditionListQuery>,
) -> ApiResult<PaginatedResponse<ExpeditionResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = state.config.page_limit(query.limit);

    let result = state
        .services
        .expeditions
        .list_for_user(
            &auth_user.email,
            ExpeditionFilter {
                status: query.status,
                search: query.search,
                page,
                limit,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: result
            .items
            .into_iter()
            .map(ExpeditionResponse::from)
            .collect(),
        total: result.total,
        page: result.page,
        limit: result.limit,
        total_pages: total_pages(result.total, result.limit),
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/expeditions",
    request_body = CreateExpeditionRequest,
    responses(
        (status = 201, description = "Draft shipment created", body = ApiResponse<ExpeditionResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "No free expedition number", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn create_expedition(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateExpeditionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ExpeditionResponse>>), ServiceError> {
    payload.validate()?;
    let created_expedition = state
        .services
        .expeditions
        .create_expedition(&auth_user.email, &payload.designation)
        .await?;
    Ok(created(ExpeditionResponse::from(created_expedition)))
}

#[utoipa::path(
    get,
    path = "/api/v1/expeditions/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Shipment counts per status", body = ApiResponse<ExpeditionStats>),
        (status = 400, description = "Unknown scope", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn expedition_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<StatsQuery>,
) -> ApiResult<ExpeditionStats> {
    let owner = match query.scope.as_deref().map(str::trim) {
        None | Some("") | Some("mine") => Some(auth_user.user_id),
        Some("all") => None,
        Some(other) => {
            return Err(ServiceError::BadRequest(format!(
                "Unknown scope '{}', expected mine or all",
                other
            )))
        }
    };
    let stats = state.services.expeditions.stats(owner).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/expeditions/:id",
    params(("id" = Uuid, Path, description = "Expedition ID")),
    responses(
        (status = 200, description = "Shipment with line items, geography and movements", body = ApiResponse<ExpeditionResponse>),
        (status = 404, description = "Expedition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn get_expedition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ExpeditionResponse> {
    let detail = state.services.expeditions.get_expedition(id).await?;
    Ok(Json(ApiResponse::success(detail.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/expeditions/:id",
    params(("id" = Uuid, Path, description = "Expedition ID")),
    request_body = ExpeditionForm,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse<ExpeditionResponse>),
        (status = 400, description = "Invalid form", body = crate::errors::ErrorResponse),
        (status = 404, description = "Expedition not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Status changed concurrently", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn update_expedition(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(form): Json<ExpeditionForm>,
) -> ApiResult<ExpeditionResponse> {
    let detail = state
        .services
        .expeditions
        .update_expedition(id, form, Some(auth_user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(detail.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/expeditions/:id",
    params(("id" = Uuid, Path, description = "Expedition ID")),
    responses(
        (status = 204, description = "Shipment, line items and movements deleted"),
        (status = 404, description = "Expedition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn delete_expedition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.expeditions.delete_expedition(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/expeditions/:id/movements",
    params(("id" = Uuid, Path, description = "Expedition ID")),
    responses(
        (status = 200, description = "Movement log, newest first", body = ApiResponse<Vec<MovementResponse>>),
        (status = 404, description = "Expedition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn expedition_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<MovementResponse>> {
    let entries = state.services.expeditions.movements_for(id).await?;
    Ok(Json(ApiResponse::success(
        entries.into_iter().map(MovementResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/expeditions/:id/manifest",
    params(
        ("id" = Uuid, Path, description = "Expedition ID"),
        ManifestQuery
    ),
    responses(
        (status = 200, description = "Manifest as JSON, or as a CSV/TSV attachment", body = ApiResponse<Manifest>),
        (status = 400, description = "Unsupported format", body = crate::errors::ErrorResponse),
        (status = 404, description = "Expedition not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn expedition_manifest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ManifestQuery>,
) -> Result<Response, ServiceError> {
    let format = match query.format.as_deref() {
        None => ManifestFormat::default(),
        Some(raw) => raw
            .parse::<ManifestFormat>()
            .map_err(|e| ServiceError::BadRequest(e.to_string()))?,
    };

    let manifest = state.services.expeditions.manifest(id).await?;
    if format == ManifestFormat::Json {
        return Ok(Json(ApiResponse::success(manifest)).into_response());
    }

    let (body, content_type) = manifest.render(format)?;
    let disposition = format!("attachment; filename=\"{}\"", manifest.filename(format));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/materiels/:id",
    params(("id" = Uuid, Path, description = "Materiel line item ID")),
    responses(
        (status = 200, description = "Line item with its shipment", body = ApiResponse<MaterielDetailResponse>),
        (status = 404, description = "Materiel not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expeditions"
)]
pub async fn get_materiel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<MaterielDetailResponse> {
    let detail = state.services.expeditions.get_materiel(id).await?;
    Ok(Json(ApiResponse::success(detail.into())))
}
