use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::created;
use crate::{
    errors::ServiceError,
    models::{commune, district, region, voting_center},
    services::geography::{
        CommuneInput, CommuneNode, CommuneSummary, DistrictInput, DistrictNode, DistrictSummary,
        RegionInput, RegionNode, RegionSummary, VotingCenterInput, VotingCenterSummary,
    },
    ApiResponse, ApiResult, AppState,
};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistrictQuery {
    pub region_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CommuneQuery {
    pub district_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VotingCenterQuery {
    pub commune_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capital: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<region::Model> for RegionResponse {
    fn from(model: region::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            capital: model.capital,
            district_count: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<RegionSummary> for RegionResponse {
    fn from(summary: RegionSummary) -> Self {
        let mut response = Self::from(summary.region);
        response.district_count = Some(summary.district_count);
        response
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistrictResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capital: Option<String>,
    pub region_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commune_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<district::Model> for DistrictResponse {
    fn from(model: district::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            capital: model.capital,
            region_id: model.region_id,
            region_name: None,
            commune_count: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<DistrictSummary> for DistrictResponse {
    fn from(summary: DistrictSummary) -> Self {
        let mut response = Self::from(summary.district);
        response.region_name = summary.region.map(|r| r.name);
        response.commune_count = Some(summary.commune_count);
        response
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommuneResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub district_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voting_center_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<commune::Model> for CommuneResponse {
    fn from(model: commune::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            district_id: model.district_id,
            district_name: None,
            voting_center_count: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<CommuneSummary> for CommuneResponse {
    fn from(summary: CommuneSummary) -> Self {
        let mut response = Self::from(summary.commune);
        response.district_name = summary.district.map(|d| d.name);
        response.voting_center_count = Some(summary.voting_center_count);
        response
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VotingCenterResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    /// Registered voters
    pub capacity: Option<i32>,
    pub commune_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commune_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<voting_center::Model> for VotingCenterResponse {
    fn from(model: voting_center::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            address: model.address,
            capacity: model.capacity,
            commune_id: model.commune_id,
            commune_name: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<VotingCenterSummary> for VotingCenterResponse {
    fn from(summary: VotingCenterSummary) -> Self {
        let mut response = Self::from(summary.voting_center);
        response.commune_name = summary.commune.map(|c| c.name);
        response
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommuneTreeNode {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub voting_centers: Vec<VotingCenterResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistrictTreeNode {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capital: Option<String>,
    pub communes: Vec<CommuneTreeNode>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionTreeNode {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub capital: Option<String>,
    pub districts: Vec<DistrictTreeNode>,
}

impl From<CommuneNode> for CommuneTreeNode {
    fn from(node: CommuneNode) -> Self {
        Self {
            id: node.commune.id,
            code: node.commune.code,
            name: node.commune.name,
            voting_centers: node
                .voting_centers
                .into_iter()
                .map(VotingCenterResponse::from)
                .collect(),
        }
    }
}

impl From<DistrictNode> for DistrictTreeNode {
    fn from(node: DistrictNode) -> Self {
        Self {
            id: node.district.id,
            code: node.district.code,
            name: node.district.name,
            capital: node.district.capital,
            communes: node.communes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RegionNode> for RegionTreeNode {
    fn from(node: RegionNode) -> Self {
        Self {
            id: node.region.id,
            code: node.region.code,
            name: node.region.name,
            capital: node.region.capital,
            districts: node.districts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Routes for the four levels of the administrative hierarchy
pub fn geography_routes() -> Router<AppState> {
    Router::new()
        .route("/regions", get(list_regions).post(create_region))
        .route("/regions/tree", get(region_tree))
        .route("/regions/:id", put(update_region).delete(delete_region))
        .route("/regions/:id/districts", get(region_districts))
        .route("/districts", get(list_districts).post(create_district))
        .route("/districts/:id", put(update_district).delete(delete_district))
        .route("/districts/:id/communes", get(district_communes))
        .route("/communes", get(list_communes).post(create_commune))
        .route("/communes/:id", put(update_commune).delete(delete_commune))
        .route("/communes/:id/voting-centers", get(commune_voting_centers))
        .route(
            "/voting-centers",
            get(list_voting_centers).post(create_voting_center),
        )
        .route(
            "/voting-centers/:id",
            put(update_voting_center).delete(delete_voting_center),
        )
}

// Regions

#[utoipa::path(
    get,
    path = "/api/v1/regions",
    responses((status = 200, description = "Regions ordered by name", body = ApiResponse<Vec<RegionResponse>>)),
    tag = "geography"
)]
pub async fn list_regions(State(state): State<AppState>) -> ApiResult<Vec<RegionResponse>> {
    let regions = state.services.geography.list_regions().await?;
    Ok(Json(ApiResponse::success(
        regions.into_iter().map(RegionResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/regions/tree",
    responses((status = 200, description = "Full nested hierarchy", body = ApiResponse<Vec<RegionTreeNode>>)),
    tag = "geography"
)]
pub async fn region_tree(State(state): State<AppState>) -> ApiResult<Vec<RegionTreeNode>> {
    let tree = state.services.geography.region_tree().await?;
    Ok(Json(ApiResponse::success(
        tree.into_iter().map(RegionTreeNode::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/regions",
    request_body = RegionInput,
    responses(
        (status = 201, description = "Region created", body = ApiResponse<RegionResponse>),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn create_region(
    State(state): State<AppState>,
    Json(payload): Json<RegionInput>,
) -> Created<RegionResponse> {
    let model = state.services.geography.create_region(payload).await?;
    Ok(created(RegionResponse::from(model)))
}

#[utoipa::path(
    put,
    path = "/api/v1/regions/:id",
    params(("id" = Uuid, Path, description = "Region ID")),
    request_body = RegionInput,
    responses(
        (status = 200, description = "Region updated", body = ApiResponse<RegionResponse>),
        (status = 404, description = "Region not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn update_region(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RegionInput>,
) -> ApiResult<RegionResponse> {
    let model = state.services.geography.update_region(id, payload).await?;
    Ok(Json(ApiResponse::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/regions/:id",
    params(("id" = Uuid, Path, description = "Region ID")),
    responses(
        (status = 204, description = "Region deleted"),
        (status = 409, description = "Region still has districts", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn delete_region(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.geography.delete_region(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/regions/:id/districts",
    params(("id" = Uuid, Path, description = "Region ID")),
    responses(
        (status = 200, description = "Districts of the region", body = ApiResponse<Vec<DistrictResponse>>),
        (status = 404, description = "Region not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn region_districts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DistrictResponse>> {
    districts(&state, Some(id)).await
}

// Districts

async fn districts(state: &AppState, region_id: Option<Uuid>) -> ApiResult<Vec<DistrictResponse>> {
    let districts = state.services.geography.list_districts(region_id).await?;
    Ok(Json(ApiResponse::success(
        districts.into_iter().map(DistrictResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/districts",
    params(DistrictQuery),
    responses((status = 200, description = "Districts ordered by name", body = ApiResponse<Vec<DistrictResponse>>)),
    tag = "geography"
)]
pub async fn list_districts(
    State(state): State<AppState>,
    Query(query): Query<DistrictQuery>,
) -> ApiResult<Vec<DistrictResponse>> {
    districts(&state, query.region_id).await
}

#[utoipa::path(
    post,
    path = "/api/v1/districts",
    request_body = DistrictInput,
    responses(
        (status = 201, description = "District created", body = ApiResponse<DistrictResponse>),
        (status = 400, description = "Unknown region", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn create_district(
    State(state): State<AppState>,
    Json(payload): Json<DistrictInput>,
) -> Created<DistrictResponse> {
    let model = state.services.geography.create_district(payload).await?;
    Ok(created(DistrictResponse::from(model)))
}

#[utoipa::path(
    put,
    path = "/api/v1/districts/:id",
    params(("id" = Uuid, Path, description = "District ID")),
    request_body = DistrictInput,
    responses(
        (status = 200, description = "District updated", body = ApiResponse<DistrictResponse>),
        (status = 404, description = "District not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn update_district(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DistrictInput>,
) -> ApiResult<DistrictResponse> {
    let model = state.services.geography.update_district(id, payload).await?;
    Ok(Json(ApiResponse::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/districts/:id",
    params(("id" = Uuid, Path, description = "District ID")),
    responses(
        (status = 204, description = "District deleted"),
        (status = 409, description = "District still has communes", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn delete_district(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.geography.delete_district(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/districts/:id/communes",
    params(("id" = Uuid, Path, description = "District ID")),
    responses(
        (status = 200, description = "Communes of the district", body = ApiResponse<Vec<CommuneResponse>>),
        (status = 404, description = "District not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn district_communes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<CommuneResponse>> {
    communes(&state, Some(id)).await
}

// Communes

async fn communes(state: &AppState, district_id: Option<Uuid>) -> ApiResult<Vec<CommuneResponse>> {
    let communes = state.services.geography.list_communes(district_id).await?;
    Ok(Json(ApiResponse::success(
        communes.into_iter().map(CommuneResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/communes",
    params(CommuneQuery),
    responses((status = 200, description = "Communes ordered by name", body = ApiResponse<Vec<CommuneResponse>>)),
    tag = "geography"
)]
pub async fn list_communes(
    State(state): State<AppState>,
    Query(query): Query<CommuneQuery>,
) -> ApiResult<Vec<CommuneResponse>> {
    communes(&state, query.district_id).await
}

#[utoipa::path(
    post,
    path = "/api/v1/communes",
    request_body = CommuneInput,
    responses(
        (status = 201, description = "Commune created", body = ApiResponse<CommuneResponse>),
        (status = 400, description = "Unknown district", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn create_commune(
    State(state): State<AppState>,
    Json(payload): Json<CommuneInput>,
) -> Created<CommuneResponse> {
    let model = state.services.geography.create_commune(payload).await?;
    Ok(created(CommuneResponse::from(model)))
}

#[utoipa::path(
    put,
    path = "/api/v1/communes/:id",
    params(("id" = Uuid, Path, description = "Commune ID")),
    request_body = CommuneInput,
    responses(
        (status = 200, description = "Commune updated", body = ApiResponse<CommuneResponse>),
        (status = 404, description = "Commune not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn update_commune(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommuneInput>,
) -> ApiResult<CommuneResponse> {
    let model = state.services.geography.update_commune(id, payload).await?;
    Ok(Json(ApiResponse::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/communes/:id",
    params(("id" = Uuid, Path, description = "Commune ID")),
    responses(
        (status = 204, description = "Commune deleted"),
        (status = 409, description = "Commune still has voting centers", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn delete_commune(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.geography.delete_commune(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/communes/:id/voting-centers",
    params(("id" = Uuid, Path, description = "Commune ID")),
    responses(
        (status = 200, description = "Voting centers of the commune", body = ApiResponse<Vec<VotingCenterResponse>>),
        (status = 404, description = "Commune not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn commune_voting_centers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<VotingCenterResponse>> {
    voting_centers(&state, Some(id)).await
}

// Voting centers

async fn voting_centers(
    state: &AppState,
    commune_id: Option<Uuid>,
) -> ApiResult<Vec<VotingCenterResponse>> {
    let centers = state
        .services
        .geography
        .list_voting_centers(commune_id)
        .await?;
    Ok(Json(ApiResponse::success(
        centers.into_iter().map(VotingCenterResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/voting-centers",
    params(VotingCenterQuery),
    responses((status = 200, description = "Voting centers ordered by name", body = ApiResponse<Vec<VotingCenterResponse>>)),
    tag = "geography"
)]
pub async fn list_voting_centers(
    State(state): State<AppState>,
    Query(query): Query<VotingCenterQuery>,
) -> ApiResult<Vec<VotingCenterResponse>> {
    voting_centers(&state, query.commune_id).await
}

#[utoipa::path(
    post,
    path = "/api/v1/voting-centers",
    request_body = VotingCenterInput,
    responses(
        (status = 201, description = "Voting center created", body = ApiResponse<VotingCenterResponse>),
        (status = 400, description = "Unknown commune", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn create_voting_center(
    State(state): State<AppState>,
    Json(payload): Json<VotingCenterInput>,
) -> Created<VotingCenterResponse> {
    let model = state
        .services
        .geography
        .create_voting_center(payload)
        .await?;
    Ok(created(VotingCenterResponse::from(model)))
}

#[utoipa::path(
    put,
    path = "/api/v1/voting-centers/:id",
    params(("id" = Uuid, Path, description = "Voting center ID")),
    request_body = VotingCenterInput,
    responses(
        (status = 200, description = "Voting center updated", body = ApiResponse<VotingCenterResponse>),
        (status = 404, description = "Voting center not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn update_voting_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VotingCenterInput>,
) -> ApiResult<VotingCenterResponse> {
    let model = state
        .services
        .geography
        .update_voting_center(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/voting-centers/:id",
    params(("id" = Uuid, Path, description = "Voting center ID")),
    responses(
        (status = 204, description = "Voting center deleted"),
        (status = 404, description = "Voting center not found", body = crate::errors::ErrorResponse)
    ),
    tag = "geography"
)]
pub async fn delete_voting_center(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.geography.delete_voting_center(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
