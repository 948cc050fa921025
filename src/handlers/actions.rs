//! Form-action endpoints used by the web front end.
//!
//! These reply with `{ ok, error? }` instead of the API envelope. Missing or
//! malformed input is a 400, any other failure a 500.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    routing::{delete, patch, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::common::parse_id;
use crate::{
    auth::AuthUser,
    errors::{ActionError, ActionResponse},
    services::expeditions::ExpeditionForm,
    AppState,
};

type ActionResult = Result<Json<ActionResponse>, ActionError>;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMaterielRequest {
    /// Owner email, defaults to the signed-in user
    pub email: Option<String>,
    #[serde(alias = "design")]
    pub designation: Option<String>,
}

pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/create-materiel", post(create_materiel))
        .route(
            "/materiel/:id",
            patch(update_materiel).delete(delete_materiel),
        )
        .route("/materielPdf/:id", delete(delete_materiel_pdf))
}

/// Unreadable bodies get the same `{ ok: false }` reply as other bad input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ActionError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ActionError::BadRequest(rejection.body_text()))
}

fn required_id(raw: &str) -> Result<uuid::Uuid, ActionError> {
    if raw.trim().is_empty() {
        return Err(ActionError::BadRequest("Missing id".into()));
    }
    parse_id(raw).map_err(|e| ActionError::BadRequest(e.response_message()))
}

#[utoipa::path(
    post,
    path = "/api/create-materiel",
    request_body = CreateMaterielRequest,
    responses(
        (status = 200, description = "Empty draft shipment created", body = ActionResponse),
        (status = 400, description = "Missing designation or unreadable body", body = ActionResponse),
        (status = 500, description = "Creation failed", body = ActionResponse)
    ),
    tag = "actions"
)]
pub async fn create_materiel(
    State(state): State<AppState>,
    auth_user: AuthUser,
    payload: Result<Json<CreateMaterielRequest>, JsonRejection>,
) -> ActionResult {
    let payload = json_body(payload)?;
    let designation = payload
        .designation
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ActionError::BadRequest("Missing designation".into()))?;

    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(&auth_user.email);

    state
        .services
        .expeditions
        .create_expedition(email, designation)
        .await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    patch,
    path = "/api/materiel/:id",
    params(("id" = String, Path, description = "Expedition ID")),
    request_body = ExpeditionForm,
    responses(
        (status = 200, description = "Shipment updated", body = ActionResponse),
        (status = 400, description = "Missing or invalid id, or unreadable body", body = ActionResponse),
        (status = 500, description = "Update failed", body = ActionResponse)
    ),
    tag = "actions"
)]
pub async fn update_materiel(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    form: Result<Json<ExpeditionForm>, JsonRejection>,
) -> ActionResult {
    let id = required_id(&id)?;
    let form = json_body(form)?;
    state
        .services
        .expeditions
        .update_expedition(id, form, Some(auth_user.user_id))
        .await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/materiel/:id",
    params(("id" = String, Path, description = "Expedition ID")),
    responses(
        (status = 200, description = "Shipment deleted", body = ActionResponse),
        (status = 400, description = "Missing or invalid id", body = ActionResponse),
        (status = 500, description = "Deletion failed", body = ActionResponse)
    ),
    tag = "actions"
)]
pub async fn delete_materiel(State(state): State<AppState>, Path(id): Path<String>) -> ActionResult {
    let id = required_id(&id)?;
    state.services.expeditions.delete_expedition(id).await?;
    Ok(Json(ActionResponse::ok()))
}

/// Same deletion, reached from the manifest view.
#[utoipa::path(
    delete,
    path = "/api/materielPdf/:id",
    params(("id" = String, Path, description = "Expedition ID")),
    responses(
        (status = 200, description = "Shipment deleted", body = ActionResponse),
        (status = 400, description = "Missing or invalid id", body = ActionResponse),
        (status = 500, description = "Deletion failed", body = ActionResponse)
    ),
    tag = "actions"
)]
pub async fn delete_materiel_pdf(state: State<AppState>, id: Path<String>) -> ActionResult {
    delete_materiel(state, id).await
}
