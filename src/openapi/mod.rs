use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Expedition API",
        version = "1.0.0",
        description = r#"
# Electoral Materiel Expedition API

Tracks shipments of electoral materiel (ballot boxes, kits, forms) from the
central depot down to voting centers.

## Features

- **Expeditions**: numbered shipments with a draft to received/damaged/lost lifecycle
- **Line items**: materiel lines reconciled against each edit of their shipment
- **Movements**: append-only log of every status change, manual or automatic
- **Geography**: region, district, commune and voting-center hierarchy
- **Catalog**: materiel types
- **Manifests**: printable shipment documents as JSON, CSV or TSV

## Authentication

Every endpoint except `/health` requires a bearer token issued by the identity
provider:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Versioned endpoints answer errors with:

```json
{
  "error": "Not Found",
  "message": "Not found: Expedition 3f1c... not found",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Form actions under `/api` answer `{ "ok": false, "error": "..." }` instead.

## Pagination

`GET /api/v1/expeditions` accepts `page` (default 1) and `limit`
(default 20, capped by configuration).
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "expeditions", description = "Shipments, line items and manifests"),
        (name = "movements", description = "Movement journal"),
        (name = "dashboard", description = "Overview counters"),
        (name = "geography", description = "Administrative hierarchy"),
        (name = "materiel-types", description = "Materiel catalog"),
        (name = "users", description = "Mirrored user accounts"),
        (name = "actions", description = "Form actions used by the web front end")
    ),
    paths(
        // Expeditions
        crate::handlers::expeditions::list_expeditions,
        crate::handlers::expeditions::create_expedition,
        crate::handlers::expeditions::expedition_stats,
        crate::handlers::expeditions::get_expedition,
        crate::handlers::expeditions::update_expedition,
        crate::handlers::expeditions::delete_expedition,
        crate::handlers::expeditions::expedition_movements,
        crate::handlers::expeditions::expedition_manifest,
        crate::handlers::expeditions::get_materiel,

        crate::handlers::movements::list_movements,
        crate::handlers::dashboard::get_dashboard,

        // Geography
        crate::handlers::geography::list_regions,
        crate::handlers::geography::region_tree,
        crate::handlers::geography::create_region,
        crate::handlers::geography::update_region,
        crate::handlers::geography::delete_region,
        crate::handlers::geography::region_districts,
        crate::handlers::geography::list_districts,
        crate::handlers::geography::create_district,
        crate::handlers::geography::update_district,
        crate::handlers::geography::delete_district,
        crate::handlers::geography::district_communes,
        crate::handlers::geography::list_communes,
        crate::handlers::geography::create_commune,
        crate::handlers::geography::update_commune,
        crate::handlers::geography::delete_commune,
        crate::handlers::geography::commune_voting_centers,
        crate::handlers::geography::list_voting_centers,
        crate::handlers::geography::create_voting_center,
        crate::handlers::geography::update_voting_center,
        crate::handlers::geography::delete_voting_center,

        // Catalog
        crate::handlers::materiel_types::list_materiel_types,
        crate::handlers::materiel_types::create_materiel_type,
        crate::handlers::materiel_types::update_materiel_type,
        crate::handlers::materiel_types::delete_materiel_type,

        // Users
        crate::handlers::users::get_me,
        crate::handlers::users::list_users,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,

        // Actions
        crate::handlers::actions::create_materiel,
        crate::handlers::actions::update_materiel,
        crate::handlers::actions::delete_materiel,
        crate::handlers::actions::delete_materiel_pdf,
    ),
    components(
        schemas(
            crate::models::ExpeditionStatus,
            crate::models::MaterielStatus,
            crate::models::MovementType,
            crate::models::UserRole,

            crate::services::expeditions::ExpeditionForm,
            crate::services::expeditions::MaterielLineInput,
            crate::services::expeditions::ExpeditionStats,
            crate::services::expeditions::StatusCount,
            crate::services::manifest::Manifest,
            crate::services::manifest::ManifestParty,
            crate::services::manifest::ManifestLine,
            crate::services::geography::RegionInput,
            crate::services::geography::DistrictInput,
            crate::services::geography::CommuneInput,
            crate::services::geography::VotingCenterInput,
            crate::services::materiel_types::MaterielTypeInput,
            crate::services::users::UpdateUserInput,
            crate::services::dashboard::DashboardTotals,

            crate::handlers::expeditions::ExpeditionResponse,
            crate::handlers::expeditions::MaterielResponse,
            crate::handlers::expeditions::MaterielDetailResponse,
            crate::handlers::expeditions::MovementResponse,
            crate::handlers::expeditions::CreateExpeditionRequest,
            crate::handlers::movements::JournalEntryResponse,
            crate::handlers::dashboard::DashboardResponse,
            crate::handlers::geography::RegionResponse,
            crate::handlers::geography::DistrictResponse,
            crate::handlers::geography::CommuneResponse,
            crate::handlers::geography::VotingCenterResponse,
            crate::handlers::geography::RegionTreeNode,
            crate::handlers::materiel_types::MaterielTypeResponse,
            crate::handlers::users::UserResponse,
            crate::handlers::actions::CreateMaterielRequest,

            crate::errors::ErrorResponse,
            crate::errors::ActionResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
