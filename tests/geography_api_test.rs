mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

async fn post(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.request_authenticated(Method::POST, uri, Some(body)).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let response = app.request_authenticated(Method::GET, uri, None).await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn delete(app: &TestApp, uri: &str) -> StatusCode {
    app.request_authenticated(Method::DELETE, uri, None)
        .await
        .status()
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn hierarchy_is_built_top_down() {
    let app = TestApp::new().await;

    let (status, region) = post(
        &app,
        "/api/v1/regions",
        json!({ "code": "ANT", "name": "Antananarivo", "capital": "Antananarivo" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let region_id = id_of(&region);

    let (status, district) = post(
        &app,
        "/api/v1/districts",
        json!({ "code": "ANT-001", "name": "Atsimondrano", "region_id": region_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let district_id = id_of(&district);

    let (status, commune) = post(
        &app,
        "/api/v1/communes",
        json!({ "code": "ANT-001-01", "name": "Itaosy", "district_id": district_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let commune_id = id_of(&commune);

    let (status, _) = post(
        &app,
        "/api/v1/voting-centers",
        json!({
            "code": "BV-0001",
            "name": "EPP Itaosy",
            "capacity": 600,
            "commune_id": commune_id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, districts) = get(&app, &format!("/api/v1/regions/{region_id}/districts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(districts["data"].as_array().unwrap().len(), 1);
    assert_eq!(districts["data"][0]["code"], "ANT-001");

    let (_, filtered) = get(&app, &format!("/api/v1/communes?district_id={district_id}")).await;
    assert_eq!(filtered["data"][0]["name"], "Itaosy");

    let (status, tree) = get(&app, "/api/v1/regions/tree").await;
    assert_eq!(status, StatusCode::OK);
    let root = &tree["data"][0];
    assert_eq!(root["code"], "ANT");
    assert_eq!(root["districts"][0]["communes"][0]["code"], "ANT-001-01");
    assert_eq!(
        root["districts"][0]["communes"][0]["voting_centers"][0]["code"],
        "BV-0001"
    );
}

#[tokio::test]
async fn duplicate_codes_conflict() {
    let app = TestApp::new().await;

    let (status, _) = post(
        &app,
        "/api/v1/regions",
        json!({ "code": "FIA", "name": "Fianarantsoa" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(
        &app,
        "/api/v1/regions",
        json!({ "code": "FIA", "name": "Haute Matsiatra" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn missing_parent_is_rejected() {
    let app = TestApp::new().await;

    let (status, _) = post(
        &app,
        "/api/v1/districts",
        json!({ "code": "X-1", "name": "Nowhere", "region_id": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, &format!("/api/v1/districts?region_id={}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn parents_with_children_cannot_be_deleted() {
    let app = TestApp::new().await;

    let (_, region) = post(
        &app,
        "/api/v1/regions",
        json!({ "code": "TOA", "name": "Toamasina" }),
    )
    .await;
    let region_id = id_of(&region);
    let (_, district) = post(
        &app,
        "/api/v1/districts",
        json!({ "code": "TOA-001", "name": "Brickaville", "region_id": region_id }),
    )
    .await;
    let district_id = id_of(&district);

    assert_eq!(
        delete(&app, &format!("/api/v1/regions/{region_id}")).await,
        StatusCode::CONFLICT
    );

    assert_eq!(
        delete(&app, &format!("/api/v1/districts/{district_id}")).await,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        delete(&app, &format!("/api/v1/regions/{region_id}")).await,
        StatusCode::NO_CONTENT
    );

    let (_, regions) = get(&app, "/api/v1/regions").await;
    assert!(regions["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn shipments_link_to_existing_places_only() {
    let app = TestApp::new().await;

    let (_, region) = post(
        &app,
        "/api/v1/regions",
        json!({ "code": "MAH", "name": "Mahajanga" }),
    )
    .await;
    let region_id = id_of(&region);

    let (_, shipment) = post(
        &app,
        "/api/v1/expeditions",
        json!({ "designation": "Kits Boeny" }),
    )
    .await;
    let shipment_id = id_of(&shipment);

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/expeditions/{shipment_id}"),
            Some(json!({ "designation": "Kits Boeny", "region_id": region_id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["geography"]["region"]["code"], "MAH");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/expeditions/{shipment_id}"),
            Some(json!({ "designation": "Kits Boeny", "district_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
