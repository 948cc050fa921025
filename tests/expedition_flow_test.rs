//! End-to-end tests for the shipment lifecycle over HTTP.
//!
//! - creation as a numbered draft
//! - manual status change with one movement
//! - automatic expiry to `lost` on the next listing
//! - line item reconciliation, manifest export and deletion

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use common::{response_json, response_text, TestApp, TEST_EMAIL};
use serde_json::{json, Value};

async fn create(app: &TestApp, designation: &str) -> Value {
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/expeditions",
            Some(json!({ "designation": designation })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

async fn update(app: &TestApp, id: &str, form: Value) -> (StatusCode, Value) {
    let response = app
        .request_authenticated(Method::PUT, &format!("/api/v1/expeditions/{id}"), Some(form))
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn list(app: &TestApp) -> Value {
    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["data"].clone()
}

fn is_number(number: &str) -> bool {
    let parts: Vec<&str> = number.split('-').collect();
    parts.len() == 3
        && parts[0] == "EXP"
        && parts[1] == Utc::now().format("%Y").to_string()
        && parts[2].len() == 6
        && parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

#[tokio::test]
async fn shipment_goes_draft_to_in_transit_to_lost() {
    let app = TestApp::new().await;

    let created = create(&app, "Materiel A").await;
    assert_eq!(created["status"], "draft");
    assert!(is_number(created["number"].as_str().unwrap()));
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = update(
        &app,
        &id,
        json!({ "designation": "Materiel A", "status": "in_transit", "location": "Ivato" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_transit");

    let page = list(&app).await;
    assert_eq!(page["total"], 1);
    let item = &page["items"][0];
    assert_eq!(item["status"], "in_transit");
    let movements = item["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["status_before"], "draft");
    assert_eq!(movements[0]["status_after"], "in_transit");
    assert_eq!(movements[0]["movement_type"], "status_change");
    assert_eq!(movements[0]["location"], "Ivato");
    assert_eq!(movements[0]["user"]["email"], TEST_EMAIL);

    // planned arrival in the past, status unchanged
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    let (status, body) = update(
        &app,
        &id,
        json!({ "designation": "Materiel A", "arrival_date": yesterday }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_transit");
    assert_eq!(body["data"]["movements"].as_array().unwrap().len(), 1);

    let page = list(&app).await;
    let item = &page["items"][0];
    assert_eq!(item["status"], "lost");
    let movements = item["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 2);
    let automatic = movements
        .iter()
        .find(|m| m["status_after"] == "lost")
        .expect("automatic movement");
    assert_eq!(automatic["status_before"], "in_transit");
    assert!(automatic["notes"]
        .as_str()
        .unwrap()
        .starts_with("Automatic change"));

    // a second reader finds nothing left to expire
    let page = list(&app).await;
    assert_eq!(page["items"][0]["movements"].as_array().unwrap().len(), 2);

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/expeditions/{id}/movements"),
            None,
        )
        .await;
    assert_eq!(response_json(response).await["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn numbers_are_unique_across_shipments() {
    let app = TestApp::new().await;

    let mut numbers = std::collections::HashSet::new();
    for i in 0..12 {
        let created = create(&app, &format!("Lot {i}")).await;
        let number = created["number"].as_str().unwrap().to_string();
        assert!(is_number(&number), "bad number {number}");
        assert!(numbers.insert(number));
    }
}

#[tokio::test]
async fn edits_reconcile_line_items() {
    let app = TestApp::new().await;
    let id = create(&app, "Urnes Analamanga").await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = update(
        &app,
        &id,
        json!({
            "designation": "Urnes Analamanga",
            "materiels": [
                { "designation": "Urne", "quantity": 40 },
                { "designation": "Scellé", "quantity": 400 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lines = body["data"]["materiels"].as_array().unwrap().clone();
    assert_eq!(lines.len(), 2);
    let urne = lines.iter().find(|l| l["designation"] == "Urne").unwrap();
    let urne_id = urne["id"].as_str().unwrap().to_string();

    // keep Urne with a new quantity, drop Scellé, add Isoloir
    let (status, body) = update(
        &app,
        &id,
        json!({
            "designation": "Urnes Analamanga",
            "materiels": [
                { "id": urne_id, "designation": "Urne", "quantity": 38, "quantity_received": 38 },
                { "designation": "Isoloir", "quantity": 10, "status": "damaged" }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lines = body["data"]["materiels"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let urne = lines.iter().find(|l| l["id"] == urne_id.as_str()).unwrap();
    assert_eq!(urne["quantity"], 38);
    assert_eq!(urne["quantity_received"], 38);
    let isoloir = lines.iter().find(|l| l["designation"] == "Isoloir").unwrap();
    assert_eq!(isoloir["status"], "damaged");
    assert!(lines.iter().all(|l| l["designation"] != "Scellé"));

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/materiels/{urne_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = response_json(response).await;
    assert_eq!(detail["data"]["expedition"]["id"], id.as_str());

    // a negative quantity rejects the whole edit
    let (status, _) = update(
        &app,
        &id,
        json!({
            "designation": "Urnes Analamanga",
            "materiels": [{ "designation": "Urne", "quantity": -1 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/expeditions/{id}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["materiels"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn line_ids_from_another_shipment_are_not_reparented() {
    let app = TestApp::new().await;
    let first = create(&app, "Lot 1").await["id"].as_str().unwrap().to_string();
    let second = create(&app, "Lot 2").await["id"].as_str().unwrap().to_string();

    let (_, body) = update(
        &app,
        &first,
        json!({ "designation": "Lot 1", "materiels": [{ "designation": "Urne", "quantity": 5 }] }),
    )
    .await;
    let foreign_id = body["data"]["materiels"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = update(
        &app,
        &second,
        json!({
            "designation": "Lot 2",
            "materiels": [{ "id": foreign_id, "designation": "Urne", "quantity": 5 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["materiels"][0]["id"], foreign_id.as_str());

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/expeditions/{first}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["materiels"][0]["id"], foreign_id.as_str());
}

#[tokio::test]
async fn delete_removes_only_the_target_shipment() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/regions",
            Some(json!({ "code": "VAK", "name": "Vakinankaratra" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let region_id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/materiel-types",
            Some(json!({ "code": "URN", "name": "Urne", "category": "Matériel" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let type_id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let doomed = create(&app, "A supprimer").await["id"].as_str().unwrap().to_string();
    let kept = create(&app, "A garder").await["id"].as_str().unwrap().to_string();

    let (status, _) = update(
        &app,
        &kept,
        json!({
            "designation": "A garder",
            "region_id": region_id,
            "materiels": [
                { "designation": "Urne", "quantity": 2, "materiel_type_id": type_id },
                { "designation": "Scellé", "quantity": 20 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    update(
        &app,
        &doomed,
        json!({
            "designation": "A supprimer",
            "status": "in_transit",
            "region_id": region_id,
            "materiels": [{ "designation": "Urne", "quantity": 1, "materiel_type_id": type_id }]
        }),
    )
    .await;

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/expeditions/{doomed}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/expeditions/{doomed}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let page = list(&app).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], kept.as_str());

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/expeditions/{kept}"), None)
        .await;
    let body = response_json(response).await;
    let lines = body["data"]["materiels"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let urne = lines.iter().find(|l| l["designation"] == "Urne").unwrap();
    assert_eq!(urne["materiel_type"]["id"], type_id.as_str());
    assert_eq!(body["data"]["region_id"], region_id.as_str());

    let response = app
        .request_authenticated(Method::GET, "/api/v1/regions", None)
        .await;
    let regions = response_json(response).await;
    assert_eq!(regions["data"].as_array().unwrap().len(), 1);
    assert_eq!(regions["data"][0]["id"], region_id.as_str());

    let response = app
        .request_authenticated(Method::GET, "/api/v1/materiel-types", None)
        .await;
    let types = response_json(response).await;
    assert_eq!(types["data"].as_array().unwrap().len(), 1);
    assert_eq!(types["data"][0]["id"], type_id.as_str());

    let response = app
        .request_authenticated(Method::GET, "/api/v1/movements", None)
        .await;
    let journal = response_json(response).await;
    assert!(journal["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn resubmitting_the_current_status_logs_nothing() {
    let app = TestApp::new().await;
    let id = create(&app, "Isoloirs Amoron'i Mania").await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let form = json!({ "designation": "Isoloirs Amoron'i Mania", "status": "in_transit" });
    let (status, body) = update(&app, &id, form.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["movements"].as_array().unwrap().len(), 1);

    let (status, body) = update(&app, &id, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_transit");
    assert_eq!(body["data"]["movements"].as_array().unwrap().len(), 1);

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/expeditions/{id}/movements"),
            None,
        )
        .await;
    assert_eq!(response_json(response).await["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_filters_by_status_and_search() {
    let app = TestApp::new().await;
    let moving = create(&app, "Bulletins Vakinankaratra").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    create(&app, "Isoloirs Itasy").await;
    update(
        &app,
        &moving,
        json!({ "designation": "Bulletins Vakinankaratra", "status": "in_transit", "destination": "Antsirabe" }),
    )
    .await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions?status=in_transit", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], moving.as_str());

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions?search=antsirabe", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions?limit=1&page=2", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/expeditions?page=18446744073709551615",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_are_zero_filled_and_scoped() {
    let app = TestApp::new().await;
    create(&app, "Lot").await;

    let other = app.token_for("idp|other", "other@ceni.test", "Other Agent");
    let response = app
        .request(
            Method::POST,
            "/api/v1/expeditions",
            Some(json!({ "designation": "Autre lot" })),
            Some(&other),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions/stats", None)
        .await;
    let mine = response_json(response).await;
    assert_eq!(mine["data"]["total"], 1);
    assert_eq!(mine["data"]["by_status"].as_array().unwrap().len(), 8);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions/stats?scope=all", None)
        .await;
    assert_eq!(response_json(response).await["data"]["total"], 2);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/expeditions/stats?scope=team", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manifest_exports_as_json_and_csv() {
    let app = TestApp::new().await;
    let created = create(&app, "Kits Boeny").await;
    let id = created["id"].as_str().unwrap();
    let number = created["number"].as_str().unwrap();
    update(
        &app,
        id,
        json!({
            "designation": "Kits Boeny",
            "origin": "Antananarivo",
            "destination": "Mahajanga",
            "materiels": [
                { "designation": "Urne", "quantity": 3 },
                { "designation": "Bulletin", "quantity": 500, "category": "Document" }
            ]
        }),
    )
    .await;

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/expeditions/{id}/manifest"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let manifest = response_json(response).await;
    assert_eq!(manifest["data"]["number"], number);
    assert_eq!(manifest["data"]["total_quantity"], 503);
    assert_eq!(manifest["data"]["lines"][0]["line"], 1);

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/expeditions/{id}/manifest?format=csv"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(&format!("expedition-{number}.csv")));
    let csv = response_text(response).await;
    assert!(csv.contains("Bulletin"));

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/expeditions/{id}/manifest?format=pdf"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_counts_shipments_and_lines() {
    let app = TestApp::new().await;
    let id = create(&app, "Lot dashboard").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    update(
        &app,
        &id,
        json!({
            "designation": "Lot dashboard",
            "status": "received",
            "departure_date": Utc::now().to_rfc3339(),
            "materiels": [{ "designation": "Urne", "quantity": 2 }]
        }),
    )
    .await;
    create(&app, "Brouillon").await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/dashboard", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["totals"]["expeditions"], 2);
    assert_eq!(body["data"]["totals"]["materiels"], 1);
    assert_eq!(body["data"]["totals"]["received"], 1);
    assert_eq!(body["data"]["recent"][0]["id"], id.as_str());
}
