mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, TEST_EMAIL, TEST_NAME};
use serde_json::json;

#[tokio::test]
async fn versioned_routes_require_a_bearer_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/expeditions", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_MISSING");

    let response = app
        .request(Method::GET, "/api/v1/me", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/health/live", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn first_request_mirrors_the_identity() {
    let app = TestApp::new().await;

    let response = app.request_authenticated(Method::GET, "/api/v1/me", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = response_json(response).await;
    assert_eq!(me["data"]["email"], TEST_EMAIL);
    assert_eq!(me["data"]["name"], TEST_NAME);
    assert_eq!(me["data"]["role"], "agent");

    // a second request reuses the row
    let response = app.request_authenticated(Method::GET, "/api/v1/me", None).await;
    assert_eq!(response_json(response).await["data"]["id"], me["data"]["id"]);

    let response = app.request_authenticated(Method::GET, "/api/v1/users", None).await;
    assert_eq!(response_json(response).await["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn profile_fields_can_be_updated() {
    let app = TestApp::new().await;
    let response = app.request_authenticated(Method::GET, "/api/v1/me", None).await;
    let id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/users/{id}"),
            Some(json!({ "phone": "+261 34 00 000 00", "position": "Logisticien", "role": "manager" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["phone"], "+261 34 00 000 00");
    assert_eq!(body["data"]["role"], "manager");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/users/{id}"),
            Some(json!({ "phone": "0".repeat(21) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_cannot_delete_themselves() {
    let app = TestApp::new().await;
    let response = app.request_authenticated(Method::GET, "/api/v1/me", None).await;
    let id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/users/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owners_of_shipments_cannot_be_deleted() {
    let app = TestApp::new().await;

    let other = app.token_for("idp|other", "other@ceni.test", "Other Agent");
    let response = app.request(Method::GET, "/api/v1/me", None, Some(&other)).await;
    let other_id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    app.request(
        Method::POST,
        "/api/v1/expeditions",
        Some(json!({ "designation": "Urnes" })),
        Some(&other),
    )
    .await;

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/users/{other_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let idle = app.token_for("idp|idle", "idle@ceni.test", "Idle Agent");
    let response = app.request(Method::GET, "/api/v1/me", None, Some(&idle)).await;
    let idle_id = response_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/users/{idle_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn status_endpoint_reports_version() {
    let app = TestApp::new().await;
    let response = app.request_authenticated(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
