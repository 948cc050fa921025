#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use expedition_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    health::HealthState,
    logging::{setup_logger, LoggerConfig},
    services::users::UserService,
    AppState,
};

pub const TEST_SECRET: &str = "a9F!k2Lq8Zr4Xw1Tb6Ny3Hc7Vm0Pd5Gs";
pub const TEST_EMAIL: &str = "agent@ceni.test";
pub const TEST_NAME: &str = "Rakoto Agent";

/// Application backed by a throwaway SQLite file, driven through `oneshot`.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth_service: Arc<AuthService>,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("expeditions.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let logger = setup_logger(LoggerConfig::silent());
        let users = Arc::new(UserService::new(db_arc.clone(), logger.clone()));
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg), users.clone()));
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), users, logger);

        let state = AppState {
            db: db_arc.clone(),
            config: cfg,
            event_sender,
            services,
        };

        let router = expedition_api::app_router(
            state.clone(),
            auth_service.clone(),
            Arc::new(HealthState::new(db_arc)),
        );

        let token = auth_service
            .generate_token("idp|agent", TEST_EMAIL, TEST_NAME, chrono::Duration::hours(1))
            .expect("sign test token");

        Self {
            router,
            state,
            auth_service,
            token,
            _event_task: event_task,
            _dir: dir,
        }
    }

    /// Bearer token of the default test user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Signs a token for another identity.
    pub fn token_for(&self, subject: &str, email: &str, name: &str) -> String {
        self.auth_service
            .generate_token(subject, email, name, chrono::Duration::hours(1))
            .expect("sign test token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Authenticated request with a raw JSON-typed body, for malformed payloads.
    pub async fn request_raw(&self, method: Method, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token()))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
