#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use tendersync::gateway::{Backend, Row, SqliteBackend};
use tendersync::server::{AppState, create_router};
use tendersync::types::CpvCode;

pub const PASSWORD: &str = "correct horse";

/// Router backed by an in-memory local backend, driven in-process.
pub struct TestApp {
    pub backend: Arc<SqliteBackend>,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let backend = Arc::new(SqliteBackend::open_in_memory().expect("open database"));
        backend.initialize().expect("create schema");
        backend
            .import_cpv_codes(&[
                cpv("45000000-7", "Construction work"),
                cpv("03000000-1", "Agricultural, farming, fishing, forestry and related products"),
                cpv("44000000-0", "Construction structures and materials"),
                cpv("72000000-5", "IT services: consulting, software development"),
            ])
            .expect("import cpv codes");

        let state = Arc::new(AppState::new(backend.clone()));
        let router = create_router(Arc::clone(&state));
        Self {
            backend,
            state,
            router,
        }
    }

    pub fn with_user(email: &str) -> Self {
        let app = Self::new();
        app.backend
            .create_user(email, Some(PASSWORD))
            .expect("create user");
        app
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(session) = session {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {session}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, path, session, None).await
    }

    pub async fn post(&self, path: &str, session: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, session, Some(body)).await
    }

    /// Signs in and returns the session id.
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/v1/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["session_id"]
            .as_str()
            .expect("session id")
            .to_string()
    }

    /// Inserts rows directly, bypassing the API.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("seed row is not an object: {other}"),
            })
            .collect();
        self.backend
            .insert(None, table, &rows)
            .await
            .expect("seed rows");
    }
}

pub fn cpv(code: &str, description: &str) -> CpvCode {
    CpvCode {
        code: code.to_string(),
        description: description.to_string(),
    }
}
