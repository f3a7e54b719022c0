//! Router harness for handler tests: the real router over a [`MemoryStore`].

use std::sync::{Arc, OnceLock};

use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use store::{CareStore, MemoryStore, NewUser, Role, User};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::password::hash_password;
use crate::config::Settings;
use crate::state::AppState;

pub const PASSWORD: &str = "password123";

/// Argon2 is slow in debug builds, so every test user shares one hash.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub state: AppState,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut settings = Settings::from_toml("").unwrap();
        settings.server.environment = "test".into();
        settings.uploads.dir = uploads.path().to_path_buf();

        let store = MemoryStore::new();
        let state = AppState::new(Arc::new(store.clone()), &settings);
        let router = crate::app(state.clone(), &settings);
        Self {
            router,
            store,
            state,
            uploads,
        }
    }

    /// Inserts a user with [`PASSWORD`] and returns it with a valid token.
    pub async fn register(&self, role: Role) -> (User, String) {
        let n = self.store.count_users().await.unwrap();
        let user = self
            .store
            .insert_user(NewUser {
                name: format!("{} {n}", role.as_str()),
                email: format!("{}{n}@example.com", role.as_str().replace('_', ".")),
                password_hash: password_hash(),
                role,
                created_by: None,
            })
            .await
            .unwrap();
        let token = self.state.tokens.issue(&user);
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, body).await
    }
}
