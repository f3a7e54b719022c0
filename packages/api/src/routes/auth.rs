//! Registration, login and the caller's own profile.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::{NewUser, Role, StoreError, UserChanges};

use crate::auth::{password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{optional_json, ApiJson};
use crate::state::AppState;
use crate::validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route(
            "/api/user/profile",
            get(profile).put(update_profile).delete(delete_profile),
        )
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    name: Option<String>,
    email: Option<String>,
    current_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PasswordConfirmation {
    pub password: Option<String>,
}

/// Unknown or missing roles fall back to `family`.
fn requested_role(role: Option<&str>) -> Role {
    role.and_then(|r| r.parse().ok()).unwrap_or(Role::Family)
}

async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterBody>,
) -> ApiResult<impl IntoResponse> {
    let form = validate::registration(
        body.name.as_deref(),
        body.email.as_deref(),
        body.password.as_deref(),
    )?;
    let role = requested_role(body.role.as_deref());

    if state.store.user_by_email(&form.email).await?.is_some() {
        return Err(ApiError::bad_request("User with this email already exists"));
    }

    let password_hash = password::hash(form.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name: form.name,
            email: form.email,
            password_hash,
            role,
            created_by: None,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::bad_request("User with this email already exists"),
            other => other.into(),
        })?;
    tracing::info!("Registered {} as {}", user.email, user.role);

    let token = state.tokens.issue(&user);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created successfully! Welcome to CareLink.",
            "user": user,
            "token": token,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let (email, password) = validate::login(body.email.as_deref(), body.password.as_deref())?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let user = state.store.user_by_email(&email).await?.ok_or_else(invalid)?;
    if !password::verify(password, user.password_hash.clone()).await? {
        tracing::info!("Failed login for {email}");
        return Err(invalid());
    }

    let token = state.tokens.issue(&user);
    Ok(Json(json!({
        "success": true,
        "message": "Login successful! Welcome back to CareLink.",
        "user": user,
        "token": token,
    })))
}

async fn profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let user = state
        .store
        .user_by_id(caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<ProfileBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = state
        .store
        .user_by_id(caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut changes = UserChanges::default();
    if let Some(new_password) = body.new_password.filter(|p| !p.is_empty()) {
        let current = body
            .current_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::bad_request("Current password required"))?;
        if !password::verify(current, user.password_hash.clone()).await? {
            return Err(ApiError::bad_request("Current password is incorrect"));
        }
        validate::new_password(&new_password)?;
        changes.password_hash = Some(password::hash(new_password).await?);
    }

    if let Some(email) = body.email.as_deref().map(validate::normalize_email) {
        if !email.is_empty() && email != user.email {
            if !validate::is_email(&email) {
                return Err(ApiError::bad_request("Please enter a valid email"));
            }
            if state.store.user_by_email(&email).await?.is_some() {
                return Err(ApiError::bad_request("Email already in use"));
            }
            changes.email = Some(email);
        }
    }
    changes.name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let user = state
        .store
        .update_user(caller.id, changes)
        .await
        .map_err(email_in_use)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn delete_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let body: PasswordConfirmation = optional_json(&body)?;
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Password required for account deletion"))?;

    let user = state
        .store
        .user_by_id(caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !password::verify(password, user.password_hash).await? {
        return Err(ApiError::bad_request("Password is incorrect"));
    }

    state.store.delete_user(caller.id).await?;
    tracing::info!("User {} deleted their account", caller.email);
    Ok(Json(json!({
        "success": true,
        "message": "Account deleted successfully",
    })))
}

/// A racing write can still hit the unique index after the explicit check.
pub(crate) fn email_in_use(error: StoreError) -> ApiError {
    match error {
        StoreError::Conflict(_) => ApiError::bad_request("Email already in use"),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{TestApp, PASSWORD};
    use serde_json::json;
    use store::CareStore;

    #[tokio::test]
    async fn test_register_then_login() {
        let app = TestApp::new();
        let (status, body) = app
            .post(
                "/api/auth/register",
                None,
                json!({"name": "  Grace  ", "email": "Grace@Example.com", "password": "longenough"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "grace@example.com");
        assert_eq!(body["user"]["name"], "Grace");
        assert_eq!(body["user"]["role"], "family");
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["token"].is_string());

        let (status, body) = app
            .post(
                "/api/auth/login",
                None,
                json!({"email": "grace@example.com", "password": "longenough"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();
        let (status, body) = app.get("/api/user/profile", Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Grace");
    }

    #[tokio::test]
    async fn test_register_validation_and_duplicates() {
        let app = TestApp::new();
        let (status, body) = app
            .post(
                "/api/auth/register",
                None,
                json!({"name": "G", "email": "nope", "password": "short"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);

        let (user, _) = app.register(Role::Family).await;
        let (status, body) = app
            .post(
                "/api/auth/register",
                None,
                json!({"name": "Dup", "email": user.email.to_uppercase(), "password": "longenough"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User with this email already exists");
    }

    #[tokio::test]
    async fn test_register_role_fallback() {
        let app = TestApp::new();
        let (_, body) = app
            .post(
                "/api/auth/register",
                None,
                json!({"name": "Sam", "email": "sam@example.com", "password": "longenough", "role": "overlord"}),
            )
            .await;
        assert_eq!(body["user"]["role"], "family");

        let (_, body) = app
            .post(
                "/api/auth/register",
                None,
                json!({"name": "Sue", "email": "sue@example.com", "password": "longenough", "role": "facility_staff"}),
            )
            .await;
        assert_eq!(body["user"]["role"], "facility_staff");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let app = TestApp::new();
        let (user, _) = app.register(Role::Family).await;

        let (status, body) = app
            .post("/api/auth/login", None, json!({"email": user.email, "password": "wrong-password"}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");

        let (status, _) = app
            .post("/api/auth/login", None, json!({"email": "ghost@example.com", "password": PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.post("/api/auth/login", None, json!({"email": user.email})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "password");
    }

    #[tokio::test]
    async fn test_token_is_required_and_checked() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/user/profile", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access token required");

        let (status, body) = app.get("/api/user/profile", Some("not.a.token")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_profile_password_change() {
        let app = TestApp::new();
        let (user, token) = app.register(Role::Family).await;

        let (status, body) = app
            .put("/api/user/profile", Some(&token), json!({"newPassword": "brand-new-pass"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current password required");

        let (status, body) = app
            .put(
                "/api/user/profile",
                Some(&token),
                json!({"currentPassword": "wrong", "newPassword": "brand-new-pass"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current password is incorrect");

        let (status, _) = app
            .put(
                "/api/user/profile",
                Some(&token),
                json!({"currentPassword": PASSWORD, "newPassword": "brand-new-pass", "name": "Renamed"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .post("/api/auth/login", None, json!({"email": user.email, "password": "brand-new-pass"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        let stored = app.store.user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed");
    }

    #[tokio::test]
    async fn test_profile_email_in_use() {
        let app = TestApp::new();
        let (_, token) = app.register(Role::Family).await;
        let (other, _) = app.register(Role::Family).await;

        let (status, body) = app
            .put("/api/user/profile", Some(&token), json!({"email": other.email}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email already in use");
    }

    #[tokio::test]
    async fn test_delete_profile_requires_password() {
        let app = TestApp::new();
        let (user, token) = app.register(Role::Family).await;

        let (status, body) = app.delete("/api/user/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password required for account deletion");

        let (status, _) = app
            .delete("/api/user/profile", Some(&token), Some(json!({"password": "nope"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .delete("/api/user/profile", Some(&token), Some(json!({"password": PASSWORD})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.store.user_by_id(user.id).await.unwrap().is_none());
    }
}
