//! Account administration.
//!
//! Who may act on whom:
//!
//! | Caller | List | Create | Edit / delete |
//! |--------|------|--------|---------------|
//! | `family` | self | - | self |
//! | `facility_staff` | family users | family users | self, family users |
//! | `system_admin` | everyone | anyone | anyone |

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::{NewUser, Role, StoreError, User, UserChanges};
use uuid::Uuid;

use super::auth::{email_in_use, PasswordConfirmation};
use crate::auth::{password, AuthUser, Authorized, StaffOrAdmin};
use crate::error::{ApiError, ApiResult};
use crate::extract::{optional_json, ApiJson, ApiPath};
use crate::state::AppState;
use crate::validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserBody {
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
    new_password: Option<String>,
    current_password: Option<String>,
}

/// Self, an administrator, or staff acting on a family account.
fn may_manage(caller: &AuthUser, target_id: Uuid, target: Option<&User>) -> bool {
    target_id == caller.id
        || caller.is_admin()
        || (caller.role == Role::FacilityStaff && target.is_some_and(|t| t.role == Role::Family))
}

async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let users = match caller.role {
        Role::SystemAdmin => state.store.list_users(None).await?,
        Role::FacilityStaff => state.store.list_users(Some(Role::Family)).await?,
        Role::Family => state.store.user_by_id(caller.id).await?.into_iter().collect(),
    };
    Ok(Json(json!({ "success": true, "users": users })))
}

async fn create_user(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<StaffOrAdmin>,
    ApiJson(body): ApiJson<CreateUserBody>,
) -> ApiResult<impl IntoResponse> {

    let role = match body.role.as_deref() {
        None => Role::Family,
        Some(role) => role
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid role"))?,
    };
    if !caller.is_admin() && role != Role::Family {
        return Err(ApiError::forbidden(
            "Staff can only create family member accounts",
        ));
    }

    let form = validate::registration(
        body.name.as_deref(),
        body.email.as_deref(),
        body.password.as_deref(),
    )?;
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
            created_by: Some(caller.id),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::bad_request("User with this email already exists"),
            other => other.into(),
        })?;
    tracing::info!("{} created account {} ({})", caller.email, user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user })),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateUserBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let target = state.store.user_by_id(id).await?;
    if !may_manage(&caller, id, target.as_ref()) {
        return Err(ApiError::forbidden(
            "You do not have permission to edit this user",
        ));
    }
    let target = target.ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut changes = UserChanges::default();
    if let Some(role) = body.role.as_deref().filter(|r| !r.is_empty()) {
        if !caller.is_admin() {
            return Err(ApiError::forbidden(
                "Only system admins can change user roles",
            ));
        }
        changes.role = Some(
            role.parse()
                .map_err(|_| ApiError::bad_request("Invalid role"))?,
        );
    }

    if let Some(new_password) = body.new_password.filter(|p| !p.is_empty()) {
        if id == caller.id {
            let current = body
                .current_password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ApiError::bad_request("Current password required to change password")
                })?;
            if !password::verify(current, target.password_hash.clone()).await? {
                return Err(ApiError::bad_request("Current password is incorrect"));
            }
        } else if !caller.is_admin() {
            return Err(ApiError::forbidden(
                "Only system admins can change other users' passwords",
            ));
        }
        validate::new_password(&new_password)?;
        changes.password_hash = Some(password::hash(new_password).await?);
    }

    if let Some(email) = body.email.as_deref().map(validate::normalize_email) {
        if !email.is_empty() && email != target.email {
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
        .update_user(id, changes)
        .await
        .map_err(email_in_use)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let target = state.store.user_by_id(id).await?;
    if !may_manage(&caller, id, target.as_ref()) {
        return Err(ApiError::forbidden(
            "You do not have permission to delete this user",
        ));
    }
    let target = target.ok_or_else(|| ApiError::not_found("User not found"))?;

    if id == caller.id {
        let body: PasswordConfirmation = optional_json(&body)?;
        let password = body
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::bad_request("Password required to delete your own account"))?;
        if !password::verify(password, target.password_hash.clone()).await? {
            return Err(ApiError::bad_request("Password is incorrect"));
        }
    }

    state.store.delete_user(id).await?;
    tracing::info!("{} deleted account {}", caller.email, target.email);
    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{TestApp, PASSWORD};
    use store::CareStore;

    #[tokio::test]
    async fn test_listing_depends_on_role() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (_, staff_token) = app.register(Role::FacilityStaff).await;
        let (_, admin_token) = app.register(Role::SystemAdmin).await;

        let (_, body) = app.get("/api/users", Some(&admin_token)).await;
        assert_eq!(body["users"].as_array().unwrap().len(), 3);

        let (_, body) = app.get("/api/users", Some(&staff_token)).await;
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["role"], "family");

        let (_, body) = app.get("/api/users", Some(&family_token)).await;
        assert_eq!(body["users"][0]["id"], family.id.to_string());
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_staff_creates_family_accounts_only() {
        let app = TestApp::new();
        let (staff, staff_token) = app.register(Role::FacilityStaff).await;
        let (_, family_token) = app.register(Role::Family).await;

        let (status, body) = app
            .post(
                "/api/users",
                Some(&staff_token),
                json!({"name": "Nora", "email": "nora@example.com", "password": "longenough"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["createdBy"], staff.id.to_string());

        let (status, _) = app
            .post(
                "/api/users",
                Some(&staff_token),
                json!({"name": "Boss", "email": "boss@example.com", "password": "longenough", "role": "system_admin"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .post(
                "/api/users",
                Some(&family_token),
                json!({"name": "Kid", "email": "kid@example.com", "password": "longenough"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient permissions");
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (staff, staff_token) = app.register(Role::FacilityStaff).await;
        let (_, admin_token) = app.register(Role::SystemAdmin).await;

        // staff may edit family members but not change roles
        let uri = format!("/api/users/{}", family.id);
        let (status, body) = app.put(&uri, Some(&staff_token), json!({"name": "Renamed"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Renamed");

        let (status, body) = app
            .put(&uri, Some(&staff_token), json!({"role": "system_admin"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Only system admins can change user roles");

        let (status, _) = app
            .put(&uri, Some(&staff_token), json!({"newPassword": "another-pass"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // family may not edit staff
        let (status, _) = app
            .put(&format!("/api/users/{}", staff.id), Some(&family_token), json!({"name": "X"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // admin may promote
        let (status, body) = app
            .put(&uri, Some(&admin_token), json!({"role": "facility_staff"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "facility_staff");

        let (status, _) = app
            .put(&format!("/api/users/{}", Uuid::new_v4()), Some(&admin_token), json!({}))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_self_password_change_needs_current() {
        let app = TestApp::new();
        let (family, token) = app.register(Role::Family).await;
        let uri = format!("/api/users/{}", family.id);

        let (status, _) = app.put(&uri, Some(&token), json!({"newPassword": "another-pass"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .put(
                &uri,
                Some(&token),
                json!({"newPassword": "another-pass", "currentPassword": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (other_staff, _) = app.register(Role::FacilityStaff).await;
        let (_, staff_token) = app.register(Role::FacilityStaff).await;

        let (status, body) = app
            .delete(&format!("/api/users/{}", other_staff.id), Some(&staff_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You do not have permission to delete this user");

        let own = format!("/api/users/{}", family.id);
        let (status, _) = app.delete(&own, Some(&family_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.delete(&own, Some(&staff_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.store.user_by_id(family.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request() {
        let app = TestApp::new();
        let (_, token) = app.register(Role::SystemAdmin).await;
        let (status, body) = app.put("/api/users/not-a-uuid", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
