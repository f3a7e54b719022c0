use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::{CareStore, NewNotification};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub const DAILY_REPORT: &str = "DAILY_REPORT";
pub const MESSAGE: &str = "MESSAGE";
pub const VISIT_UPDATE: &str = "VISIT_UPDATE";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/notifications/{id}/read", patch(mark_read))
}

/// Records a side-effect notification. Failures are logged, never returned, so the
/// triggering request still succeeds.
pub(crate) async fn notify(store: &dyn CareStore, notification: NewNotification) {
    let user_id = notification.user_id;
    let kind = notification.kind.clone();
    if let Err(e) = store.insert_notification(notification).await {
        tracing::warn!("Failed to notify {user_id} ({kind}): {e}");
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationBody {
    user_id: Option<Uuid>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    resident_id: Option<Uuid>,
    visit_id: Option<Uuid>,
    report_id: Option<Uuid>,
}

async fn create_notification(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiJson(body): ApiJson<NotificationBody>,
) -> ApiResult<impl IntoResponse> {
    let (Some(user_id), Some(kind), Some(message)) = (
        body.user_id,
        body.kind.filter(|k| !k.trim().is_empty()),
        body.message.filter(|m| !m.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    if state.store.user_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    if let Some(id) = body.resident_id {
        if state.store.resident_by_id(id).await?.is_none() {
            return Err(ApiError::not_found("Resident not found"));
        }
    }
    if let Some(id) = body.visit_id {
        if state.store.visit_by_id(id).await?.is_none() {
            return Err(ApiError::not_found("Visit not found"));
        }
    }
    if let Some(id) = body.report_id {
        if state.store.report_by_id(id).await?.is_none() {
            return Err(ApiError::not_found("Report not found"));
        }
    }

    let notification = state
        .store
        .insert_notification(NewNotification {
            user_id,
            kind,
            message,
            resident_id: body.resident_id,
            visit_id: body.visit_id,
            report_id: body.report_id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "notification": notification })),
    ))
}

async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let notifications = state.store.notifications_of_user(caller.id).await?;
    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let notification = state
        .store
        .mark_notification_read(id, caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}
