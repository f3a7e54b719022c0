//! Daily reports written by staff. Linked family members are notified of each new one.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::{NewNotification, NewReport, ReportChanges};
use uuid::Uuid;

use super::notifications::{notify, DAILY_REPORT};
use super::residents::visible_resident;
use crate::auth::{AdminOnly, AuthUser, Authorized, StaffOrAdmin};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", post(create_report))
        .route(
            "/api/reports/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/api/residents/{id}/reports", get(resident_reports))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportBody {
    resident_id: Option<Uuid>,
    vitals: Option<serde_json::Value>,
    mood: Option<String>,
    meals: Option<String>,
    activities: Option<String>,
    notes: Option<String>,
    images: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
struct UpdateReportBody {
    vitals: Option<serde_json::Value>,
    mood: Option<String>,
    meals: Option<String>,
    activities: Option<String>,
    notes: Option<String>,
    images: Option<Vec<Uuid>>,
}

async fn create_report(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<StaffOrAdmin>,
    ApiJson(body): ApiJson<CreateReportBody>,
) -> ApiResult<impl IntoResponse> {
    let resident_id = body
        .resident_id
        .ok_or_else(|| ApiError::bad_request("Missing required fields"))?;
    let resident = state
        .store
        .resident_by_id(resident_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Resident not found"))?;

    let report = state
        .store
        .insert_report(NewReport {
            resident_id,
            staff_id: Some(caller.id),
            vitals: body.vitals,
            mood: body.mood,
            meals: body.meals,
            activities: body.activities,
            notes: body.notes,
            images: body.images.unwrap_or_default(),
        })
        .await?;
    tracing::info!("{} filed report {} for {}", caller.email, report.id, resident.id);

    match state.store.family_of_resident(resident_id).await {
        Ok(family) => {
            for member in family {
                notify(
                    state.store.as_ref(),
                    NewNotification {
                        user_id: member.id,
                        kind: DAILY_REPORT.to_string(),
                        message: format!("A new daily report for {} is available", resident.name),
                        resident_id: Some(resident_id),
                        visit_id: None,
                        report_id: Some(report.id),
                    },
                )
                .await;
            }
        }
        Err(e) => tracing::warn!("Could not load family of {resident_id} to notify: {e}"),
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "report": report })),
    ))
}

async fn resident_reports(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    visible_resident(&state, &caller, id).await?;
    let reports = state.store.reports_of_resident(id).await?;
    Ok(Json(json!({ "success": true, "reports": reports })))
}

async fn get_report(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = state
        .store
        .report_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    Ok(Json(json!({ "success": true, "report": report })))
}

async fn update_report(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateReportBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = state
        .store
        .update_report(
            id,
            ReportChanges {
                vitals: body.vitals,
                mood: body.mood,
                meals: body.meals,
                activities: body.activities,
                notes: body.notes,
                images: body.images,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    Ok(Json(json!({ "success": true, "report": report })))
}

async fn delete_report(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<AdminOnly>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.store.delete_report(id).await? {
        return Err(ApiError::not_found("Report not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Report deleted" })))
}
