//! Visit requests and their lifecycle.
//!
//! A visit starts `REQUESTED`. Staff and administrators move it through
//! `SCHEDULED`, `DECLINED`, `COMPLETED` or `CANCELLED`; the family member who asked
//! for it may only cancel it or adjust the date and notes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use store::{NewNotification, NewVisit, Visit, VisitChanges, VisitStatus};
use uuid::Uuid;

use super::notifications::{notify, VISIT_UPDATE};
use super::residents::visible_resident;
use crate::auth::AuthUser;
use crate::dates;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/visits", post(request_visit))
        .route("/api/visits/{id}", put(update_visit).delete(delete_visit))
        .route("/api/residents/{id}/visits", get(resident_visits))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestVisitBody {
    resident_id: Option<Uuid>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    visit_date: Option<DateTime<Utc>>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateVisitBody {
    status: Option<String>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    visit_date: Option<DateTime<Utc>>,
    notes: Option<String>,
}

/// Loads a visit the caller may change: staff, administrators and the requester.
async fn manageable_visit(state: &AppState, caller: &AuthUser, id: Uuid) -> ApiResult<Visit> {
    let visit = state
        .store
        .visit_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit not found"))?;
    if caller.role.is_elevated() || visit.requested_by_id == caller.id {
        Ok(visit)
    } else {
        Err(ApiError::access_denied())
    }
}

async fn request_visit(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<RequestVisitBody>,
) -> ApiResult<impl IntoResponse> {
    let (Some(resident_id), Some(visit_date)) = (body.resident_id, body.visit_date) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    visible_resident(&state, &caller, resident_id).await?;

    let visit = state
        .store
        .insert_visit(NewVisit {
            resident_id,
            requested_by_id: caller.id,
            visit_date,
            notes: body.notes,
        })
        .await?;
    tracing::info!("{} requested visit {} for {visit_date}", caller.email, visit.visit.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "visit": visit })),
    ))
}

async fn resident_visits(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    visible_resident(&state, &caller, id).await?;
    let visits = state.store.visits_of_resident(id).await?;
    Ok(Json(json!({ "success": true, "visits": visits })))
}

async fn update_visit(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateVisitBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let current = manageable_visit(&state, &caller, id).await?;
    let status: Option<VisitStatus> = body
        .status
        .as_deref()
        .map(|s| s.parse().map_err(|_| ApiError::bad_request("Invalid status")))
        .transpose()?;

    if !caller.role.is_elevated() && status.is_some_and(|s| s != VisitStatus::Cancelled) {
        return Err(ApiError::forbidden("You can only cancel your own visit request"));
    }

    let changes = VisitChanges {
        status,
        visit_date: body.visit_date,
        notes: body.notes,
        scheduled_by_id: status
            .filter(|s| *s != VisitStatus::Requested)
            .map(|_| caller.id),
    };
    let visit = state
        .store
        .update_visit(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit not found"))?;

    let changed = status.filter(|s| *s != current.status);
    if let Some(status) = changed {
        tracing::info!("{} moved visit {id} to {status}", caller.email);
        if caller.id != current.requested_by_id {
            let resident = visit
                .resident
                .as_ref()
                .map_or("your resident", |r| r.name.as_str());
            notify(
                state.store.as_ref(),
                NewNotification {
                    user_id: current.requested_by_id,
                    kind: VISIT_UPDATE.to_string(),
                    message: format!(
                        "Your visit with {resident} on {} is now {status}",
                        visit.visit.visit_date.format("%Y-%m-%d %H:%M")
                    ),
                    resident_id: Some(current.resident_id),
                    visit_id: Some(id),
                    report_id: None,
                },
            )
            .await;
        }
    }

    Ok(Json(json!({ "success": true, "visit": visit })))
}

async fn delete_visit(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    manageable_visit(&state, &caller, id).await?;
    if !state.store.delete_visit(id).await? {
        return Err(ApiError::not_found("Visit not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Visit cancelled" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use store::{CareStore, NewResident, Resident, Role, User};

    async fn linked_resident(app: &TestApp, family: &User) -> Resident {
        app.store
            .insert_resident(NewResident {
                name: "Walter".into(),
                family: Some(family.id),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_and_schedule() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (staff, staff_token) = app.register(Role::FacilityStaff).await;
        let resident = linked_resident(&app, &family).await;

        let (status, body) = app
            .post(
                "/api/visits",
                Some(&family_token),
                json!({"residentId": resident.id, "visitDate": "2030-06-01T15:00", "notes": "Bring photos"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["visit"]["status"], "REQUESTED");
        assert_eq!(body["visit"]["requestedBy"]["id"], family.id.to_string());
        assert_eq!(body["visit"]["visitDate"], "2030-06-01T15:00:00Z");
        let id = body["visit"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .put(&format!("/api/visits/{id}"), Some(&staff_token), json!({"status": "SCHEDULED"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["visit"]["status"], "SCHEDULED");
        assert_eq!(body["visit"]["scheduledBy"]["id"], staff.id.to_string());

        let (_, body) = app.get("/api/notifications", Some(&family_token)).await;
        assert_eq!(body["notifications"][0]["type"], "VISIT_UPDATE");
        assert_eq!(body["notifications"][0]["visitId"], id);

        let (_, body) = app
            .get(&format!("/api/residents/{}/visits", resident.id), Some(&family_token))
            .await;
        assert_eq!(body["visits"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_requester_may_only_cancel() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (_, stranger_token) = app.register(Role::Family).await;
        let resident = linked_resident(&app, &family).await;
        let (_, body) = app
            .post(
                "/api/visits",
                Some(&family_token),
                json!({"residentId": resident.id, "visitDate": "2030-06-01"}),
            )
            .await;
        let uri = format!("/api/visits/{}", body["visit"]["id"].as_str().unwrap());

        let (status, _) = app
            .put(&uri, Some(&family_token), json!({"status": "SCHEDULED"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .put(&uri, Some(&stranger_token), json!({"status": "CANCELLED"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .put(&uri, Some(&family_token), json!({"status": "CANCELLED", "notes": "Sick"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["visit"]["status"], "CANCELLED");
        assert_eq!(body["visit"]["notes"], "Sick");

        // The requester's own change does not notify them.
        let (_, body) = app.get("/api/notifications", Some(&family_token)).await;
        assert!(body["notifications"].as_array().unwrap().is_empty());

        let (status, body) = app.delete(&uri, Some(&family_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Visit cancelled");
        let (status, _) = app.delete(&uri, Some(&family_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_visit_validation() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (_, staff_token) = app.register(Role::FacilityStaff).await;
        let resident = linked_resident(&app, &family).await;

        let (status, body) = app
            .post("/api/visits", Some(&family_token), json!({"residentId": resident.id}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields");

        let (status, _) = app
            .post(
                "/api/visits",
                Some(&family_token),
                json!({"residentId": resident.id, "visitDate": "next tuesday"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/api/visits",
                Some(&family_token),
                json!({"residentId": Uuid::new_v4(), "visitDate": "2030-06-01"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app
            .post(
                "/api/visits",
                Some(&family_token),
                json!({"residentId": resident.id, "visitDate": "2030-06-01"}),
            )
            .await;
        let uri = format!("/api/visits/{}", body["visit"]["id"].as_str().unwrap());
        let (status, body) = app.put(&uri, Some(&staff_token), json!({"status": "LATER"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid status");

        let (status, _) = app
            .put(
                &format!("/api/visits/{}", Uuid::new_v4()),
                Some(&staff_token),
                json!({"status": "SCHEDULED"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
