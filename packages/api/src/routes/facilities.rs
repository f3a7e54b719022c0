use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use store::{FacilityChanges, FacilityStatus, NewFacility};
use uuid::Uuid;

use crate::auth::{AdminOnly, AuthUser, Authorized};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/facilities", get(list_facilities).post(create_facility))
        .route("/api/facilities/{id}", put(update_facility))
        .route("/api/facilities/{id}/status", patch(set_status))
        .route("/api/facilities/{id}/residents", get(facility_residents))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacilityBody {
    name: Option<String>,
    address: Option<String>,
    contact_person: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> ApiResult<Option<FacilityStatus>> {
    raw.map(|s| s.parse().map_err(|_| ApiError::bad_request("Invalid status")))
        .transpose()
}

async fn list_facilities(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<AdminOnly>,
) -> ApiResult<Json<serde_json::Value>> {
    let facilities = state.store.list_facilities().await?;
    Ok(Json(json!({ "success": true, "facilities": facilities })))
}

async fn create_facility(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AdminOnly>,
    ApiJson(body): ApiJson<FacilityBody>,
) -> ApiResult<impl IntoResponse> {
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;
    let status = parse_status(body.status.as_deref())?.unwrap_or(FacilityStatus::Active);

    let facility = state
        .store
        .insert_facility(NewFacility {
            name,
            address: body.address,
            contact_person: body.contact_person,
            status,
        })
        .await?;
    tracing::info!("{} created facility {} ({})", caller.email, facility.name, facility.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "facility": facility })),
    ))
}

async fn update_facility(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<AdminOnly>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<FacilityBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = parse_status(body.status.as_deref())?;
    let facility = state
        .store
        .update_facility(
            id,
            FacilityChanges {
                name: body.name,
                address: body.address,
                contact_person: body.contact_person,
                status,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Facility not found"))?;
    Ok(Json(json!({ "success": true, "facility": facility })))
}

async fn set_status(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AdminOnly>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = parse_status(body.status.as_deref())?
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;
    let facility = state
        .store
        .update_facility(
            id,
            FacilityChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Facility not found"))?;
    tracing::info!("{} set facility {} to {}", caller.email, facility.id, status);
    Ok(Json(json!({ "success": true, "facility": facility })))
}

async fn facility_residents(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if state.store.facility_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Facility not found"));
    }
    let residents = state.store.residents_at_facility(id, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "residents": residents })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use chrono::Duration;
    use store::{CareStore, NewAssignment, NewResident, Role};

    #[tokio::test]
    async fn test_admin_manages_facilities() {
        let app = TestApp::new();
        let (_, admin) = app.register(Role::SystemAdmin).await;
        let (_, staff) = app.register(Role::FacilityStaff).await;

        let (status, _) = app.post("/api/facilities", Some(&staff), json!({"name": "Oak"})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.post("/api/facilities", Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Name is required");

        let (status, body) = app
            .post("/api/facilities", Some(&admin), json!({"name": "Oak House"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["facility"]["status"], "ACTIVE");
        let id = body["facility"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .put(
                &format!("/api/facilities/{id}"),
                Some(&admin),
                json!({"contactPerson": "Ms. Reyes"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["facility"]["contactPerson"], "Ms. Reyes");
        assert_eq!(body["facility"]["name"], "Oak House");

        let status_uri = format!("/api/facilities/{id}/status");
        let (status, body) = app.patch(&status_uri, Some(&admin), json!({"status": "CLOSED"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid status");
        let (status, body) = app
            .patch(&status_uri, Some(&admin), json!({"status": "INACTIVE"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["facility"]["status"], "INACTIVE");

        let (_, body) = app.get("/api/facilities", Some(&admin)).await;
        assert_eq!(body["facilities"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_of_missing_facility() {
        let app = TestApp::new();
        let (_, admin) = app.register(Role::SystemAdmin).await;
        let (status, body) = app
            .patch(
                &format!("/api/facilities/{}/status", Uuid::new_v4()),
                Some(&admin),
                json!({"status": "ACTIVE"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Facility not found");
    }

    #[tokio::test]
    async fn test_current_residents() {
        let app = TestApp::new();
        let (_, family) = app.register(Role::Family).await;
        let facility = app
            .store
            .insert_facility(NewFacility {
                name: "Oak House".into(),
                address: None,
                contact_person: None,
                status: FacilityStatus::Active,
            })
            .await
            .unwrap();
        let now = Utc::now();
        for (name, end) in [("Current", None), ("Former", Some(now - Duration::days(1)))] {
            let resident = app
                .store
                .insert_resident(NewResident {
                    name: name.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
            app.store
                .insert_assignment(NewAssignment {
                    resident_id: resident.id,
                    facility_id: facility.id,
                    start_date: now - Duration::days(30),
                    end_date: end,
                })
                .await
                .unwrap();
        }

        let (status, body) = app
            .get(&format!("/api/facilities/{}/residents", facility.id), Some(&family))
            .await;
        assert_eq!(status, StatusCode::OK);
        let residents = body["residents"].as_array().unwrap();
        assert_eq!(residents.len(), 1);
        assert_eq!(residents[0]["name"], "Current");
    }
}
