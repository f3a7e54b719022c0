//! Residents, their family links and facility placements, plus the read-only
//! views (docs, feed, calendar) the family dashboard is built from.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use store::{
    Assignment, DailyReport, NewAssignment, NewResident, Resident, ResidentChanges, Role,
    UserSummary, VisitStatus,
};
use uuid::Uuid;

use crate::auth::{
    AdminOnly, AuthUser, Authorized, FamilyOnly, FamilyOrAdmin, StaffOrAdmin,
};
use crate::dates;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/residents", get(list_residents).post(create_resident))
        .route("/api/my-residents", get(my_residents))
        .route(
            "/api/residents/{id}",
            get(get_resident).put(update_resident).delete(delete_resident),
        )
        .route("/api/residents/{id}/docs", get(docs))
        .route("/api/residents/{id}/feed", get(feed))
        .route("/api/residents/{id}/calendar", get(calendar))
        .route("/api/residents/{id}/family", get(family).post(link_family))
        .route("/api/residents/{id}/family/{user_id}", delete(unlink_family))
        .route(
            "/api/residents/{id}/assignments",
            get(assignments).post(create_assignment),
        )
}

/// Loads a resident the caller may see.
///
/// Family members must be linked to the resident; a missing resident is reported to
/// them as "Access denied" as well, so ids cannot be enumerated. Staff and administrators
/// get a 404 for a missing resident.
pub(crate) async fn visible_resident(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
) -> ApiResult<Resident> {
    let resident = state.store.resident_by_id(id).await?;
    if caller.role == Role::Family {
        let linked = match &resident {
            Some(_) => state.store.is_family_member(id, caller.id).await?,
            None => false,
        };
        if !linked {
            return Err(ApiError::access_denied());
        }
    }
    resident.ok_or_else(|| ApiError::not_found("Resident not found"))
}

async fn existing_resident(state: &AppState, id: Uuid) -> ApiResult<Resident> {
    state
        .store
        .resident_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Resident not found"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResidentBody {
    name: Option<String>,
    photo: Option<String>,
    room: Option<String>,
    care_plan: Option<String>,
    medical_info: Option<String>,
    facility_id: Option<Uuid>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResidentBody {
    name: Option<String>,
    photo: Option<String>,
    room: Option<String>,
    care_plan: Option<String>,
    medical_info: Option<String>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    discharged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkFamilyBody {
    user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentBody {
    facility_id: Option<Uuid>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    end_date: Option<DateTime<Utc>>,
}

fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> ApiResult<()> {
    if end.is_some_and(|end| end < start) {
        return Err(ApiError::bad_request("End date must not be before start date"));
    }
    Ok(())
}

async fn create_resident(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<FamilyOrAdmin>,
    ApiJson(body): ApiJson<CreateResidentBody>,
) -> ApiResult<impl IntoResponse> {
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Name is required"))?;

    let placement = match (body.facility_id, body.start_date) {
        (Some(facility_id), Some(start_date)) => {
            check_window(start_date, body.end_date)?;
            if state.store.facility_by_id(facility_id).await?.is_none() {
                return Err(ApiError::not_found("Facility not found"));
            }
            Some((facility_id, start_date))
        }
        _ => None,
    };

    let resident = state
        .store
        .insert_resident(NewResident {
            name,
            photo: body.photo,
            room: body.room,
            care_plan: body.care_plan,
            medical_info: body.medical_info,
            admitted_at: Some(Utc::now()),
            family: (caller.role == Role::Family).then_some(caller.id),
        })
        .await?;

    let assignment = match placement {
        Some((facility_id, start_date)) => Some(
            state
                .store
                .insert_assignment(NewAssignment {
                    resident_id: resident.id,
                    facility_id,
                    start_date,
                    end_date: body.end_date,
                })
                .await?,
        ),
        None => None,
    };
    tracing::info!("{} admitted resident {}", caller.email, resident.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "resident": resident,
            "assignment": assignment,
        })),
    ))
}

async fn list_residents(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
) -> ApiResult<Json<serde_json::Value>> {
    let residents = state.store.list_residents().await?;
    Ok(Json(json!({ "success": true, "residents": residents })))
}

async fn my_residents(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<FamilyOnly>,
) -> ApiResult<Json<serde_json::Value>> {
    let residents = state.store.residents_of_family(caller.id).await?;
    Ok(Json(json!({ "success": true, "residents": residents })))
}

async fn get_resident(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let resident = visible_resident(&state, &caller, id).await?;
    Ok(Json(json!({ "success": true, "resident": resident })))
}

async fn update_resident(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateResidentBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let resident = state
        .store
        .update_resident(
            id,
            ResidentChanges {
                name: body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                photo: body.photo,
                room: body.room,
                care_plan: body.care_plan,
                medical_info: body.medical_info,
                discharged_at: body.discharged_at,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Resident not found"))?;
    Ok(Json(json!({ "success": true, "resident": resident })))
}

async fn delete_resident(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<AdminOnly>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.store.delete_resident(id).await? {
        return Err(ApiError::not_found("Resident not found"));
    }
    tracing::info!("{} deleted resident {id}", caller.email);
    Ok(Json(json!({ "success": true, "message": "Resident deleted" })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Docs {
    care_plan: Option<String>,
    medical_info: Option<String>,
    room: Option<String>,
    admitted_at: Option<DateTime<Utc>>,
    discharged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Resident> for Docs {
    fn from(resident: Resident) -> Self {
        Self {
            care_plan: resident.care_plan,
            medical_info: resident.medical_info,
            room: resident.room,
            admitted_at: resident.admitted_at,
            discharged_at: resident.discharged_at,
            created_at: resident.created_at,
            updated_at: resident.updated_at,
        }
    }
}

async fn docs(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let resident = visible_resident(&state, &caller, id).await?;
    Ok(Json(json!({ "success": true, "docs": Docs::from(resident) })))
}

#[derive(Debug, Serialize)]
struct FeedImage {
    url: String,
    tag: Option<String>,
    date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct FeedEntry {
    #[serde(flatten)]
    report: DailyReport,
    staff: Option<UserSummary>,
    images: Vec<FeedImage>,
}

async fn feed(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    visible_resident(&state, &caller, id).await?;
    let feed: Vec<FeedEntry> = state
        .store
        .reports_of_resident(id)
        .await?
        .into_iter()
        .map(|detail| FeedEntry {
            staff: detail.staff.as_ref().map(|s| s.summary()),
            images: detail
                .images
                .into_iter()
                .map(|i| FeedImage {
                    url: i.url,
                    tag: i.tag,
                    date: i.date,
                })
                .collect(),
            report: detail.report,
        })
        .collect();
    Ok(Json(json!({ "success": true, "feed": feed })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEvent {
    id: Uuid,
    title: String,
    date: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: &'static str,
    status: VisitStatus,
    notes: Option<String>,
    requested_by: Option<UserSummary>,
    scheduled_by: Option<UserSummary>,
}

async fn calendar(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    visible_resident(&state, &caller, id).await?;
    let events: Vec<CalendarEvent> = state
        .store
        .visits_of_resident(id)
        .await?
        .into_iter()
        .map(|detail| CalendarEvent {
            id: detail.visit.id,
            title: format!("Visit - {}", detail.visit.status),
            date: detail.visit.visit_date,
            kind: "visit",
            status: detail.visit.status,
            notes: detail.visit.notes,
            requested_by: detail.requested_by.as_ref().map(|u| u.summary()),
            scheduled_by: detail.scheduled_by.as_ref().map(|u| u.summary()),
        })
        .collect();
    Ok(Json(json!({ "success": true, "calendar": events })))
}

async fn family(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    existing_resident(&state, id).await?;
    let family = state.store.family_of_resident(id).await?;
    Ok(Json(json!({ "success": true, "family": family })))
}

async fn link_family(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<LinkFamilyBody>,
) -> ApiResult<impl IntoResponse> {
    let user_id = body
        .user_id
        .ok_or_else(|| ApiError::bad_request("Missing required fields"))?;
    existing_resident(&state, id).await?;

    match state.store.user_by_id(user_id).await? {
        Some(user) if user.role == Role::Family => {}
        Some(_) => return Err(ApiError::bad_request("User is not a family member")),
        None => return Err(ApiError::bad_request("User not found")),
    }
    state.store.link_family(id, user_id).await?;
    tracing::info!("{} linked user {user_id} to resident {id}", caller.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Family member linked" })),
    ))
}

async fn unlink_family(
    State(state): State<AppState>,
    Authorized(caller, _): Authorized<StaffOrAdmin>,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.store.unlink_family(id, user_id).await? {
        return Err(ApiError::not_found("Family link not found"));
    }
    tracing::info!("{} unlinked user {user_id} from resident {id}", caller.email);
    Ok(Json(json!({ "success": true, "message": "Family member unlinked" })))
}

async fn assignments(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    existing_resident(&state, id).await?;
    let assignments: Vec<Assignment> = state.store.assignments_of_resident(id).await?;
    Ok(Json(json!({ "success": true, "assignments": assignments })))
}

async fn create_assignment(
    State(state): State<AppState>,
    Authorized(_caller, _): Authorized<StaffOrAdmin>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AssignmentBody>,
) -> ApiResult<impl IntoResponse> {
    let (Some(facility_id), Some(start_date)) = (body.facility_id, body.start_date) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    check_window(start_date, body.end_date)?;
    existing_resident(&state, id).await?;
    if state.store.facility_by_id(facility_id).await?.is_none() {
        return Err(ApiError::not_found("Facility not found"));
    }

    let assignment = state
        .store
        .insert_assignment(NewAssignment {
            resident_id: id,
            facility_id,
            start_date,
            end_date: body.end_date,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "assignment": assignment })),
    ))
}
