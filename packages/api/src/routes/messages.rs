use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use store::{NewMessage, NewNotification};
use uuid::Uuid;

use super::notifications::{notify, MESSAGE};
use super::residents::visible_resident;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/residents/{id}/messages", get(resident_messages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody {
    resident_id: Option<Uuid>,
    recipient_id: Option<Uuid>,
    content: Option<String>,
    images: Option<Vec<Uuid>>,
}

async fn send_message(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(body): ApiJson<MessageBody>,
) -> ApiResult<impl IntoResponse> {
    let (Some(resident_id), Some(recipient_id), Some(content)) = (
        body.resident_id,
        body.recipient_id,
        body.content.filter(|c| !c.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    if state.store.user_by_id(recipient_id).await?.is_none() {
        return Err(ApiError::not_found("Recipient not found"));
    }
    let resident = visible_resident(&state, &caller, resident_id).await?;

    let message = state
        .store
        .insert_message(NewMessage {
            resident_id,
            sender_id: caller.id,
            recipient_id,
            content,
            images: body.images.unwrap_or_default(),
        })
        .await?;

    let sender = message
        .sender
        .as_ref()
        .map_or(caller.email.as_str(), |s| s.name.as_str());
    notify(
        state.store.as_ref(),
        NewNotification {
            user_id: recipient_id,
            kind: MESSAGE.to_string(),
            message: format!("New message from {sender} about {}", resident.name),
            resident_id: Some(resident_id),
            visit_id: None,
            report_id: None,
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}

async fn resident_messages(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    visible_resident(&state, &caller, id).await?;
    let messages = state.store.messages_of_resident_for(id, caller.id).await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use store::{CareStore, NewResident, Role};

    #[tokio::test]
    async fn test_conversation_between_family_and_staff() {
        let app = TestApp::new();
        let (family, family_token) = app.register(Role::Family).await;
        let (staff, staff_token) = app.register(Role::FacilityStaff).await;
        let (_, other_token) = app.register(Role::FacilityStaff).await;
        let resident = app
            .store
            .insert_resident(NewResident {
                name: "Walter".into(),
                family: Some(family.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let (status, body) = app
            .post(
                "/api/messages",
                Some(&family_token),
                json!({"residentId": resident.id, "recipientId": staff.id, "content": "How was lunch?"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"]["sender"]["email"], family.email);
        assert_eq!(body["message"]["recipient"]["id"], staff.id.to_string());

        let (status, _) = app
            .post(
                "/api/messages",
                Some(&staff_token),
                json!({"residentId": resident.id, "recipientId": family.id, "content": "He loved it"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/residents/{}/messages", resident.id);
        let (_, body) = app.get(&uri, Some(&family_token)).await;
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "How was lunch?");
        assert_eq!(messages[1]["content"], "He loved it");

        let (_, body) = app.get(&uri, Some(&other_token)).await;
        assert!(body["messages"].as_array().unwrap().is_empty());

        let (_, body) = app.get("/api/notifications", Some(&staff_token)).await;
        assert_eq!(body["notifications"][0]["type"], "MESSAGE");
    }

    #[tokio::test]
    async fn test_message_validation() {
        let app = TestApp::new();
        let (_, family_token) = app.register(Role::Family).await;
        let (staff, _) = app.register(Role::FacilityStaff).await;
        let resident = app
            .store
            .insert_resident(NewResident {
                name: "Walter".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let (status, body) = app
            .post(
                "/api/messages",
                Some(&family_token),
                json!({"residentId": resident.id, "recipientId": staff.id, "content": "  "}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required fields");

        let (status, body) = app
            .post(
                "/api/messages",
                Some(&family_token),
                json!({"residentId": resident.id, "recipientId": Uuid::new_v4(), "content": "hi"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Recipient not found");

        let (status, _) = app
            .post(
                "/api/messages",
                Some(&family_token),
                json!({"residentId": resident.id, "recipientId": staff.id, "content": "hi"}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(app
            .store
            .notifications_of_user(staff.id)
            .await
            .unwrap()
            .is_empty());
    }
}
