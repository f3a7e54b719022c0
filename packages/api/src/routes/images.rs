//! Picture uploads. Files land in the [`ImageStore`](crate::uploads::ImageStore)
//! directory and are recorded as unattached images; reports and messages claim them
//! later by id.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use store::NewImage;
use uuid::Uuid;

use super::residents::visible_resident;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::uploads::{image_extension, ALLOWED_EXTENSIONS, MAX_FILES};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/images/upload", post(upload))
}

struct Upload {
    extension: &'static str,
    bytes: Bytes,
}

async fn upload(
    State(state): State<AppState>,
    caller: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut files = Vec::new();
    let mut resident_id = None;
    let mut tag = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("images") => {
                if files.len() == MAX_FILES {
                    return Err(ApiError::bad_request("Too many files"));
                }
                let extension = field
                    .file_name()
                    .and_then(image_extension)
                    .ok_or_else(|| {
                        ApiError::bad_request(format!(
                            "Unsupported file format. Allowed: {}",
                            ALLOWED_EXTENSIONS.join(", ")
                        ))
                    })?;
                let bytes = field.bytes().await?;
                files.push(Upload { extension, bytes });
            }
            Some("residentId") => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    let id = Uuid::parse_str(raw.trim())
                        .map_err(|_| ApiError::bad_request("Invalid residentId"))?;
                    resident_id = Some(id);
                }
            }
            Some("tag") => {
                let raw = field.text().await?;
                tag = Some(raw).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }
    if let Some(id) = resident_id {
        visible_resident(&state, &caller, id).await?;
    }

    // Rows are recorded only once every file is on disk; any failure removes the
    // files this request already wrote.
    let mut urls = Vec::with_capacity(files.len());
    for file in &files {
        match state.images.save(file.extension, &file.bytes).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                state.images.discard(&urls).await;
                return Err(e.into());
            }
        }
    }
    let records = urls
        .iter()
        .map(|url| NewImage {
            url: url.clone(),
            tag: tag.clone(),
            uploaded_by_id: Some(caller.id),
            resident_id,
        })
        .collect();
    let images = match state.store.insert_images(records).await {
        Ok(images) => images,
        Err(e) => {
            state.images.discard(&urls).await;
            return Err(e.into());
        }
    };
    tracing::info!("{} uploaded {} image(s)", caller.email, images.len());

    let ids: Vec<Uuid> = images.iter().map(|i| i.id).collect();
    let listed: Vec<_> = images
        .iter()
        .map(|i| json!({ "id": i.id, "url": i.url }))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "imageIds": ids, "images": listed })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::Request;
    use store::{CareStore, NewResident, Role};

    const BOUNDARY: &str = "carelink-test-boundary";

    enum Part<'a> {
        File(&'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_request(token: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/images/upload")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_stores_files_and_records() {
        let app = TestApp::new();
        let (family, token) = app.register(Role::Family).await;
        let resident = app
            .store
            .insert_resident(NewResident {
                name: "Walter".into(),
                family: Some(family.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let resident_id = resident.id.to_string();
        let (status, body) = app
            .send(multipart_request(
                &token,
                &[
                    Part::File("garden.JPG", b"first"),
                    Part::File("lunch.png", b"second"),
                    Part::Text("residentId", &resident_id),
                    Part::Text("tag", "outing"),
                ],
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["imageIds"].as_array().unwrap().len(), 2);

        let url = body["images"][0]["url"].as_str().unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".jpg"));
        let name = url.rsplit('/').next().unwrap();
        let stored = std::fs::read(app.uploads.path().join(name)).unwrap();
        assert_eq!(stored, b"first");
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let app = TestApp::new();
        let (_, token) = app.register(Role::FacilityStaff).await;

        let (status, body) = app
            .send(multipart_request(&token, &[Part::File("notes.pdf", b"%PDF")]))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Unsupported file format. Allowed: jpg, jpeg, png, gif, webp"
        );

        let (status, body) = app
            .send(multipart_request(&token, &[Part::Text("tag", "x")]))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No files uploaded");

        let many: Vec<Part> = (0..=MAX_FILES).map(|_| Part::File("a.png", b"x")).collect();
        let (status, body) = app.send(multipart_request(&token, &many)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Too many files");
    }

    #[tokio::test]
    async fn test_unlinked_family_cannot_tag_resident() {
        let app = TestApp::new();
        let (_, token) = app.register(Role::Family).await;
        let resident = app
            .store
            .insert_resident(NewResident {
                name: "Walter".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let resident_id = resident.id.to_string();
        let (status, _) = app
            .send(multipart_request(
                &token,
                &[Part::File("a.png", b"x"), Part::Text("residentId", &resident_id)],
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_failed_write_records_nothing() {
        let app = TestApp::new();
        let (_, token) = app.register(Role::FacilityStaff).await;
        // A plain file where the upload directory should be makes every write fail.
        std::fs::remove_dir(app.uploads.path()).unwrap();
        std::fs::write(app.uploads.path(), b"").unwrap();

        let (status, body) = app
            .send(multipart_request(
                &token,
                &[Part::File("a.png", b"x"), Part::File("b.png", b"y")],
            ))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(std::fs::metadata(app.uploads.path()).unwrap().is_file());
    }
}
