//! # API crate: the CareLink HTTP service
//!
//! Everything the server binary mounts: the axum router, its handlers, and the
//! supporting modules they depend on. Storage is reached only through the
//! [`store::CareStore`] trait, so handlers run unchanged over [`db::PgStore`] in
//! production and over `store::MemoryStore` in tests.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Argon2 password hashing, HS256 bearer tokens, the [`auth::AuthUser`] extractor and role lists |
//! | [`config`] | Layered [`config::Settings`] (defaults, `config.toml`, environment) |
//! | [`db`] | PostgreSQL pool (lazy `OnceCell` singleton), migrations and [`db::PgStore`] |
//! | [`dates`] | Lenient timestamp parsing for request bodies |
//! | [`error`] | [`error::ApiError`] and its JSON rendering |
//! | [`extract`] | JSON and path extractors that reject with [`error::ApiError`] |
//! | [`state`] | [`state::AppState`] shared by every handler |
//! | [`uploads`] | On-disk storage for uploaded pictures |
//! | [`validate`] | Registration and login input checks |
//!
//! ## Routes
//!
//! Health checks live at `/`, `/health` and `/health/db`. Everything else sits under
//! `/api`: authentication and profile, user administration, residents with their
//! family links and facility placements, facilities, daily reports, image uploads,
//! messages, visits and notifications. Uploaded files are served under the configured
//! upload prefix (`/uploads` by default).

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod extract;
mod routes;
pub mod state;
pub mod uploads;
pub mod validate;

use crate::config::Settings;
use crate::error::ApiError;
use crate::state::AppState;

/// Builds the complete router: API routes, uploaded file serving, CORS, security
/// headers, request tracing and the body size limit.
pub fn app(state: AppState, settings: &Settings) -> Router {
    let mut router = routes::routes().fallback(|| async { ApiError::RouteNotFound });

    let images = state.images.clone();
    if images.url().starts_with('/') {
        router = router.nest_service(images.url(), ServeDir::new(images.dir()));
    } else {
        tracing::warn!(
            "Upload prefix {} is not a path; uploaded files will not be served",
            images.url()
        );
    }

    router
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors(&settings.cors.origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(settings.uploads.limit))
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::TestApp;
    use axum::body::Body;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    };
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/nothing-here", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route not found");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_uploaded_files_are_served() {
        let app = TestApp::new();
        let url = app.state.images.save("png", b"pixels").await.unwrap();
        let request = Request::builder().uri(&url).body(Body::empty()).unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/health")
            .header(ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn test_security_headers() {
        let app = TestApp::new();
        for uri in ["/health", "/api/nothing-here"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = app.router.clone().oneshot(request).await.unwrap();
            let headers = response.headers();
            assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
            assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        }
    }
}
