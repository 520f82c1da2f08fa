//! Gallery route handlers.
//!
//! Every handler authorizes first; nothing about a session outlives the
//! request that created it.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use drivegallery_common::FolderId;
use drivegallery_storage::{AuthorizedSession, ImageQuery};

use crate::error::RouteError;
use crate::views;
use crate::SharedState;

pub fn gallery_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/auth", get(auth))
        .route("/folders", get(folders))
        .route("/files", get(all_files))
        .route("/files/{id}", get(folder_files))
        .route("/images/{id}", get(image))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
}

async fn authorize(state: &SharedState) -> Result<AuthorizedSession, RouteError> {
    state
        .authorizer
        .authorize()
        .await
        .map_err(RouteError::Unauthorized)
}

/// GET /: landing page.
async fn index(State(state): State<SharedState>) -> Html<String> {
    let is_authorized = match state.authorizer.authorize().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Landing page rendered unauthorized: {}", e);
            false
        }
    };

    views::landing(is_authorized)
}

/// GET /auth: authorize, then send the browser to the gallery.
async fn auth(State(state): State<SharedState>) -> Result<Response, RouteError> {
    authorize(&state).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, "/files")]).into_response())
}

/// GET /folders: folder list.
async fn folders(State(state): State<SharedState>) -> Result<Html<String>, RouteError> {
    let session = authorize(&state).await?;
    let folders = state
        .drive
        .list_folders(&session)
        .await
        .map_err(RouteError::Drive)?;

    Ok(views::folders(&folders))
}

/// GET /files: images anywhere in the drive.
async fn all_files(
    State(state): State<SharedState>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>, RouteError> {
    let session = authorize(&state).await?;
    let query = ImageQuery::all().with_page_token(params.page_token);
    let page = state
        .drive
        .list_images(&session, &query)
        .await
        .map_err(RouteError::Drive)?;

    Ok(views::gallery("All images", &page, "/files"))
}

/// GET /files/{id}: images directly inside one folder.
async fn folder_files(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>, RouteError> {
    let session = authorize(&state).await?;
    let folder = FolderId::new(id).map_err(|e| RouteError::BadRequest(e.to_string()))?;

    let base_path = views::folder_files_path(folder.as_str());
    let query = ImageQuery::in_folder(folder).with_page_token(params.page_token);
    let page = state
        .drive
        .list_images(&session, &query)
        .await
        .map_err(RouteError::Drive)?;

    Ok(views::gallery("Images", &page, &base_path))
}

/// GET /images/{id}: image bytes proxied from the drive.
async fn image(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, RouteError> {
    let session = authorize(&state).await?;
    let content = state
        .drive
        .download_image(&session, &id)
        .await
        .map_err(RouteError::Drive)?;

    Ok((
        [
            (header::CONTENT_TYPE, content.mime_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CONTENT_SECURITY_POLICY, "default-src 'none'; sandbox".to_string()),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        Body::from_stream(content.stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AUTHENTICATION_REQUIRED;
    use crate::AppState;
    use async_trait::async_trait;
    use axum::http::Request;
    use drivegallery_common::{Error, Result};
    use drivegallery_storage::{
        AuthConfig, Authorizer, ClientSecret, ConsentFlow, MemoryDrive, Tokens,
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const REGISTRATION: &str =
        r#"{"installed":{"client_id":"app-id","client_secret":"app-secret"}}"#;
    const RECORD: &str = r#"{"type":"authorized_user","client_id":"app-id","client_secret":"app-secret","refresh_token":"saved"}"#;

    struct DenyingConsent;

    #[async_trait]
    impl ConsentFlow for DenyingConsent {
        async fn obtain_tokens(
            &self,
            _secret: &ClientSecret,
            _scopes: &[String],
        ) -> Result<Tokens> {
            Err(Error::ConsentDenied("access_denied".to_string()))
        }
    }

    fn sample_drive() -> MemoryDrive {
        let drive = MemoryDrive::new();
        drive.add_folder("f1", "Holidays");
        drive.add_folder("f2", "Pets");
        drive.add_image("i1", "beach.jpg", Some("f1"), "image/jpeg", vec![0xff, 0xd8]);
        drive.add_image("i2", "cat.png", Some("f2"), "image/png", vec![0x89, 0x50]);
        drive
    }

    /// App whose data dir holds a registration and, if `signed_in`, a record.
    fn app(temp: &TempDir, signed_in: bool, drive: MemoryDrive) -> Router {
        std::fs::write(temp.path().join("credentials.json"), REGISTRATION).unwrap();
        if signed_in {
            std::fs::write(temp.path().join("token.json"), RECORD).unwrap();
        }

        let authorizer =
            Authorizer::new(AuthConfig::in_dir(temp.path()), Arc::new(DenyingConsent)).unwrap();
        let state = Arc::new(AppState::new(authorizer, Arc::new(drive)));
        crate::router(state, None)
    }

    async fn get_response(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_folder_files_unauthorized_is_plain_401() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, false, sample_drive()), "/files/f1").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, AUTHENTICATION_REQUIRED);
    }

    #[tokio::test]
    async fn test_folders_unauthorized() {
        let temp = TempDir::new().unwrap();
        let (status, _) = get_response(app(&temp, false, sample_drive()), "/folders").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_unauthorized() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, false, sample_drive()), "/auth").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, AUTHENTICATION_REQUIRED);
    }

    #[tokio::test]
    async fn test_auth_redirects_to_files() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp, true, sample_drive())
            .oneshot(Request::builder().uri("/auth").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/files");
    }

    #[tokio::test]
    async fn test_index_reflects_authorization() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, false, sample_drive()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/auth\""));

        let temp = TempDir::new().unwrap();
        let (_, body) = get_response(app(&temp, true, sample_drive()), "/").await;
        assert!(body.contains("href=\"/files\""));
    }

    #[tokio::test]
    async fn test_folders_lists_and_links() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, true, sample_drive()), "/folders").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Holidays"));
        assert!(body.contains("href=\"/files/f1\""));
    }

    #[tokio::test]
    async fn test_folders_empty() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, true, MemoryDrive::new()), "/folders").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No folders found."));
    }

    #[tokio::test]
    async fn test_folder_files_scoped() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, true, sample_drive()), "/files/f1").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("beach.jpg"));
        assert!(!body.contains("cat.png"));
    }

    #[tokio::test]
    async fn test_all_files() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, true, sample_drive()), "/files").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("beach.jpg"));
        assert!(body.contains("cat.png"));
    }

    #[tokio::test]
    async fn test_image_proxy() {
        let temp = TempDir::new().unwrap();
        let response = app(&temp, true, sample_drive())
            .oneshot(Request::builder().uri("/images/i2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), &[0x89, 0x50]);
    }

    #[tokio::test]
    async fn test_non_image_file_is_not_served() {
        let temp = TempDir::new().unwrap();
        let drive = sample_drive();
        drive.add_image(
            "h",
            "evil.html",
            None,
            "text/html",
            b"<script>alert(1)</script>".to_vec(),
        );
        let response = app(&temp, true, drive)
            .oneshot(Request::builder().uri("/images/h").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_ne!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(b"text/html".as_slice())
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!String::from_utf8_lossy(&bytes).contains("<script>"));
    }

    #[tokio::test]
    async fn test_blank_folder_id_unauthorized_is_401() {
        let temp = TempDir::new().unwrap();
        let (status, body) = get_response(app(&temp, false, sample_drive()), "/files/%20").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, AUTHENTICATION_REQUIRED);
    }

    #[tokio::test]
    async fn test_blank_folder_id_authorized_is_400() {
        let temp = TempDir::new().unwrap();
        let (status, _) = get_response(app(&temp, true, sample_drive()), "/files/%20").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_image_is_404() {
        let temp = TempDir::new().unwrap();
        let (status, _) = get_response(app(&temp, true, sample_drive()), "/images/none").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
