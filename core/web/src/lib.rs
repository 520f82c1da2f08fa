//! HTTP front end for Drive Gallery.
//!
//! Routes:
//! - `/`: landing page
//! - `/auth`: authorize, then redirect to the gallery
//! - `/folders`: folder list
//! - `/files`: all images
//! - `/files/{id}`: images in one folder
//! - `/images/{id}`: image bytes
//!
//! Anything else falls through to the static directory, when configured.

pub mod config;
pub mod error;
pub mod routes;
pub mod views;

pub use config::ServerConfig;
pub use error::RouteError;

use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use drivegallery_storage::{Authorizer, DriveApi};

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub authorizer: Authorizer,
    pub drive: Arc<dyn DriveApi>,
}

impl AppState {
    pub fn new(authorizer: Authorizer, drive: Arc<dyn DriveApi>) -> Self {
        Self { authorizer, drive }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the gallery router, serving `static_dir` for unmatched paths.
pub fn router(state: SharedState, static_dir: Option<&Path>) -> Router {
    let router = routes::gallery_router(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}
