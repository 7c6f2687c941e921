//! Bundle Routes
//!
//! Endpoints:
//! - POST /api/downloadZip - Zip objects from the store
//! - POST /api/downloadZipLocal - Zip files from the base directory

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::bundle::BatchItem;
use crate::error::Result;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/downloadZip", post(download_zip))
        .route("/downloadZipLocal", post(download_zip_local))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub arr_files_obj: Vec<BatchItem>,
    pub preferred_filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResponse {
    /// Archive location on the server
    pub remote_path: String,
    /// `downloads/<file>`
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct LocalBundleResponse {
    pub path: String,
}

/// POST /api/downloadZip
async fn download_zip(
    State(state): State<AppState>,
    Json(req): Json<BundleRequest>,
) -> Result<Json<BundleResponse>> {
    let cancel = state.request_token();
    let bundle = state
        .service()
        .download_zip_from_store(req.arr_files_obj, req.preferred_filename.as_deref(), &cancel)
        .await?;

    Ok(Json(BundleResponse {
        remote_path: bundle.archive_path.to_string_lossy().into_owned(),
        file_name: bundle.archive_name,
    }))
}

/// POST /api/downloadZipLocal
async fn download_zip_local(
    State(state): State<AppState>,
    Json(req): Json<BundleRequest>,
) -> Result<Json<LocalBundleResponse>> {
    let cancel = state.request_token();
    let bundle = state
        .service()
        .download_zip_from_local(req.arr_files_obj, req.preferred_filename.as_deref(), &cancel)
        .await?;

    let path = state
        .config()
        .transfer
        .public_path_for(&bundle.archive_name, &bundle.archive_path);
    Ok(Json(LocalBundleResponse { path }))
}
