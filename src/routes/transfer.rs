//! Transfer Routes
//!
//! Endpoints:
//! - POST /api/upload - Verified upload of a local file
//! - POST /api/uploadAsync - Verified upload, then notify the order service
//! - POST /api/download - Stream an object to a local path
//! - GET /api/signedUrl - Presigned download URL

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::transfer::TransferResult;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/uploadAsync", post(upload_async))
        .route("/download", post(download))
        .route("/signedUrl", get(signed_url))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Local path of the file to upload
    pub remote_path: PathBuf,
    /// Store key
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAsyncRequest {
    pub remote_path: PathBuf,
    pub file_name: String,
    #[serde(default)]
    pub update_req: serde_json::Value,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub download_location: PathBuf,
    pub s3_filepath: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlQuery {
    pub s3_file_path: String,
    /// Lifetime in seconds; the configured default when absent
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

/// POST /api/upload
async fn upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<TransferResult>> {
    require("fileName", &req.file_name)?;
    require("remotePath", &req.remote_path.to_string_lossy())?;

    let cancel = state.request_token();
    let result = state
        .service()
        .upload(&req.remote_path, &req.file_name, &cancel)
        .await?;
    Ok(Json(result))
}

/// POST /api/uploadAsync
///
/// Responds once the upload is verified; the order update is delivered in
/// the background.
async fn upload_async(
    State(state): State<AppState>,
    Json(req): Json<UploadAsyncRequest>,
) -> Result<Json<TransferResult>> {
    require("fileName", &req.file_name)?;
    require("remotePath", &req.remote_path.to_string_lossy())?;

    let cancel = state.request_token();
    let result = state
        .service()
        .upload_and_notify(
            &req.remote_path,
            &req.file_name,
            req.update_req,
            req.session_id,
            &cancel,
        )
        .await
        .map_err(|e| {
            tracing::error!(key = %req.file_name, error = %e, "Upload with order update failed");
            e
        })?;
    Ok(Json(result))
}

/// POST /api/download
async fn download(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<MessageResponse>> {
    require("s3Filepath", &req.s3_filepath)?;
    require("downloadLocation", &req.download_location.to_string_lossy())?;

    let cancel = state.request_token();
    state
        .service()
        .download(&req.download_location, &req.s3_filepath, &cancel)
        .await?;
    Ok(Json(MessageResponse {
        message: "File downloaded successfully.".to_string(),
    }))
}

/// GET /api/signedUrl?s3FilePath=
async fn signed_url(
    State(state): State<AppState>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Json<SignedUrlResponse>> {
    require("s3FilePath", &query.s3_file_path)?;
    if query.expires_in == Some(0) {
        return Err(AppError::BadRequest("expiresIn must be positive".to_string()));
    }

    let url = state
        .service()
        .get_signed_url(&query.s3_file_path, query.expires_in.map(Duration::from_secs))
        .await?;
    Ok(Json(SignedUrlResponse { url }))
}
