use crate::{
    AppState,
    container::ContainerName,
    response::ApiError,
    storage::{AccessPermission, StorageClass},
};
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::{debug, error};

const OPERATION: &str = "download";

#[derive(Deserialize)]
pub struct DownloadParams {
    container: Option<String>,
    filename: Option<String>,
}

/// Redirect an authorized caller to a time-limited signed URL granting
/// read access to a single corpus blob.
///
/// The blob is not checked for existence here; a signed URL for a missing
/// blob 404s when fetched.
pub async fn download_handler(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Redirect, ApiError> {
    let container = params
        .container
        .and_then(|raw| raw.parse::<ContainerName>().ok())
        .ok_or_else(|| {
            ApiError::invalid_request(
                "'container' query parameter must be provided and valid",
                OPERATION,
            )
        })?;
    let filename = params.filename.ok_or_else(|| {
        ApiError::invalid_request("'filename' query parameter must be provided", OPERATION)
    })?;

    let url = state
        .storage
        .signed_read_url(
            StorageClass::Corpus,
            &container,
            &filename,
            AccessPermission::Read,
            state.signed_url_ttl,
        )
        .map_err(|err| {
            error!("failed to mint signed url for {container}/{filename}: {err:?}");
            ApiError::internal("unable to mint a signed url for this blob", OPERATION)
        })?;

    debug!("redirecting caller to signed url for {container}/{filename}");
    Ok(Redirect::to(url.as_str()))
}
