use crate::{
    AppState,
    container::ContainerName,
    response::ApiError,
    storage::{self, StorageClass},
};
use axum::{
    body::{self, Body},
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, warn};

const OPERATION: &str = "upload";

/// Store a blob into a corpus container, overwriting any existing blob of
/// the same name.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path((container, filename)): Path<(String, String)>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let container: ContainerName = container
        .parse()
        .map_err(|_| ApiError::invalid_request("container name is not valid", OPERATION))?;
    storage::validate_blob_filename(&filename)
        .map_err(|err| ApiError::invalid_request(err.to_string(), OPERATION))?;

    let body_bytes = body::to_bytes(
        body,
        state
            .blob_max_size
            .as_u64()
            .try_into()
            .map_err(|_| ApiError::internal("blob size limit does not fit into usize", OPERATION))?,
    )
    .await
    .map_err(|_| {
        warn!("rejecting blob upload to {container} that exceeded the size limit");
        ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "BLOB_TOO_LARGE",
            format!("blob must not be larger than {}", state.blob_max_size),
            OPERATION,
        )
    })?;

    state
        .storage
        .save_blob(StorageClass::Corpus, &container, &filename, &body_bytes)
        .await
        .map_err(|err| {
            error!("failed to save blob {container}/{filename}: {err:?}");
            ApiError::internal("unable to save blob to storage", OPERATION)
        })?;
    Ok(StatusCode::CREATED)
}
