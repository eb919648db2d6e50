use crate::AppState;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct ServerConfigurationResponse {
    signed_url: SignedUrlConfiguration,
    blob: BlobConfiguration,
}

#[derive(Serialize, Deserialize)]
pub struct SignedUrlConfiguration {
    ttl_ms: u128,
}

#[derive(Serialize, Deserialize)]
pub struct BlobConfiguration {
    max_size_bytes: u64,
}

pub async fn configuration_handler(
    State(state): State<AppState>,
) -> Json<ServerConfigurationResponse> {
    Json(ServerConfigurationResponse {
        signed_url: SignedUrlConfiguration {
            ttl_ms: state.signed_url_ttl.as_millis(),
        },
        blob: BlobConfiguration {
            max_size_bytes: state.blob_max_size.as_u64(),
        },
    })
}
