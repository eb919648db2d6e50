use crate::{
    AppState,
    container::ContainerName,
    response::ApiError,
    storage::{self, SignedUrlError, StorageClass},
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header::CONTENT_LENGTH},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

const OPERATION: &str = "signed_download";

#[derive(Deserialize)]
pub struct SignedAccessParams {
    expires: Option<String>,
    sig: Option<String>,
}

/// Serve a blob to the holder of a valid signed URL.
///
/// No authorizer involvement: the signature is the authorization. Expired
/// or mismatching grants are denied before storage is touched.
pub async fn signed_download_handler(
    State(state): State<AppState>,
    Path((class, container, filename)): Path<(String, String, String)>,
    Query(params): Query<SignedAccessParams>,
) -> Result<Response, ApiError> {
    let class: StorageClass = class
        .parse()
        .map_err(|_| ApiError::invalid_request("unknown storage class", OPERATION))?;
    let container: ContainerName = container
        .parse()
        .map_err(|_| ApiError::invalid_request("container name is not valid", OPERATION))?;
    let expires: u64 = params
        .expires
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| {
            ApiError::invalid_request("'expires' query parameter must be provided and valid", OPERATION)
        })?;
    let sig = params.sig.ok_or_else(|| {
        ApiError::invalid_request("'sig' query parameter must be provided", OPERATION)
    })?;

    state
        .storage
        .verify_read_access(class, &container, &filename, expires, &sig)
        .map_err(|err| match err {
            SignedUrlError::Expired => ApiError::access_denied("signed url has expired", OPERATION),
            SignedUrlError::SignatureMismatch | SignedUrlError::MalformedSignature => {
                warn!("rejecting signed download of {container}/{filename}: {err}");
                ApiError::access_denied("signature does not grant access to this blob", OPERATION)
            }
        })?;

    // A signature can be minted for any non-null filename; ones that can
    // never name a blob on disk are indistinguishable from missing blobs.
    if storage::validate_blob_filename(&filename).is_err() {
        return Err(ApiError::not_found("blob does not exist", OPERATION));
    }

    let (file, len) = state
        .storage
        .open_blob(class, &container, &filename)
        .await
        .map_err(|err| {
            error!("failed to open blob {container}/{filename}: {err:?}");
            ApiError::internal("unable to read blob from storage", OPERATION)
        })?
        .ok_or_else(|| ApiError::not_found("blob does not exist", OPERATION))?;

    debug!("serving blob {container}/{filename} ({len} bytes) for a signed url");
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| {
            error!("failed to build blob response for {container}/{filename}: {err:?}");
            ApiError::internal("unable to serve blob", OPERATION)
        })
}

#[cfg(test)]
mod tests {
    use crate::{
        routes::test_util::{ACCESS_TOKEN, test_router},
        storage::StorageClass,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;
    use url::Url;

    async fn upload(router: &axum::Router, container: &str, filename: &str, bytes: &'static [u8]) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/containers/{container}/{filename}"))
                    .header(header::AUTHORIZATION, format!("Bearer {ACCESS_TOKEN}"))
                    .body(Body::from(bytes))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    async fn redirect_location(router: &axum::Router, container: &str, filename: &str) -> Url {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/download?container={container}&filename={filename}"))
                    .header(header::AUTHORIZATION, format!("Bearer {ACCESS_TOKEN}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        Url::parse(
            response
                .headers()
                .get(header::LOCATION)
                .unwrap()
                .to_str()
                .unwrap(),
        )
        .unwrap()
    }

    /// Full pipeline: upload a blob, ask for a download, follow the
    /// redirect, get the bytes back. No authorization on the signed leg.
    #[tokio::test]
    async fn signed_url_round_trip_serves_the_blob() {
        let (_dir, _state, router) = test_router();
        upload(&router, "my-corpus", "crash-01.bin", b"crashing input").await;

        let url = redirect_location(&router, "my-corpus", "crash-01.bin").await;
        let path_and_query = format!("{}?{}", url.path(), url.query().unwrap());
        let response = router
            .oneshot(
                Request::builder()
                    .uri(path_and_query)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            &b"crashing input".len().to_string()
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"crashing input");
    }

    #[tokio::test]
    async fn tampered_signature_is_denied() {
        let (_dir, _state, router) = test_router();
        upload(&router, "my-corpus", "crash-01.bin", b"crashing input").await;

        let url = redirect_location(&router, "my-corpus", "crash-01.bin").await;
        // Signature for crash-01.bin must not unlock crash-02.bin.
        let tampered = format!(
            "/signed/corpus/my-corpus/crash-02.bin?{}",
            url.query().unwrap()
        );
        let response = router
            .oneshot(Request::builder().uri(tampered).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expired_grant_is_denied() {
        let (_dir, state, router) = test_router();
        upload(&router, "my-corpus", "crash-01.bin", b"crashing input").await;

        // Mint a grant that is already expired and present it.
        let expires: u64 = 1;
        let container = "my-corpus".parse().unwrap();
        assert!(
            state
                .storage
                .verify_read_access(StorageClass::Corpus, &container, "crash-01.bin", expires, "00")
                .is_err()
        );
        let response = router
            .oneshot(
                Request::builder()
                    .uri(format!(
                        "/signed/corpus/my-corpus/crash-01.bin?expires={expires}&sig=00"
                    ))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_url_for_a_missing_blob_is_not_found() {
        let (_dir, _state, router) = test_router();
        // No upload: minting still succeeds, fetching 404s.
        let url = redirect_location(&router, "my-corpus", "missing.bin").await;
        let path_and_query = format!("{}?{}", url.path(), url.query().unwrap());
        let response = router
            .oneshot(
                Request::builder()
                    .uri(path_and_query)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_signature_params_are_invalid() {
        let (_dir, _state, router) = test_router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/signed/corpus/my-corpus/crash-01.bin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_storage_class_is_invalid() {
        let (_dir, _state, router) = test_router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/signed/archive/my-corpus/crash-01.bin?expires=1&sig=00")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
