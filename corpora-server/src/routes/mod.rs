mod configuration;
mod download;
mod index;
mod signed;
mod upload;

pub use configuration::*;
pub use download::*;
pub use index::*;
pub use signed::*;
pub use upload::*;

use crate::{AppState, auth};
use axum::{
    Router, middleware,
    routing::{get, put},
};

/// Assemble the service router.
///
/// The download and upload routes sit behind the authorizer; the signed
/// fulfilment route does not, as the URL signature is its authorization.
pub fn router(state: AppState) -> Router {
    let authorized = Router::new()
        .route("/download", get(download_handler))
        .route("/containers/{container}/{filename}", put(upload_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    Router::new()
        .route("/", get(index_handler))
        .route("/configuration", get(configuration_handler))
        .route(
            "/signed/{class}/{container}/{filename}",
            get(signed_download_handler),
        )
        .merge(authorized)
        .with_state(state)
}
