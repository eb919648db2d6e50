use crate::{AppState, response::ApiError};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use tracing::warn;

const OPERATION: &str = "auth";

/// Decides whether a caller is a valid user.
///
/// Callers identify themselves with a bearer token from the server's
/// configured access token set. The decision logic lives here so the
/// middleware below stays a thin adapter over it.
#[derive(Debug)]
pub struct Authorizer {
    access_tokens: HashSet<String>,
}

impl Authorizer {
    pub fn new(access_tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            access_tokens: access_tokens.into_iter().collect(),
        }
    }

    fn is_user(&self, token: &str) -> bool {
        self.access_tokens.contains(token)
    }
}

/// Middleware that rejects requests from callers the [`Authorizer`] does
/// not recognize as users. Runs before any handler logic.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return Err(ApiError::unauthorized(
            "authorization header is missing",
            OPERATION,
        ));
    };
    let Some(token) = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return Err(ApiError::unauthorized(
            "authorization header must use the bearer scheme",
            OPERATION,
        ));
    };
    if !state.authorizer.is_user(token) {
        warn!("rejecting request with unrecognized access token");
        return Err(ApiError::unauthorized(
            "access token is not recognized",
            OPERATION,
        ));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_configured_tokens() {
        let authorizer = Authorizer::new(["alpha".to_owned(), "beta".to_owned()]);
        assert!(authorizer.is_user("alpha"));
        assert!(authorizer.is_user("beta"));
        assert!(!authorizer.is_user("gamma"));
        assert!(!authorizer.is_user(""));
    }
}
